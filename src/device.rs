use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::{CleanupGuard, NativeBackend, read_c_str};
use crate::error::{NativeError, Result};
use crate::meta::DeviceDescriptor;
use crate::params::DeviceParams;
use crate::stream::DeviceSession;
use crate::types::Version;

/// Initial capacity of the device enumeration buffer.
pub const ENUMERATION_CAPACITY: usize = 16 * 1024;

/// Enumeration gives up growing its buffer past this size.
pub const MAX_ENUMERATION_CAPACITY: usize = 1024 * 1024;

/// Entry point: discovers devices and opens sessions on a native backend.
///
/// The backend is cloned into every session it opens, so it should be a
/// cheap handle such as `DylibBackend` or a reference.
#[derive(Debug, Clone)]
pub struct CameraManager<B> {
    backend: B,
    // Shared by clones so the whole manager family shuts down once.
    shutdown: Arc<CleanupGuard>,
}

impl<B: NativeBackend + Clone> CameraManager<B> {
    pub fn new(backend: B) -> Self {
        CameraManager {
            backend,
            shutdown: Arc::new(CleanupGuard::new()),
        }
    }

    /// Lists the devices the native layer can see, with their advertised formats.
    ///
    /// This triggers a native device scan and may be slow. Order is not stable
    /// between calls.
    pub fn discover_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let mut capacity = ENUMERATION_CAPACITY;
        loop {
            let mut buffer = vec![0u8; capacity];
            self.backend.enumerate_devices(&mut buffer)?;

            if let Some(json) = read_c_str(&buffer) {
                let devices = DeviceDescriptor::parse_list(json)?;
                debug!(count = devices.len(), "enumerated camera devices");
                return Ok(devices);
            }

            if capacity >= MAX_ENUMERATION_CAPACITY {
                return Err(NativeError::Message(format!(
                    "device list exceeds {MAX_ENUMERATION_CAPACITY} bytes"
                ))
                .into());
            }
            capacity *= 2;
            debug!(capacity, "device list truncated, retrying with a larger buffer");
        }
    }

    /// Opens a session on the named device.
    ///
    /// `name` is usually a [`DeviceDescriptor::serial`], but backends also
    /// accept their own aliases (e.g. `"Test"`).
    pub fn open(&self, name: &str, params: &DeviceParams) -> Result<DeviceSession<B>> {
        DeviceSession::open(self.backend.clone(), name, params)
    }

    /// Runs `f` with a freshly opened session and closes it afterwards.
    ///
    /// An error from `f` takes precedence over an error releasing the device.
    pub fn with_session<T>(
        &self,
        name: &str,
        params: &DeviceParams,
        f: impl FnOnce(&mut DeviceSession<B>) -> Result<T>,
    ) -> Result<T> {
        let mut session = self.open(name, params)?;
        let result = f(&mut session);
        let closed = session.close();
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    warn!(device = name, error = %close_error, "failed to release camera device");
                }
                Err(e)
            }
        }
    }

    pub fn version(&self) -> Result<Version> {
        Ok(Version::from_packed(self.backend.version()?))
    }

    /// Process-wide native teardown, after every session is closed.
    ///
    /// Only the first call reaches the backend; later calls are no-ops.
    pub fn shutdown(&self) -> Result<()> {
        let ran = self.shutdown.run_once(|| self.backend.cleanup())?;
        if !ran {
            debug!("camera manager already shut down");
        }
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_done()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
