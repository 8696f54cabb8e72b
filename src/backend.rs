//! The boundary to the native capture library.
//!
//! Every call is synchronous. Buffers follow a caller-allocates,
//! native-writes convention and are only borrowed for the duration of the
//! call; text comes back NUL-terminated.

use core::num::NonZeroU32;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::NativeError;
use crate::types::Timestamp;

/// A live native device instance. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(NonZeroU32);

impl NativeHandle {
    /// Interprets a native instance id; zero and negative ids are invalid.
    pub fn from_raw(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().and_then(NonZeroU32::new).map(NativeHandle)
    }

    pub fn as_raw(self) -> i32 {
        // Constructed from a positive i32, so this cannot truncate.
        self.0.get() as i32
    }
}

/// Outcome of a native `CreateDevice` call.
#[derive(Debug)]
pub struct CreatedDevice {
    /// The instance, or `None` if creation failed.
    pub handle: Option<NativeHandle>,
    /// Error text on failure; on success, an advisory message (often empty).
    pub message: String,
}

/// Operations a native capture library exposes.
///
/// Implementations must not keep references to any buffer past the call
/// that received it.
pub trait NativeBackend {
    /// Writes the device list as NUL-terminated JSON into `json`.
    fn enumerate_devices(&self, json: &mut [u8]) -> Result<(), NativeError>;

    fn create_device(&self, name: &str, params_json: &str) -> Result<CreatedDevice, NativeError>;

    fn free_device(&self, handle: NativeHandle) -> Result<(), NativeError>;

    /// Writes the pending frame's metadata into `meta_json` without
    /// consuming the frame. `None` means nothing is pending.
    fn peek_next_frame(
        &self,
        handle: NativeHandle,
        meta_json: &mut [u8],
    ) -> Result<Option<Timestamp>, NativeError>;

    /// Consumes the pending frame, copying each plane into the matching
    /// buffer. Passing no buffers discards the frame.
    fn pop_next_frame(
        &self,
        handle: NativeHandle,
        planes: &mut [&mut [u8]],
    ) -> Result<Option<Timestamp>, NativeError>;

    /// Packed `A.BBB.CCCCCC` version number.
    fn version(&self) -> Result<i32, NativeError>;

    /// Process-wide teardown. Implementations only forward the first call.
    fn cleanup(&self) -> Result<(), NativeError>;
}

impl<B: NativeBackend + ?Sized> NativeBackend for &B {
    fn enumerate_devices(&self, json: &mut [u8]) -> Result<(), NativeError> {
        (**self).enumerate_devices(json)
    }

    fn create_device(&self, name: &str, params_json: &str) -> Result<CreatedDevice, NativeError> {
        (**self).create_device(name, params_json)
    }

    fn free_device(&self, handle: NativeHandle) -> Result<(), NativeError> {
        (**self).free_device(handle)
    }

    fn peek_next_frame(
        &self,
        handle: NativeHandle,
        meta_json: &mut [u8],
    ) -> Result<Option<Timestamp>, NativeError> {
        (**self).peek_next_frame(handle, meta_json)
    }

    fn pop_next_frame(
        &self,
        handle: NativeHandle,
        planes: &mut [&mut [u8]],
    ) -> Result<Option<Timestamp>, NativeError> {
        (**self).pop_next_frame(handle, planes)
    }

    fn version(&self) -> Result<i32, NativeError> {
        (**self).version()
    }

    fn cleanup(&self) -> Result<(), NativeError> {
        (**self).cleanup()
    }
}

/// Lets a process-wide teardown through at most once.
#[derive(Debug, Default)]
pub struct CleanupGuard {
    done: AtomicBool,
}

impl CleanupGuard {
    pub const fn new() -> Self {
        CleanupGuard {
            done: AtomicBool::new(false),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Runs `teardown` on the first call only and reports whether it ran.
    ///
    /// A failed teardown still counts as done; it is not retried.
    pub fn run_once<E>(&self, teardown: impl FnOnce() -> Result<(), E>) -> Result<bool, E> {
        if self.done.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        teardown().map(|()| true)
    }
}

/// Reads NUL-terminated text out of a native buffer.
///
/// Returns `None` when the buffer holds no terminator, i.e. the native side
/// filled it completely and the text may be truncated.
pub fn read_c_str(buffer: &[u8]) -> Option<&str> {
    let end = buffer.iter().position(|&b| b == 0)?;
    Some(match core::str::from_utf8(&buffer[..end]) {
        Ok(s) => s,
        // Keep the valid prefix rather than dropping the whole message.
        Err(e) => core::str::from_utf8(&buffer[..e.valid_up_to()]).unwrap_or_default(),
    })
}

/// Copies `text` into a native-style buffer, truncating to fit and always
/// NUL-terminating. Returns the number of text bytes written.
pub fn write_c_str(text: &str, buffer: &mut [u8]) -> usize {
    let Some(room) = buffer.len().checked_sub(1) else {
        return 0;
    };
    let len = text.len().min(room);
    buffer[..len].copy_from_slice(&text.as_bytes()[..len]);
    buffer[len] = 0;
    len
}
