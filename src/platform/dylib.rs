//! [`NativeBackend`] over a capture library loaded at runtime with `libloading`.

use std::ffi::{CString, OsStr, c_char};
use std::fmt;
use std::ptr;
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, info};

use crate::backend::{CleanupGuard, CreatedDevice, NativeBackend, NativeHandle, read_c_str};
use crate::error::NativeError;
use crate::types::{MAX_PLANES, Timestamp};

/// Environment variable naming the native library to load.
pub const LIBRARY_ENV: &str = "CAMERA_PULL_LIBRARY";

/// Library stem used when [`LIBRARY_ENV`] is unset.
pub const DEFAULT_LIBRARY: &str = "PopCameraDevice";

/// Capacity of the buffer creation errors are written into.
const ERROR_CAPACITY: usize = 1024;

type EnumDevicesFn = unsafe extern "C" fn(*mut c_char, i32);
type CreateDeviceFn = unsafe extern "C" fn(*const c_char, *const c_char, *mut c_char, i32) -> i32;
type FreeDeviceFn = unsafe extern "C" fn(i32);
type PeekNextFrameFn = unsafe extern "C" fn(i32, *mut c_char, i32) -> i32;
type PopNextFrameFn =
    unsafe extern "C" fn(i32, *mut c_char, i32, *mut u8, i32, *mut u8, i32, *mut u8, i32) -> i32;
type GetVersionFn = unsafe extern "C" fn() -> i32;
type CleanupFn = unsafe extern "C" fn();

/// Function pointers resolved once at load time.
struct Symbols {
    enum_devices: EnumDevicesFn,
    create_device: CreateDeviceFn,
    free_device: FreeDeviceFn,
    peek_next_frame: PeekNextFrameFn,
    pop_next_frame: PopNextFrameFn,
    get_version: GetVersionFn,
    cleanup: CleanupFn,
}

impl Symbols {
    /// SAFETY: `library` must export these symbols with the signatures above.
    unsafe fn resolve(library: &Library) -> Result<Self, NativeError> {
        unsafe {
            Ok(Symbols {
                enum_devices: symbol(library, "PopCameraDevice_EnumCameraDevicesJson")?,
                create_device: symbol(library, "PopCameraDevice_CreateCameraDevice")?,
                free_device: symbol(library, "PopCameraDevice_FreeCameraDevice")?,
                peek_next_frame: symbol(library, "PopCameraDevice_PeekNextFrame")?,
                pop_next_frame: symbol(library, "PopCameraDevice_PopNextFrame")?,
                get_version: symbol(library, "PopCameraDevice_GetVersion")?,
                cleanup: symbol(library, "PopCameraDevice_Cleanup")?,
            })
        }
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, NativeError> {
    unsafe { library.get::<T>(name.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|_| NativeError::MissingSymbol(name))
}

struct Inner {
    symbols: Symbols,
    cleanup: CleanupGuard,
    // Keeps the code behind `symbols` mapped.
    _library: Library,
}

/// A loaded native capture library.
///
/// Cloning is cheap and shares the library; it stays loaded until the last
/// clone (and every session holding one) is dropped.
#[derive(Clone)]
pub struct DylibBackend {
    inner: Arc<Inner>,
}

impl DylibBackend {
    /// Loads the library at `path` and resolves its entry points.
    pub fn load(path: impl AsRef<OsStr>) -> Result<Self, NativeError> {
        let path = path.as_ref();
        // SAFETY: loading runs the library's initialisers; we trust the
        // capture library the caller pointed us at.
        let library = unsafe { Library::new(path) }.map_err(|e| NativeError::Library(Box::new(e)))?;
        let symbols = unsafe { Symbols::resolve(&library)? };
        info!(path = %path.to_string_lossy(), "loaded native camera library");
        Ok(DylibBackend {
            inner: Arc::new(Inner {
                symbols,
                cleanup: CleanupGuard::new(),
                _library: library,
            }),
        })
    }

    /// Loads the library named by `CAMERA_PULL_LIBRARY`, or the platform's
    /// file name for `PopCameraDevice` from the default search path.
    pub fn from_env() -> Result<Self, NativeError> {
        match std::env::var_os(LIBRARY_ENV) {
            Some(path) => Self::load(path),
            None => Self::load(libloading::library_filename(DEFAULT_LIBRARY)),
        }
    }

    fn symbols(&self) -> &Symbols {
        &self.inner.symbols
    }
}

impl fmt::Debug for DylibBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DylibBackend")
            .field("cleaned_up", &self.inner.cleanup.is_done())
            .finish_non_exhaustive()
    }
}

// Native lengths are i32; anything larger is simply under-reported.
fn native_len(buffer: &[u8]) -> i32 {
    i32::try_from(buffer.len()).unwrap_or(i32::MAX)
}

fn c_string(value: &str, what: &str) -> Result<CString, NativeError> {
    CString::new(value).map_err(|_| NativeError::InvalidArgument(format!("{what} contains a NUL byte")))
}

impl NativeBackend for DylibBackend {
    fn enumerate_devices(&self, json: &mut [u8]) -> Result<(), NativeError> {
        // SAFETY: the buffer is valid for `native_len` bytes for the whole call.
        unsafe {
            (self.symbols().enum_devices)(json.as_mut_ptr().cast(), native_len(json));
        }
        Ok(())
    }

    fn create_device(&self, name: &str, params_json: &str) -> Result<CreatedDevice, NativeError> {
        let name = c_string(name, "device name")?;
        let params = c_string(params_json, "device parameters")?;
        let mut error = [0u8; ERROR_CAPACITY];

        // SAFETY: both strings are NUL-terminated and outlive the call; the
        // error buffer is valid for its full length.
        let raw = unsafe {
            (self.symbols().create_device)(
                name.as_ptr(),
                params.as_ptr(),
                error.as_mut_ptr().cast(),
                native_len(&error),
            )
        };

        let message = match read_c_str(&error) {
            Some(text) => text.trim().to_owned(),
            None => String::from_utf8_lossy(&error).trim().to_owned(),
        };
        debug!(instance = raw, "native device creation returned");
        Ok(CreatedDevice {
            handle: NativeHandle::from_raw(raw),
            message,
        })
    }

    fn free_device(&self, handle: NativeHandle) -> Result<(), NativeError> {
        // SAFETY: plain integer argument.
        unsafe { (self.symbols().free_device)(handle.as_raw()) };
        Ok(())
    }

    fn peek_next_frame(
        &self,
        handle: NativeHandle,
        meta_json: &mut [u8],
    ) -> Result<Option<Timestamp>, NativeError> {
        // SAFETY: the buffer is valid for `native_len` bytes for the whole call.
        let raw = unsafe {
            (self.symbols().peek_next_frame)(
                handle.as_raw(),
                meta_json.as_mut_ptr().cast(),
                native_len(meta_json),
            )
        };
        Ok(Timestamp::from_native(raw))
    }

    fn pop_next_frame(
        &self,
        handle: NativeHandle,
        planes: &mut [&mut [u8]],
    ) -> Result<Option<Timestamp>, NativeError> {
        if planes.len() > MAX_PLANES {
            return Err(NativeError::InvalidArgument(format!(
                "{} destination planes, at most {MAX_PLANES}",
                planes.len()
            )));
        }

        let mut targets = [(ptr::null_mut::<u8>(), 0i32); MAX_PLANES];
        for (target, plane) in targets.iter_mut().zip(planes.iter_mut()) {
            *target = (plane.as_mut_ptr(), native_len(plane));
        }
        let [(p0, s0), (p1, s1), (p2, s2)] = targets;

        // SAFETY: every non-null pointer is a live exclusive borrow valid for
        // its paired length until the call returns. Null planes have length 0.
        let raw = unsafe {
            (self.symbols().pop_next_frame)(
                handle.as_raw(),
                ptr::null_mut(),
                0,
                p0,
                s0,
                p1,
                s1,
                p2,
                s2,
            )
        };
        Ok(Timestamp::from_native(raw))
    }

    fn version(&self) -> Result<i32, NativeError> {
        // SAFETY: no arguments.
        Ok(unsafe { (self.symbols().get_version)() })
    }

    fn cleanup(&self) -> Result<(), NativeError> {
        let ran = self.inner.cleanup.run_once(|| -> Result<(), NativeError> {
            // SAFETY: the guard lets the library see at most one call.
            unsafe { (self.symbols().cleanup)() };
            Ok(())
        })?;
        if !ran {
            debug!("native cleanup already ran");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_a_load_error() {
        let err = DylibBackend::load("/nonexistent/libcamera_pull_missing.so").unwrap_err();
        assert!(matches!(err, NativeError::Library(_)));
    }

    #[test]
    fn native_len_saturates() {
        assert_eq!(native_len(&[0; 16]), 16);
    }

    #[test]
    fn interior_nul_is_rejected_before_the_call() {
        let err = c_string("cam\0era", "device name").unwrap_err();
        assert!(matches!(err, NativeError::InvalidArgument(_)));
    }
}
