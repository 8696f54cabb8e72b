//! Pull-based frame delivery from native camera and depth devices.
//!
//! A [`CameraManager`] wraps a [`NativeBackend`], lists devices and opens
//! [`DeviceSession`]s. Each session is polled once per tick; a poll peeks the
//! pending frame's metadata, sizes the session's plane buffers, pops the
//! pixels into them and hands back a borrowed [`Frame`].

pub mod backend;
pub mod cache;
pub mod device;
pub mod error;
pub mod format;
pub mod frame;
pub mod meta;
pub mod params;
pub mod stream;
pub mod types;

#[cfg(feature = "dylib")]
pub mod platform;

// Re-exports
pub use backend::*;
pub use cache::*;
pub use device::*;
pub use error::*;
pub use format::*;
pub use frame::*;
pub use meta::*;
pub use params::*;
pub use stream::*;
pub use types::*;
