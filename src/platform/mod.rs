//! Native backends.

pub mod dylib;

pub use dylib::DylibBackend;
