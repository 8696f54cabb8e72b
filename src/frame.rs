use arrayvec::ArrayVec;

use crate::meta::PlaneMeta;
use crate::types::{MAX_PLANES, PixelFormat, Size, Timestamp};

/// A single plane of image data.
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub meta: PlaneMeta,
}

impl Plane<'_> {
    pub fn pixel_format(&self) -> PixelFormat {
        self.meta.pixel_format
    }

    pub fn size(&self) -> Size {
        self.meta.size()
    }

    pub fn channels(&self) -> u8 {
        self.meta.channels
    }

    pub fn bytes_per_row(&self) -> usize {
        self.meta.bytes_per_row()
    }
}

/// A frame borrowed from its session's plane buffers.
///
/// Valid until the next call on the session that produced it.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    timestamp: Timestamp,
    planes: ArrayVec<Plane<'a>, MAX_PLANES>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(timestamp: Timestamp, planes: ArrayVec<Plane<'a>, MAX_PLANES>) -> Self {
        Frame { timestamp, planes }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn planes(&self) -> &[Plane<'a>] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> Option<&Plane<'a>> {
        self.planes.get(index)
    }

    /// Per-plane pixel formats, in plane order.
    pub fn pixel_formats(&self) -> impl Iterator<Item = PixelFormat> + '_ {
        self.planes.iter().map(Plane::pixel_format)
    }

    /// Size of the first plane, which is the full-resolution one for every
    /// multi-planar format.
    pub fn size(&self) -> Size {
        self.planes.first().map(Plane::size).unwrap_or_default()
    }
}
