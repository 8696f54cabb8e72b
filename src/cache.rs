use arrayvec::ArrayVec;
use tracing::debug;

use crate::error::FrameError;
use crate::types::MAX_PLANES;

/// One plane's backing storage.
#[derive(Debug, Default)]
struct PlaneSlot {
    bytes: Box<[u8]>,
    allocations: u32,
}

/// Reusable per-plane byte buffers owned by a single session.
///
/// A plane's buffer is replaced only when the byte size it needs changes;
/// otherwise it is handed back as-is and overwritten in place. Slots are
/// created lazily and never dropped, so a frame with fewer planes than an
/// earlier one leaves the extra buffers allocated but untouched.
#[derive(Debug, Default)]
pub struct PlaneBufferCache {
    slots: ArrayVec<PlaneSlot, MAX_PLANES>,
    reallocations: u64,
}

impl PlaneBufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the buffer for `index`, sized exactly `byte_size`.
    pub fn ensure(&mut self, index: usize, byte_size: usize) -> Result<&mut [u8], FrameError> {
        if index >= MAX_PLANES {
            return Err(FrameError::Protocol(format!(
                "plane index {index} out of range, at most {MAX_PLANES} planes"
            )));
        }
        while self.slots.len() <= index {
            self.slots.push(PlaneSlot::default());
        }

        let slot = &mut self.slots[index];
        if slot.allocations == 0 || slot.bytes.len() != byte_size {
            debug!(
                plane = index,
                old_size = slot.bytes.len(),
                new_size = byte_size,
                "allocating plane buffer"
            );
            // Allocate before the old buffer is released so the two never share an address.
            let mut fresh = Vec::new();
            fresh.try_reserve_exact(byte_size).map_err(|e| {
                FrameError::Protocol(format!("cannot allocate {byte_size} bytes for plane {index}: {e}"))
            })?;
            fresh.resize(byte_size, 0u8);
            drop(std::mem::replace(&mut slot.bytes, fresh.into_boxed_slice()));
            slot.allocations += 1;
            self.reallocations += 1;
        }
        Ok(&mut slot.bytes)
    }

    /// The buffer for `index`, or `None` if that plane was never ensured.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.slots
            .get(index)
            .filter(|slot| slot.allocations > 0)
            .map(|slot| &*slot.bytes)
    }

    /// Number of plane slots created so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// How many times the buffer for `index` has been (re)allocated.
    pub fn allocations(&self, index: usize) -> u32 {
        self.slots.get(index).map_or(0, |slot| slot.allocations)
    }

    /// Total allocations across all planes.
    pub fn total_allocations(&self) -> u64 {
        self.reallocations
    }

    /// Disjoint mutable views of the first `count` buffers, for the native
    /// layer to write into.
    pub fn buffers_mut(&mut self, count: usize) -> ArrayVec<&mut [u8], MAX_PLANES> {
        self.slots
            .iter_mut()
            .take(count)
            .map(|slot| &mut *slot.bytes)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unensured_planes_are_absent() {
        let mut cache = PlaneBufferCache::new();
        assert!(cache.get(0).is_none());
        cache.ensure(1, 8).unwrap();
        assert!(cache.get(0).is_none());
        assert_eq!(cache.get(1).map(<[u8]>::len), Some(8));
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn same_size_reuses_buffer() {
        let mut cache = PlaneBufferCache::new();
        let first = cache.ensure(0, 64).unwrap().as_ptr();
        cache.ensure(0, 64).unwrap()[0] = 7;
        let second = cache.ensure(0, 64).unwrap();
        assert_eq!(second.as_ptr(), first);
        assert_eq!(second[0], 7);
        assert_eq!(cache.allocations(0), 1);
    }

    #[test]
    fn size_change_replaces_with_exact_size() {
        let mut cache = PlaneBufferCache::new();
        let first = cache.ensure(0, 64).unwrap().as_ptr();
        let grown = cache.ensure(0, 128).unwrap();
        assert_eq!(grown.len(), 128);
        assert_ne!(grown.as_ptr(), first);
        let shrunk = cache.ensure(0, 16).unwrap();
        assert_eq!(shrunk.len(), 16);
        assert_eq!(cache.allocations(0), 3);
        assert_eq!(cache.total_allocations(), 3);
    }

    #[test]
    fn zero_sized_plane_is_still_ensured() {
        let mut cache = PlaneBufferCache::new();
        assert!(cache.ensure(0, 0).unwrap().is_empty());
        assert_eq!(cache.get(0), Some(&[][..]));
        assert_eq!(cache.allocations(0), 1);
        cache.ensure(0, 0).unwrap();
        assert_eq!(cache.allocations(0), 1);
    }

    #[test]
    fn index_past_plane_limit_is_rejected() {
        let mut cache = PlaneBufferCache::new();
        assert!(matches!(cache.ensure(MAX_PLANES, 1), Err(FrameError::Protocol(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn unallocatable_size_is_an_error_not_an_abort() {
        let mut cache = PlaneBufferCache::new();
        cache.ensure(0, 8).unwrap()[0] = 3;
        assert!(matches!(cache.ensure(0, usize::MAX), Err(FrameError::Protocol(_))));
        // The previous buffer survives the failed attempt.
        assert_eq!(cache.get(0).map(|b| (b.len(), b[0])), Some((8, 3)));
        assert_eq!(cache.allocations(0), 1);
    }

    #[test]
    fn buffers_mut_hands_out_disjoint_prefix() {
        let mut cache = PlaneBufferCache::new();
        cache.ensure(0, 4).unwrap();
        cache.ensure(1, 2).unwrap();
        cache.ensure(2, 1).unwrap();
        let mut buffers = cache.buffers_mut(2);
        assert_eq!(buffers.len(), 2);
        buffers[0].fill(1);
        buffers[1].fill(2);
        drop(buffers);
        assert_eq!(cache.get(0), Some(&[1, 1, 1, 1][..]));
        assert_eq!(cache.get(1), Some(&[2, 2][..]));
        assert_eq!(cache.get(2), Some(&[0][..]));
    }
}
