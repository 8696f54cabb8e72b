use arrayvec::ArrayVec;
use tracing::{debug, trace, warn};

use crate::backend::{NativeBackend, NativeHandle, read_c_str};
use crate::cache::PlaneBufferCache;
use crate::error::{Error, FrameError, Result};
use crate::frame::{Frame, Plane};
use crate::meta::FrameMeta;
use crate::params::DeviceParams;
use crate::types::{MAX_PLANES, Timestamp};

/// Capacity of the buffer peeked frame metadata is written into.
pub const FRAME_META_CAPACITY: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceState {
    Active(NativeHandle),
    Released,
}

/// Counters kept by a [`DeviceSession`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames delivered to the caller.
    pub frames: u64,
    /// Polls that ended in a [`FrameError`].
    pub failed_frames: u64,
    /// Frames popped without being delivered.
    pub discarded_frames: u64,
    /// Plane buffer allocations, including the first one per plane.
    pub reallocations: u64,
}

/// Result of [`DeviceSession::poll`].
#[derive(Debug)]
pub enum PollResult<'a> {
    Frame(Frame<'a>),
    /// Nothing pending. The common case on most ticks.
    NoFrame,
    /// This frame was lost; the session can be polled again.
    Failed(FrameError),
}

impl<'a> PollResult<'a> {
    pub fn is_frame(&self) -> bool {
        matches!(self, Self::Frame(_))
    }

    pub fn frame(self) -> Option<Frame<'a>> {
        match self {
            Self::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn into_result(self) -> core::result::Result<Option<Frame<'a>>, FrameError> {
        match self {
            Self::Frame(frame) => Ok(Some(frame)),
            Self::NoFrame => Ok(None),
            Self::Failed(e) => Err(e),
        }
    }
}

/// An open native device and the buffers its frames are popped into.
///
/// Opening creates the native instance; dropping or [`close`](Self::close)
/// releases it, exactly once. A closed session answers every poll with
/// [`PollResult::NoFrame`].
///
/// Polling takes `&mut self`, so a peek and its pop can never interleave with
/// another caller's on the same session.
pub struct DeviceSession<B: NativeBackend> {
    backend: B,
    name: String,
    state: DeviceState,
    advisory: Option<String>,
    cache: PlaneBufferCache,
    meta: FrameMeta,
    meta_json: Box<[u8]>,
    last_timestamp: Option<Timestamp>,
    stats: SessionStats,
}

impl<B: NativeBackend> DeviceSession<B> {
    pub fn open(backend: B, name: &str, params: &DeviceParams) -> Result<Self> {
        let params_json = params.to_json()?;
        let created = backend.create_device(name, &params_json)?;

        let Some(handle) = created.handle else {
            let reason = if created.message.is_empty() {
                "native layer returned an invalid instance".to_owned()
            } else {
                created.message
            };
            return Err(Error::DeviceCreationFailed {
                name: name.to_owned(),
                reason,
            });
        };

        let advisory = (!created.message.is_empty()).then_some(created.message);
        if let Some(message) = &advisory {
            warn!(
                device = name,
                instance = handle.as_raw(),
                message = %message,
                "camera device created with a non-fatal message"
            );
        }
        debug!(device = name, instance = handle.as_raw(), params = %params_json, "opened camera device");

        Ok(DeviceSession {
            backend,
            name: name.to_owned(),
            state: DeviceState::Active(handle),
            advisory,
            cache: PlaneBufferCache::new(),
            meta: FrameMeta::default(),
            meta_json: vec![0u8; FRAME_META_CAPACITY].into_boxed_slice(),
            last_timestamp: None,
            stats: SessionStats::default(),
        })
    }

    /// Fetches the next frame if one is pending.
    ///
    /// Peeks the frame's metadata, sizes the plane buffers to match, then
    /// pops the pixels into them. The popped frame must be the one that was
    /// peeked, otherwise the result is [`FrameError::Desync`].
    pub fn poll(&mut self) -> PollResult<'_> {
        let DeviceState::Active(handle) = self.state else {
            trace!(device = %self.name, "poll on closed session");
            return PollResult::NoFrame;
        };

        self.meta_json[0] = 0;
        let peeked = match self.backend.peek_next_frame(handle, &mut self.meta_json) {
            Ok(Some(timestamp)) => timestamp,
            Ok(None) => {
                trace!(device = %self.name, "no frame pending");
                return PollResult::NoFrame;
            }
            Err(e) => return self.fail(e.into()),
        };

        let meta = match read_c_str(&self.meta_json) {
            Some(json) => FrameMeta::decode(json),
            None => Err(FrameError::Protocol(format!(
                "frame metadata exceeds {FRAME_META_CAPACITY} bytes"
            ))),
        };
        let meta = match meta {
            Ok(meta) => meta,
            Err(e) => {
                self.discard_pending(handle, peeked);
                return self.fail(e);
            }
        };

        for (index, plane) in meta.planes().iter().enumerate() {
            if let Err(e) = self.cache.ensure(index, plane.required_size()) {
                self.discard_pending(handle, peeked);
                return self.fail(e);
            }
        }

        let popped = {
            let mut buffers = self.cache.buffers_mut(meta.plane_count());
            self.backend.pop_next_frame(handle, &mut buffers)
        };
        let popped = match popped {
            Ok(popped) => popped,
            Err(e) => return self.fail(e.into()),
        };
        if popped != Some(peeked) {
            return self.fail(FrameError::Desync { peeked, popped });
        }

        if let Some(last) = self.last_timestamp {
            if peeked < last {
                warn!(device = %self.name, %last, current = %peeked, "frame timestamp went backwards");
            }
        }
        self.last_timestamp = Some(peeked);
        self.meta = meta;
        self.stats.frames += 1;

        let planes: ArrayVec<Plane<'_>, MAX_PLANES> = self
            .meta
            .planes()
            .iter()
            .enumerate()
            .map(|(index, meta)| Plane {
                data: self.cache.get(index).unwrap_or_default(),
                meta: *meta,
            })
            .collect();
        PollResult::Frame(Frame::new(peeked, planes))
    }

    /// [`poll`](Self::poll) for callers that propagate with `?`.
    ///
    /// A lost frame becomes an [`Error`]; the session can still be polled
    /// afterwards.
    pub fn try_poll(&mut self) -> Result<Option<Frame<'_>>> {
        Ok(self.poll().into_result()?)
    }

    /// Pops and drops the pending frame without copying it out.
    ///
    /// Returns the discarded frame's timestamp, or `None` if nothing was
    /// pending or the session is closed.
    pub fn discard_frame(&mut self) -> Result<Option<Timestamp>> {
        let DeviceState::Active(handle) = self.state else {
            return Ok(None);
        };
        let popped = self.backend.pop_next_frame(handle, &mut [])?;
        if popped.is_some() {
            self.stats.discarded_frames += 1;
        }
        Ok(popped)
    }

    /// Releases the native device. Further calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        match core::mem::replace(&mut self.state, DeviceState::Released) {
            DeviceState::Active(handle) => {
                debug!(device = %self.name, instance = handle.as_raw(), "closing camera device");
                self.backend.free_device(handle)?;
                Ok(())
            }
            DeviceState::Released => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DeviceState::Active(_))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> Option<NativeHandle> {
        match self.state {
            DeviceState::Active(handle) => Some(handle),
            DeviceState::Released => None,
        }
    }

    /// Message the native layer attached to a successful creation, if any.
    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    /// Metadata of the last delivered frame.
    pub fn last_frame_meta(&self) -> &FrameMeta {
        &self.meta
    }

    pub fn buffers(&self) -> &PlaneBufferCache {
        &self.cache
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            reallocations: self.cache.total_allocations(),
            ..self.stats
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn fail(&mut self, error: FrameError) -> PollResult<'static> {
        debug!(device = %self.name, %error, "frame lost");
        self.stats.failed_frames += 1;
        PollResult::Failed(error)
    }

    // A frame that cannot be delivered is popped anyway so the next poll
    // sees the one after it.
    fn discard_pending(&mut self, handle: NativeHandle, peeked: Timestamp) {
        match self.backend.pop_next_frame(handle, &mut []) {
            Ok(popped) => {
                self.stats.discarded_frames += 1;
                debug!(device = %self.name, %peeked, ?popped, "discarded undeliverable frame");
            }
            Err(e) => {
                warn!(device = %self.name, %peeked, error = %e, "failed to discard undeliverable frame");
            }
        }
    }
}

impl<B: NativeBackend> Drop for DeviceSession<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(device = %self.name, error = %e, "failed to release camera device");
        }
    }
}

impl<B: NativeBackend> core::fmt::Debug for DeviceSession<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("advisory", &self.advisory)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
