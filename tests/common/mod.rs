//! Scripted in-process backend for driving sessions without hardware.

#![allow(dead_code)]

use std::cell::{RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;

use camera_pull::{CreatedDevice, NativeBackend, NativeError, NativeHandle, Timestamp, write_c_str};
use serde_json::json;

/// A queued frame: the metadata a peek reports and the bytes a pop copies out.
#[derive(Debug, Clone)]
pub struct MockFrame {
    pub timestamp: u32,
    pub meta: String,
    pub planes: Vec<Vec<u8>>,
}

impl MockFrame {
    /// One plane per `(format, width, height, channels)` tuple, one byte per
    /// channel, filled with a byte derived from the timestamp.
    pub fn new(timestamp: u32, planes: &[(&str, u32, u32, u32)]) -> Self {
        let meta = json!({
            "planes": planes
                .iter()
                .map(|&(format, width, height, channels)| json!({
                    "format": format,
                    "width": width,
                    "height": height,
                    "channels": channels,
                }))
                .collect::<Vec<_>>(),
        });
        let data = planes
            .iter()
            .enumerate()
            .map(|(index, &(_, width, height, channels))| {
                vec![fill_byte(timestamp, index); (width * height * channels) as usize]
            })
            .collect();
        MockFrame {
            timestamp,
            meta: meta.to_string(),
            planes: data,
        }
    }

    /// A frame whose metadata is passed through verbatim.
    pub fn raw(timestamp: u32, meta: &str) -> Self {
        MockFrame {
            timestamp,
            meta: meta.to_owned(),
            planes: Vec::new(),
        }
    }
}

pub fn fill_byte(timestamp: u32, plane: usize) -> u8 {
    (timestamp as u8).wrapping_add(plane as u8)
}

#[derive(Debug)]
pub struct MockState {
    pub devices_json: String,
    pub create_result: (i32, String),
    pub frames: VecDeque<MockFrame>,
    /// Offset added to the next popped timestamp, then cleared.
    pub desync_next_pop: Option<u32>,
    pub version: i32,

    pub created: Vec<(String, String)>,
    pub freed: Vec<i32>,
    pub cleanups: u32,
    pub peeks: u32,
    /// Lengths of the buffers passed to each pop.
    pub pops: Vec<Vec<usize>>,
    /// Buffer sizes passed to each enumeration.
    pub enumerations: Vec<usize>,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            devices_json: r#"{"devices":[]}"#.to_owned(),
            create_result: (1, String::new()),
            frames: VecDeque::new(),
            desync_next_pop: None,
            version: 0,
            created: Vec::new(),
            freed: Vec::new(),
            cleanups: 0,
            peeks: 0,
            pops: Vec::new(),
            enumerations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RefMut<'_, MockState> {
        self.state.borrow_mut()
    }

    pub fn push_frame(&self, frame: MockFrame) {
        self.state().frames.push_back(frame);
    }
}

impl NativeBackend for MockBackend {
    fn enumerate_devices(&self, json: &mut [u8]) -> Result<(), NativeError> {
        let mut state = self.state();
        state.enumerations.push(json.len());
        let text = state.devices_json.as_bytes();
        if text.len() >= json.len() {
            // Fill completely with no terminator, like a native layer that ran out of room.
            let len = json.len();
            json.copy_from_slice(&text[..len]);
        } else {
            write_c_str(&state.devices_json, json);
        }
        Ok(())
    }

    fn create_device(&self, name: &str, params_json: &str) -> Result<CreatedDevice, NativeError> {
        let mut state = self.state();
        state.created.push((name.to_owned(), params_json.to_owned()));
        let (raw, message) = state.create_result.clone();
        Ok(CreatedDevice {
            handle: NativeHandle::from_raw(raw),
            message,
        })
    }

    fn free_device(&self, handle: NativeHandle) -> Result<(), NativeError> {
        self.state().freed.push(handle.as_raw());
        Ok(())
    }

    fn peek_next_frame(
        &self,
        _handle: NativeHandle,
        meta_json: &mut [u8],
    ) -> Result<Option<Timestamp>, NativeError> {
        let mut state = self.state();
        state.peeks += 1;
        let Some(frame) = state.frames.front() else {
            return Ok(None);
        };
        write_c_str(&frame.meta, meta_json);
        Ok(Some(Timestamp(frame.timestamp)))
    }

    fn pop_next_frame(
        &self,
        _handle: NativeHandle,
        planes: &mut [&mut [u8]],
    ) -> Result<Option<Timestamp>, NativeError> {
        let mut state = self.state();
        state.pops.push(planes.iter().map(|p| p.len()).collect());
        let Some(frame) = state.frames.pop_front() else {
            return Ok(None);
        };
        for (dst, src) in planes.iter_mut().zip(&frame.planes) {
            let len = dst.len().min(src.len());
            dst[..len].copy_from_slice(&src[..len]);
        }
        let offset = state.desync_next_pop.take().unwrap_or(0);
        Ok(Some(Timestamp(frame.timestamp + offset)))
    }

    fn version(&self) -> Result<i32, NativeError> {
        Ok(self.state().version)
    }

    fn cleanup(&self) -> Result<(), NativeError> {
        self.state().cleanups += 1;
        Ok(())
    }
}
