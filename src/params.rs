use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Well-known backend toggles. Backends ignore the ones they do not support.
pub mod feature {
    pub const HDR_COLOUR: &str = "HdrColour";
    pub const AUTO_FOCUS: &str = "AutoFocus";
    pub const PLANE_TRACKING: &str = "PlaneTracking";
    pub const FACE_TRACKING: &str = "FaceTracking";
    pub const LIGHT_ESTIMATION: &str = "LightEstimation";
    pub const BODY_TRACKING: &str = "BodyTracking";
    pub const SEGMENTATION: &str = "Segmentation";
    pub const RESET_TRACKING: &str = "ResetTracking";
    pub const RESET_ANCHORS: &str = "ResetAnchors";
}

/// Capture negotiation request sent to the native layer as JSON.
///
/// Every field has a default, so a partial JSON document (or `{}`) is a
/// valid configuration. Keys that are not recognised here are kept as
/// backend toggles and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeviceParams {
    /// Drop queued frames and deliver only the latest.
    pub skip_frames: bool,
    /// Requested rate; devices treat it as a hint.
    pub frame_rate: u32,
    /// Colour pixel format request, e.g. `Yuv_8_88`.
    pub format: String,
    /// Depth pixel format request, e.g. `Depth16mm`.
    pub depth_format: String,
    /// Extra verbose output from the native layer.
    pub debug: bool,
    /// Deliver each plane in its own buffer rather than packed.
    pub split_planes: bool,
    /// Backend-specific options, mostly boolean toggles such as
    /// [`feature::AUTO_FOCUS`]. Passed through verbatim.
    #[serde(flatten)]
    pub features: BTreeMap<String, Value>,
}

impl Default for DeviceParams {
    fn default() -> Self {
        DeviceParams {
            skip_frames: true,
            frame_rate: 30,
            format: "Yuv_8_88".to_owned(),
            depth_format: "Depth16mm".to_owned(),
            debug: false,
            split_planes: true,
            features: BTreeMap::new(),
        }
    }
}

impl DeviceParams {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_depth_format(mut self, format: impl Into<String>) -> Self {
        self.depth_format = format.into();
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_skip_frames(mut self, skip: bool) -> Self {
        self.skip_frames = skip;
        self
    }

    pub fn with_split_planes(mut self, split: bool) -> Self {
        self.split_planes = split;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_feature(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.features.insert(name.into(), Value::Bool(enabled));
        self
    }

    /// Sets a non-boolean backend option, e.g. a test pattern's sphere radius.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.features.insert(name.into(), value.into());
        self
    }

    pub fn feature(&self, name: &str) -> Option<bool> {
        self.features.get(name).and_then(Value::as_bool)
    }
}
