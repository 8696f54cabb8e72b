//! Decoding of the JSON documents the native layer writes.
//!
//! ```text
//! DeviceMetas = { devices: [{ serial, formats: [string] }] }
//! FrameMeta   = { planes: [{ format, width, height, dataSize, channels }] }
//! ```
//!
//! Field names are accepted in camelCase and in the PascalCase native
//! libraries emit (`Serial`, `Planes`, `DataSize`, ...).

use arrayvec::ArrayVec;
use serde::Deserialize;

use crate::error::{FormatStringError, FrameError, Result};
use crate::format::FormatDescriptor;
use crate::types::{MAX_PLANES, PixelFormat, Size};

/// Largest plane, in bytes, a frame may ask the session to allocate.
pub const MAX_PLANE_BYTES: usize = 1 << 30;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDeviceList {
    #[serde(alias = "Devices")]
    devices: Vec<WireDevice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireDevice {
    #[serde(alias = "Serial")]
    serial: String,
    #[serde(alias = "Formats")]
    formats: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireFrame {
    #[serde(alias = "Planes")]
    planes: Vec<WirePlane>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WirePlane {
    #[serde(alias = "Format")]
    format: String,
    #[serde(alias = "Width")]
    width: u32,
    #[serde(alias = "Height")]
    height: u32,
    #[serde(alias = "DataSize")]
    data_size: u64,
    #[serde(alias = "Channels")]
    channels: u32,
}

/// A device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Unique identifier, sometimes prefixed with the backend name.
    pub serial: String,
    /// Advertised format strings. Empty when the device only knows its
    /// format once the first frame arrives.
    pub formats: Vec<String>,
}

impl DeviceDescriptor {
    pub fn parse_list(json: &str) -> Result<Vec<DeviceDescriptor>> {
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        let list: WireDeviceList = serde_json::from_str(json)?;
        Ok(list
            .devices
            .into_iter()
            .map(|d| DeviceDescriptor {
                serial: d.serial,
                formats: d.formats,
            })
            .collect())
    }

    /// Parses each advertised format string, in order.
    pub fn parsed_formats(
        &self,
    ) -> impl Iterator<Item = core::result::Result<FormatDescriptor, FormatStringError>> + '_ {
        self.formats.iter().map(|f| FormatDescriptor::parse(f))
    }
}

/// Metadata for one plane of a pending frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneMeta {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Byte length announced by the native layer; zero if it was omitted.
    pub data_size: usize,
    pub channels: u8,
    pub bytes_per_channel: u8,
}

impl PlaneMeta {
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    /// Saturates rather than overflowing on absurd widths.
    pub fn bytes_per_row(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.channels as usize)
            .saturating_mul(self.bytes_per_channel as usize)
    }

    /// Size of the buffer this plane must be popped into.
    ///
    /// The native figure wins when present (palettised planes carry a length
    /// prefix the geometry does not account for); otherwise it is derived.
    /// Decoded metadata never exceeds [`MAX_PLANE_BYTES`] here.
    pub fn required_size(&self) -> usize {
        if self.data_size > 0 {
            self.data_size
        } else {
            self.bytes_per_row().saturating_mul(self.height as usize)
        }
    }
}

/// Metadata for a pending frame: between one and [`MAX_PLANES`] planes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameMeta {
    planes: ArrayVec<PlaneMeta, MAX_PLANES>,
}

impl FrameMeta {
    /// Decodes and validates a peeked frame's metadata.
    pub fn decode(json: &str) -> core::result::Result<Self, FrameError> {
        let wire: WireFrame = serde_json::from_str(json)
            .map_err(|e| FrameError::Protocol(format!("malformed frame metadata: {e}")))?;

        if wire.planes.is_empty() {
            return Err(FrameError::Protocol("pending frame has no planes".into()));
        }
        if wire.planes.len() > MAX_PLANES {
            return Err(FrameError::Protocol(format!(
                "frame has {} planes, at most {MAX_PLANES} are supported",
                wire.planes.len()
            )));
        }

        let mut planes = ArrayVec::new();
        for (index, plane) in wire.planes.into_iter().enumerate() {
            planes.push(decode_plane(index, plane)?);
        }
        Ok(FrameMeta { planes })
    }

    pub fn planes(&self) -> &[PlaneMeta] {
        &self.planes
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }
}

fn decode_plane(index: usize, wire: WirePlane) -> core::result::Result<PlaneMeta, FrameError> {
    let pixel_format: PixelFormat = wire.format.parse()?;
    let layout = pixel_format.describe();

    // Planes of a split multi-planar frame each report the frame's format;
    // a single-plane format applies to whichever plane it is on.
    let expected = layout
        .plane(index)
        .or_else(|| layout.plane(0))
        .ok_or_else(|| FrameError::Protocol(format!("{pixel_format} has no planes")))?;
    if wire.channels != u32::from(expected.channels) {
        return Err(FrameError::Protocol(format!(
            "plane {index} reports {} channels but {pixel_format} has {}",
            wire.channels, expected.channels
        )));
    }

    let data_size = usize::try_from(wire.data_size)
        .map_err(|_| FrameError::Protocol(format!("plane {index} data size overflows")))?;

    let plane = PlaneMeta {
        pixel_format,
        width: wire.width,
        height: wire.height,
        data_size,
        channels: expected.channels,
        bytes_per_channel: expected.bytes_per_channel,
    };
    let required = plane.required_size();
    if required > MAX_PLANE_BYTES {
        return Err(FrameError::Protocol(format!(
            "plane {index} needs {required} bytes, at most {MAX_PLANE_BYTES} are allowed"
        )));
    }
    Ok(plane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueRange;
    use serde_json::json;

    #[test]
    fn device_list_accepts_both_casings() {
        let lower = json!({"devices": [{"serial": "cam0", "formats": ["RGBA^640x480@30"]}]});
        let upper = json!({"Devices": [{"Serial": "Test", "Formats": []}]});

        let devices = DeviceDescriptor::parse_list(&lower.to_string()).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].serial, "cam0");
        let formats: Vec<_> = devices[0].parsed_formats().collect();
        assert_eq!(formats[0].as_ref().unwrap().frame_rate, 30);

        let devices = DeviceDescriptor::parse_list(&upper.to_string()).unwrap();
        assert_eq!(devices[0].serial, "Test");
        assert!(devices[0].formats.is_empty());
    }

    #[test]
    fn empty_enumeration_is_not_an_error() {
        assert!(DeviceDescriptor::parse_list("").unwrap().is_empty());
        assert!(DeviceDescriptor::parse_list("{}").unwrap().is_empty());
        assert!(DeviceDescriptor::parse_list(r#"{"devices":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn decodes_bi_planar_yuv_frame() {
        let json = json!({"planes": [
            {"format": "Yuv_8_88_Full", "width": 640, "height": 480, "dataSize": 307200, "channels": 1},
            {"format": "Yuv_8_88_Full", "width": 320, "height": 240, "dataSize": 153600, "channels": 2},
        ]});
        let meta = FrameMeta::decode(&json.to_string()).unwrap();
        assert_eq!(meta.plane_count(), 2);
        let chroma = meta.planes()[1];
        assert_eq!(chroma.pixel_format, PixelFormat::Yuv8_88(Some(ValueRange::Full)));
        assert_eq!(chroma.channels, 2);
        assert_eq!(chroma.required_size(), 153600);
        assert_eq!(chroma.bytes_per_row(), 640);
    }

    #[test]
    fn native_pascal_case_frame_meta() {
        let json = r#"{"Planes":[{"Width":4,"Height":2,"Format":"RGBA","DataSize":32,"Channels":4}]}"#;
        let meta = FrameMeta::decode(json).unwrap();
        assert_eq!(meta.planes()[0].size(), Size { width: 4, height: 2 });
    }

    #[test]
    fn missing_data_size_is_derived_from_geometry() {
        let json = json!({"planes": [{"format": "Depth16mm", "width": 10, "height": 3, "channels": 1}]});
        let meta = FrameMeta::decode(&json.to_string()).unwrap();
        assert_eq!(meta.planes()[0].data_size, 0);
        assert_eq!(meta.planes()[0].required_size(), 10 * 3 * 2);
    }

    #[test]
    fn zero_planes_is_a_protocol_error() {
        let err = FrameMeta::decode(r#"{"planes":[]}"#).unwrap_err();
        assert!(matches!(err, FrameError::Protocol(_)));
        let err = FrameMeta::decode("{}").unwrap_err();
        assert!(matches!(err, FrameError::Protocol(_)));
    }

    #[test]
    fn too_many_planes_is_a_protocol_error() {
        let plane = json!({"format": "Greyscale", "width": 1, "height": 1, "channels": 1});
        let json = json!({"planes": [plane, plane, plane, plane]});
        assert!(matches!(
            FrameMeta::decode(&json.to_string()),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn channel_mismatch_is_a_protocol_error() {
        let json = json!({"planes": [{"format": "RGBA", "width": 1, "height": 1, "channels": 3}]});
        let err = FrameMeta::decode(&json.to_string()).unwrap_err();
        assert!(err.to_string().contains("reports 3 channels"));
    }

    #[test]
    fn unknown_plane_format_is_reported_as_such() {
        let json = json!({"planes": [{"format": "avc1", "width": 1, "height": 1, "channels": 1}]});
        assert!(matches!(
            FrameMeta::decode(&json.to_string()),
            Err(FrameError::UnknownFormat(_))
        ));
    }

    #[test]
    fn oversized_geometry_is_a_protocol_error() {
        let json = json!({"planes": [{
            "format": "Float4",
            "width": u32::MAX,
            "height": u32::MAX,
            "channels": 4,
        }]});
        let err = FrameMeta::decode(&json.to_string()).unwrap_err();
        assert!(matches!(err, FrameError::Protocol(_)));
    }

    #[test]
    fn oversized_data_size_is_a_protocol_error() {
        let json = json!({"planes": [{
            "format": "Greyscale",
            "width": 4,
            "height": 4,
            "dataSize": i64::MAX,
            "channels": 1,
        }]});
        assert!(matches!(
            FrameMeta::decode(&json.to_string()),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn geometry_at_the_ceiling_is_accepted() {
        let json = json!({"planes": [{"format": "Greyscale", "width": 1 << 15, "height": 1 << 15, "channels": 1}]});
        let meta = FrameMeta::decode(&json.to_string()).unwrap();
        assert_eq!(meta.planes()[0].required_size(), MAX_PLANE_BYTES);
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        assert!(matches!(FrameMeta::decode("{not json"), Err(FrameError::Protocol(_))));
    }
}
