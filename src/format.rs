//! Compact textual capture formats: `<FormatName>[^<Width>x<Height>][@<FrameRate>]`.
//!
//! Devices advertise their modes this way (`RGBA^640x480@30`, `Unknown@60`,
//! `Nv12^1024x1024`) and the same strings are accepted as capture requests.

use core::fmt;
use core::str::FromStr;

use crate::error::{FormatStringError, UnknownFormat};
use crate::types::{PixelFormat, Size};

/// Name used when a format string carries no pixel format.
pub const UNKNOWN_FORMAT_NAME: &str = "Unknown";

/// A parsed format string.
///
/// The name is kept verbatim since devices may advertise formats (codecs,
/// vendor formats) that are not in the [`PixelFormat`] catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormatDescriptor {
    pub name: String,
    /// Zero when the string carries no dimensions.
    pub size: Size,
    /// Zero when the string carries no frame rate.
    pub frame_rate: u32,
}

impl FormatDescriptor {
    pub fn new(name: impl Into<String>, size: Size, frame_rate: u32) -> Self {
        let name = name.into();
        let name = if name.is_empty() {
            UNKNOWN_FORMAT_NAME.to_owned()
        } else {
            name
        };
        FormatDescriptor {
            name,
            size,
            frame_rate,
        }
    }

    /// Builds a format string, omitting zero dimensions and a zero frame rate.
    pub fn compose(name: &str, width: u32, height: u32, frame_rate: u32) -> String {
        FormatDescriptor::new(name, Size { width, height }, frame_rate).to_string()
    }

    pub fn parse(input: &str) -> Result<Self, FormatStringError> {
        let err = |reason| FormatStringError {
            input: input.to_owned(),
            reason,
        };

        let (rest, frame_rate) = match input.split_once('@') {
            Some((rest, rate)) => (rest, parse_number(rate).ok_or_else(|| err("invalid frame rate"))?),
            None => (input, 0),
        };

        let (name, size) = match rest.split_once('^') {
            Some((name, dims)) => {
                let (w, h) = dims
                    .split_once('x')
                    .ok_or_else(|| err("dimensions must be <width>x<height>"))?;
                let width = parse_number(w).ok_or_else(|| err("invalid width"))?;
                let height = parse_number(h).ok_or_else(|| err("invalid height"))?;
                (name, Size { width, height })
            }
            None => (rest, Size::default()),
        };

        Ok(FormatDescriptor::new(name, size, frame_rate))
    }

    /// The catalog entry for this name, if it is a known pixel format.
    pub fn pixel_format(&self) -> Result<PixelFormat, UnknownFormat> {
        self.name.parse()
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_FORMAT_NAME
    }
}

impl From<PixelFormat> for FormatDescriptor {
    fn from(pf: PixelFormat) -> Self {
        FormatDescriptor::new(pf.to_string(), Size::default(), 0)
    }
}

// Digits only: no sign, no whitespace, no empty segment.
fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(UNKNOWN_FORMAT_NAME)?;
        } else {
            f.write_str(&self.name)?;
        }
        if !self.size.is_zero() {
            write!(f, "^{}x{}", self.size.width, self.size.height)?;
        }
        if self.frame_rate != 0 {
            write!(f, "@{}", self.frame_rate)?;
        }
        Ok(())
    }
}

impl FromStr for FormatDescriptor {
    type Err = FormatStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatDescriptor::parse(s)
    }
}
