use core::fmt;
use core::str::FromStr;

use crate::error::UnknownFormat;

/// Maximum number of planes a single frame can carry.
pub const MAX_PLANES: usize = 3;

/// Luma/chroma value-range convention of a YUV plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueRange {
    /// 0..255 luma and chroma (Rec. 709 style).
    Full,
    /// Video (NTSC) range, luma 16..235.
    Video,
    /// SMPTE 170M.
    SmpteC,
}

impl ValueRange {
    const ALL: [ValueRange; 3] = [ValueRange::Full, ValueRange::Video, ValueRange::SmpteC];

    fn suffix(self) -> &'static str {
        match self {
            Self::Full => "_Full",
            Self::Video => "_Ntsc",
            Self::SmpteC => "_Smptec",
        }
    }
}

/// How samples in a plane are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleClass {
    Integer,
    Float,
    /// One plane of palette entries plus one plane of 8-bit indexes.
    Palettised,
}

/// Channel arrangement of one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneLayout {
    pub channels: u8,
    pub bytes_per_channel: u8,
}

impl PlaneLayout {
    const fn new(channels: u8, bytes_per_channel: u8) -> Self {
        PlaneLayout {
            channels,
            bytes_per_channel,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.channels as usize * self.bytes_per_channel as usize
    }
}

const U8X1: PlaneLayout = PlaneLayout::new(1, 1);
const U8X2: PlaneLayout = PlaneLayout::new(2, 1);
const U8X3: PlaneLayout = PlaneLayout::new(3, 1);
const U8X4: PlaneLayout = PlaneLayout::new(4, 1);
const U16X1: PlaneLayout = PlaneLayout::new(1, 2);
const F32X1: PlaneLayout = PlaneLayout::new(1, 4);
const F32X2: PlaneLayout = PlaneLayout::new(2, 4);
const F32X3: PlaneLayout = PlaneLayout::new(3, 4);
const F32X4: PlaneLayout = PlaneLayout::new(4, 4);

/// Plane arrangement and sample class of a [`PixelFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatLayout {
    planes: &'static [PlaneLayout],
    pub sample: SampleClass,
    pub value_range: Option<ValueRange>,
}

impl FormatLayout {
    const fn integer(planes: &'static [PlaneLayout]) -> Self {
        FormatLayout {
            planes,
            sample: SampleClass::Integer,
            value_range: None,
        }
    }

    const fn yuv(planes: &'static [PlaneLayout], value_range: Option<ValueRange>) -> Self {
        FormatLayout {
            planes,
            sample: SampleClass::Integer,
            value_range,
        }
    }

    pub fn planes(&self) -> &'static [PlaneLayout] {
        self.planes
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn plane(&self, index: usize) -> Option<PlaneLayout> {
        self.planes.get(index).copied()
    }

    pub fn channels_per_plane(&self) -> impl Iterator<Item = u8> + '_ {
        self.planes.iter().map(|p| p.channels)
    }

    pub fn is_float(&self) -> bool {
        self.sample == SampleClass::Float
    }
}

/// The closed set of pixel formats the native layer can report.
///
/// Wire names follow the `Planes_Separated_By_Underscore` convention, with an
/// optional `_Full`, `_Ntsc` or `_Smptec` range suffix on YUV and luma
/// formats. A bare YUV name leaves the range up to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    Greyscale,
    GreyscaleAlpha,
    Rgb,
    Rgba,
    Argb,
    Bgra,
    Bgr,

    /// 13 bits of depth plus 3 bits of user index.
    KinectDepth,
    FreenectDepth10bit,
    FreenectDepth11bit,
    FreenectDepthMm,
    Depth16Mm,
    DepthFloatMetres,

    /// Luma plane followed by an interleaved half-size UV plane.
    Yuv8_88(Option<ValueRange>),
    /// Luma, U and V as three planes.
    Yuv8_8_8(Option<ValueRange>),
    /// 4:2:2 interleaved luma/chroma, treated as two channels.
    Yuv844(Option<ValueRange>),
    Uvy844(Option<ValueRange>),
    Uyvy,
    Luma(Option<ValueRange>),

    ChromaUv8_8,
    ChromaUv88,
    ChromaU8,
    ChromaV8,
    ChromaUv44,

    PalettisedRgb8,
    PalettisedRgba8,

    Float1,
    Float2,
    Float3,
    Float4,
}

impl PixelFormat {
    /// Plane arrangement, channel counts and sample class of this format.
    pub fn describe(self) -> FormatLayout {
        use PixelFormat::*;
        match self {
            Greyscale => FormatLayout::integer(&[U8X1]),
            GreyscaleAlpha => FormatLayout::integer(&[U8X2]),
            Rgb | Bgr => FormatLayout::integer(&[U8X3]),
            Rgba | Argb | Bgra => FormatLayout::integer(&[U8X4]),

            KinectDepth | FreenectDepth10bit | FreenectDepth11bit | FreenectDepthMm
            | Depth16Mm => FormatLayout::integer(&[U16X1]),
            DepthFloatMetres => FormatLayout {
                planes: &[F32X1],
                sample: SampleClass::Float,
                value_range: None,
            },

            Yuv8_88(range) => FormatLayout::yuv(&[U8X1, U8X2], range),
            Yuv8_8_8(range) => FormatLayout::yuv(&[U8X1, U8X1, U8X1], range),
            Yuv844(range) | Uvy844(range) => FormatLayout::yuv(&[U8X2], range),
            Luma(range) => FormatLayout::yuv(&[U8X1], range),
            Uyvy => FormatLayout::integer(&[U8X2]),

            ChromaUv8_8 => FormatLayout::integer(&[U8X1, U8X1]),
            ChromaUv88 => FormatLayout::integer(&[U8X2]),
            ChromaU8 | ChromaV8 | ChromaUv44 => FormatLayout::integer(&[U8X1]),

            PalettisedRgb8 => FormatLayout {
                planes: &[U8X3, U8X1],
                sample: SampleClass::Palettised,
                value_range: None,
            },
            PalettisedRgba8 => FormatLayout {
                planes: &[U8X4, U8X1],
                sample: SampleClass::Palettised,
                value_range: None,
            },

            Float1 => float_layout(&[F32X1]),
            Float2 => float_layout(&[F32X2]),
            Float3 => float_layout(&[F32X3]),
            Float4 => float_layout(&[F32X4]),
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::KinectDepth
                | Self::FreenectDepth10bit
                | Self::FreenectDepth11bit
                | Self::FreenectDepthMm
                | Self::Depth16Mm
                | Self::DepthFloatMetres
        )
    }

    fn base_name(self) -> &'static str {
        use PixelFormat::*;
        match self {
            Greyscale => "Greyscale",
            GreyscaleAlpha => "GreyscaleAlpha",
            Rgb => "RGB",
            Rgba => "RGBA",
            Argb => "ARGB",
            Bgra => "BGRA",
            Bgr => "BGR",
            KinectDepth => "KinectDepth",
            FreenectDepth10bit => "FreenectDepth10bit",
            FreenectDepth11bit => "FreenectDepth11bit",
            FreenectDepthMm => "FreenectDepthmm",
            Depth16Mm => "Depth16mm",
            DepthFloatMetres => "DepthFloatMetres",
            Yuv8_88(_) => "Yuv_8_88",
            Yuv8_8_8(_) => "Yuv_8_8_8",
            Yuv844(_) => "Yuv_844",
            Uvy844(_) => "Uvy_844",
            Uyvy => "uyvy",
            Luma(_) => "Luma",
            ChromaUv8_8 => "ChromaUV_8_8",
            ChromaUv88 => "ChromaUV_88",
            ChromaU8 => "ChromaU_8",
            ChromaV8 => "ChromaV_8",
            ChromaUv44 => "ChromaUV_44",
            PalettisedRgb8 => "Palettised_RGB_8",
            PalettisedRgba8 => "Palettised_RGBA_8",
            Float1 => "Float1",
            Float2 => "Float2",
            Float3 => "Float3",
            Float4 => "Float4",
        }
    }

    fn range(self) -> Option<ValueRange> {
        match self {
            Self::Yuv8_88(r) | Self::Yuv8_8_8(r) | Self::Yuv844(r) | Self::Uvy844(r) | Self::Luma(r) => r,
            _ => None,
        }
    }

    fn from_base(base: &str, range: Option<ValueRange>) -> Option<Self> {
        use PixelFormat::*;
        let ranged = match base {
            "Yuv_8_88" => Some(Yuv8_88(range)),
            "Yuv_8_8_8" => Some(Yuv8_8_8(range)),
            "Yuv_844" => Some(Yuv844(range)),
            "Uvy_844" => Some(Uvy844(range)),
            "Luma" => Some(Luma(range)),
            _ => None,
        };
        if ranged.is_some() || range.is_some() {
            return ranged;
        }

        let plain = match base {
            "Greyscale" => Greyscale,
            "GreyscaleAlpha" => GreyscaleAlpha,
            "RGB" => Rgb,
            "RGBA" => Rgba,
            "ARGB" => Argb,
            "BGRA" => Bgra,
            "BGR" => Bgr,
            "KinectDepth" => KinectDepth,
            "FreenectDepth10bit" => FreenectDepth10bit,
            "FreenectDepth11bit" => FreenectDepth11bit,
            "FreenectDepthmm" => FreenectDepthMm,
            "Depth16mm" => Depth16Mm,
            "DepthFloatMetres" => DepthFloatMetres,
            "uyvy" => Uyvy,
            "ChromaUV_8_8" => ChromaUv8_8,
            "ChromaUV_88" => ChromaUv88,
            "ChromaU_8" => ChromaU8,
            "ChromaV_8" => ChromaV8,
            "ChromaUV_44" => ChromaUv44,
            "Palettised_RGB_8" => PalettisedRgb8,
            "Palettised_RGBA_8" => PalettisedRgba8,
            "Float1" => Float1,
            "Float2" => Float2,
            "Float3" => Float3,
            "Float4" => Float4,
            // Shorthand names
            "Nv12" | "NV12" => Yuv8_88(Some(ValueRange::Full)),
            "I420" => Yuv8_8_8(Some(ValueRange::Full)),
            "YUY2" => Yuv844(None),
            _ => return None,
        };
        Some(plain)
    }
}

fn float_layout(planes: &'static [PlaneLayout]) -> FormatLayout {
    FormatLayout {
        planes,
        sample: SampleClass::Float,
        value_range: None,
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())?;
        if let Some(range) = self.range() {
            f.write_str(range.suffix())?;
        }
        Ok(())
    }
}

impl FromStr for PixelFormat {
    type Err = UnknownFormat;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let (base, range) = ValueRange::ALL
            .iter()
            .find_map(|r| name.strip_suffix(r.suffix()).map(|base| (base, Some(*r))))
            .unwrap_or((name, None));

        PixelFormat::from_base(base, range).ok_or_else(|| UnknownFormat(name.to_owned()))
    }
}

/// Looks up the layout of a wire format name.
pub fn describe(name: &str) -> Result<FormatLayout, UnknownFormat> {
    name.parse::<PixelFormat>().map(PixelFormat::describe)
}

/// Pixel dimensions of a frame or plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn is_zero(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// Frame time as reported by the native layer (milliseconds on most backends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u32);

impl Timestamp {
    /// Interprets a native return value, where any negative value means "no frame".
    pub fn from_native(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().map(Timestamp)
    }

    pub fn ticks(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Native library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Splits the packed `A.BBB.CCCCCC` decimal encoding.
    pub fn from_packed(packed: i32) -> Self {
        let packed = packed.max(0) as u32;
        Version {
            major: packed / 1_000_000_000,
            minor: (packed / 1_000_000) % 1000,
            patch: packed % 1_000_000,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
