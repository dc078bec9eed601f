// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Format Table
//!
//! Static catalogue of the memory formats the capture controller can write and
//! the media bus codes each one can be produced from. The catalogue is built
//! once on first use and shared by every coordinator without locking.
//!
//! The geometry helpers mirror the V4L2 `TRY_FMT` rules of the controller:
//! dimensions are clamped to [`MIN_WIDTH`]..=[`MAX_WIDTH`] and
//! [`MIN_HEIGHT`]..=[`MAX_HEIGHT`], and buffer sizes are derived from
//! [`bpp`].

use std::fmt;
use std::sync::OnceLock;

use crate::fourcc::FourCC;
use crate::mbus::MbusCode;

pub const MIN_WIDTH: u32 = 32;
pub const MIN_HEIGHT: u32 = 32;
pub const MAX_WIDTH: u32 = 4800;
pub const MAX_HEIGHT: u32 = 4800;

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;

/// CSI media bus format information
///
/// * `fourcc` - memory layout written by the DMA engine
/// * `mbus_code` - wire encoding expected from the sensor
/// * `bpp` - bits per pixel when stored in memory, always `bpp(fourcc)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsiFormat {
    pub fourcc: FourCC,
    pub mbus_code: MbusCode,
    pub bpp: u8,
}

impl CsiFormat {
    fn new(fourcc: FourCC, mbus_code: MbusCode) -> Self {
        CsiFormat {
            fourcc,
            mbus_code,
            bpp: bpp(fourcc),
        }
    }
}

impl fmt::Display for CsiFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {} ({} bpp)", self.fourcc, self.mbus_code, self.bpp)
    }
}

/// Bits per pixel of a memory format, or 0 for formats the controller does not
/// know. Planar 4:2:0 formats report their average cost (12).
pub fn bpp(fourcc: FourCC) -> u8 {
    match fourcc {
        FourCC::SBGGR8 | FourCC::SGBRG8 | FourCC::SGRBG8 | FourCC::SRGGB8 => 8,
        FourCC::SBGGR10 | FourCC::SGBRG10 | FourCC::SGRBG10 | FourCC::SRGGB10 => 10,
        FourCC::SBGGR12
        | FourCC::SGBRG12
        | FourCC::SGRBG12
        | FourCC::SRGGB12
        | FourCC::HM12
        | FourCC::NV12
        | FourCC::NV21
        | FourCC::YUV420
        | FourCC::YVU420 => 12,
        FourCC::YUYV
        | FourCC::YVYU
        | FourCC::UYVY
        | FourCC::VYUY
        | FourCC::RGB565
        | FourCC::RGB555
        | FourCC::NV16
        | FourCC::NV61
        | FourCC::YUV422P => 16,
        FourCC::RGB24 | FourCC::BGR24 => 24,
        FourCC::RGB32 | FourCC::BGR32 => 32,
        _ => 0,
    }
}

static CATALOGUE: OnceLock<Vec<CsiFormat>> = OnceLock::new();

/// Every (fourcc, mbus code) pairing the controller can produce, in preference
/// order. A fourcc may appear several times with different bus codes.
pub fn catalogue() -> &'static [CsiFormat] {
    CATALOGUE.get_or_init(build_catalogue)
}

fn build_catalogue() -> Vec<CsiFormat> {
    let bayer = [
        (FourCC::SBGGR8, MbusCode::SBGGR8_1X8),
        (FourCC::SGBRG8, MbusCode::SGBRG8_1X8),
        (FourCC::SGRBG8, MbusCode::SGRBG8_1X8),
        (FourCC::SRGGB8, MbusCode::SRGGB8_1X8),
        (FourCC::SBGGR10, MbusCode::SBGGR10_1X10),
        (FourCC::SGBRG10, MbusCode::SGBRG10_1X10),
        (FourCC::SGRBG10, MbusCode::SGRBG10_1X10),
        (FourCC::SRGGB10, MbusCode::SRGGB10_1X10),
        (FourCC::SBGGR12, MbusCode::SBGGR12_1X12),
        (FourCC::SGBRG12, MbusCode::SGBRG12_1X12),
        (FourCC::SGRBG12, MbusCode::SGRBG12_1X12),
        (FourCC::SRGGB12, MbusCode::SRGGB12_1X12),
    ];
    let yuv = [
        FourCC::YUYV,
        FourCC::YVYU,
        FourCC::UYVY,
        FourCC::VYUY,
        FourCC::NV12,
        FourCC::NV21,
        FourCC::YUV420,
        FourCC::YVU420,
        FourCC::NV16,
        FourCC::NV61,
        FourCC::YUV422P,
        FourCC::HM12,
    ];
    let direct = [
        (FourCC::RGB565, MbusCode::RGB565_2X8_LE),
        (FourCC::RGB24, MbusCode::RGB888_1X24),
        (FourCC::BGR24, MbusCode::BGR888_1X24),
    ];

    let mut formats = Vec::with_capacity(bayer.len() + yuv.len() * 4 + direct.len());
    formats.extend(bayer.iter().map(|&(f, m)| CsiFormat::new(f, m)));
    for fourcc in yuv {
        formats.extend(
            MbusCode::YUV422_2X8
                .iter()
                .map(|&mbus| CsiFormat::new(fourcc, mbus)),
        );
    }
    formats.extend(direct.iter().map(|&(f, m)| CsiFormat::new(f, m)));
    formats
}

/// Catalogue entries for `fourcc`, in preference order.
pub fn entries_for(fourcc: FourCC) -> impl Iterator<Item = &'static CsiFormat> {
    catalogue().iter().filter(move |fmt| fmt.fourcc == fourcc)
}

/// True when `fourcc` appears anywhere in the catalogue.
pub fn is_known(fourcc: FourCC) -> bool {
    entries_for(fourcc).next().is_some()
}

/// Distinct fourcc codes of the catalogue, in catalogue order.
pub fn fourccs() -> Vec<FourCC> {
    let mut out: Vec<FourCC> = Vec::new();
    for fmt in catalogue() {
        if !out.contains(&fmt.fourcc) {
            out.push(fmt.fourcc);
        }
    }
    out
}

/// Field order of the captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    /// Let the driver pick; resolved to [`Field::None`].
    #[default]
    Any,
    /// Progressive frames.
    None,
    Top,
    Bottom,
    Interlaced,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Field::Any => write!(f, "any"),
            Field::None => write!(f, "none"),
            Field::Top => write!(f, "top"),
            Field::Bottom => write!(f, "bottom"),
            Field::Interlaced => write!(f, "interlaced"),
        }
    }
}

/// Format request from a client. Geometry fields are adjusted, never
/// rejected; only the fourcc can make a request fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRequest {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    pub field: Field,
}

impl FormatRequest {
    pub fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        FormatRequest {
            width,
            height,
            fourcc,
            field: Field::Any,
        }
    }

    pub fn with_field(self, field: Field) -> Self {
        FormatRequest { field, ..self }
    }
}

/// Single-planar pixel format with the computed memory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    pub field: Field,
    /// Bytes per line of the first plane.
    pub bytesperline: u32,
    /// Minimum buffer length for one frame.
    pub sizeimage: u32,
}

impl PixFormat {
    /// Clamps the request geometry and computes stride and image size. A
    /// fourcc with unknown bpp yields zero stride and size.
    pub fn from_request(req: &FormatRequest) -> Self {
        let width = req.width.clamp(MIN_WIDTH, MAX_WIDTH);
        let height = req.height.clamp(MIN_HEIGHT, MAX_HEIGHT);
        let field = match req.field {
            Field::Any => Field::None,
            other => other,
        };
        let bytesperline = (width * u32::from(bpp(req.fourcc))) >> 3;
        PixFormat {
            width,
            height,
            fourcc: req.fourcc,
            field,
            bytesperline,
            sizeimage: bytesperline * height,
        }
    }

    pub fn with_fourcc(&self, fourcc: FourCC) -> Self {
        PixFormat::from_request(&FormatRequest {
            width: self.width,
            height: self.height,
            fourcc,
            field: self.field,
        })
    }
}

impl fmt::Display for PixFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} {} field={} stride={} size={}",
            self.width, self.height, self.fourcc, self.field, self.bytesperline, self.sizeimage
        )
    }
}
