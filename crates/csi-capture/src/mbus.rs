// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media bus codes (`MEDIA_BUS_FMT_*`) describing the wire-level pixel encoding
//! between a sensor and the capture controller.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MbusCode(pub u32);

impl MbusCode {
    pub const RGB565_2X8_LE: MbusCode = MbusCode(0x1008);
    pub const RGB888_1X24: MbusCode = MbusCode(0x100a);
    pub const BGR888_1X24: MbusCode = MbusCode(0x1013);

    pub const UYVY8_2X8: MbusCode = MbusCode(0x2006);
    pub const VYUY8_2X8: MbusCode = MbusCode(0x2007);
    pub const YUYV8_2X8: MbusCode = MbusCode(0x2008);
    pub const YVYU8_2X8: MbusCode = MbusCode(0x2009);
    pub const UYVY8_1X16: MbusCode = MbusCode(0x200f);
    pub const VYUY8_1X16: MbusCode = MbusCode(0x2010);
    pub const YUYV8_1X16: MbusCode = MbusCode(0x2011);
    pub const YVYU8_1X16: MbusCode = MbusCode(0x2012);

    pub const SBGGR8_1X8: MbusCode = MbusCode(0x3001);
    pub const SGRBG8_1X8: MbusCode = MbusCode(0x3002);
    pub const SBGGR10_1X10: MbusCode = MbusCode(0x3007);
    pub const SBGGR12_1X12: MbusCode = MbusCode(0x3008);
    pub const SGRBG10_1X10: MbusCode = MbusCode(0x300a);
    pub const SGBRG10_1X10: MbusCode = MbusCode(0x300e);
    pub const SRGGB10_1X10: MbusCode = MbusCode(0x300f);
    pub const SGBRG12_1X12: MbusCode = MbusCode(0x3010);
    pub const SGRBG12_1X12: MbusCode = MbusCode(0x3011);
    pub const SRGGB12_1X12: MbusCode = MbusCode(0x3012);
    pub const SGBRG8_1X8: MbusCode = MbusCode(0x3013);
    pub const SRGGB8_1X8: MbusCode = MbusCode(0x3014);

    pub const JPEG_1X8: MbusCode = MbusCode(0x4001);

    /// The four 8-bit YUV 4:2:2 orderings a CSI can reorder into any packed
    /// or planar YUV memory layout.
    pub const YUV422_2X8: [MbusCode; 4] = [
        MbusCode::YUYV8_2X8,
        MbusCode::UYVY8_2X8,
        MbusCode::YVYU8_2X8,
        MbusCode::VYUY8_2X8,
    ];

    /// Number of data lines the code needs on a parallel bus, or `None` for
    /// codes this crate does not know.
    pub fn bus_width(self) -> Option<u8> {
        let width = match self {
            MbusCode::RGB565_2X8_LE
            | MbusCode::UYVY8_2X8
            | MbusCode::VYUY8_2X8
            | MbusCode::YUYV8_2X8
            | MbusCode::YVYU8_2X8
            | MbusCode::SBGGR8_1X8
            | MbusCode::SGBRG8_1X8
            | MbusCode::SGRBG8_1X8
            | MbusCode::SRGGB8_1X8
            | MbusCode::JPEG_1X8 => 8,
            MbusCode::SBGGR10_1X10
            | MbusCode::SGBRG10_1X10
            | MbusCode::SGRBG10_1X10
            | MbusCode::SRGGB10_1X10 => 10,
            MbusCode::SBGGR12_1X12
            | MbusCode::SGBRG12_1X12
            | MbusCode::SGRBG12_1X12
            | MbusCode::SRGGB12_1X12 => 12,
            MbusCode::UYVY8_1X16
            | MbusCode::VYUY8_1X16
            | MbusCode::YUYV8_1X16
            | MbusCode::YVYU8_1X16 => 16,
            MbusCode::RGB888_1X24 | MbusCode::BGR888_1X24 => 24,
            _ => return None,
        };
        Some(width)
    }

    /// True for the 8-bit YUV 4:2:2 codes that can travel over BT.656.
    pub fn is_yuv422_2x8(self) -> bool {
        MbusCode::YUV422_2X8.contains(&self)
    }

    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            MbusCode::RGB565_2X8_LE => "RGB565_2X8_LE",
            MbusCode::RGB888_1X24 => "RGB888_1X24",
            MbusCode::BGR888_1X24 => "BGR888_1X24",
            MbusCode::UYVY8_2X8 => "UYVY8_2X8",
            MbusCode::VYUY8_2X8 => "VYUY8_2X8",
            MbusCode::YUYV8_2X8 => "YUYV8_2X8",
            MbusCode::YVYU8_2X8 => "YVYU8_2X8",
            MbusCode::UYVY8_1X16 => "UYVY8_1X16",
            MbusCode::VYUY8_1X16 => "VYUY8_1X16",
            MbusCode::YUYV8_1X16 => "YUYV8_1X16",
            MbusCode::YVYU8_1X16 => "YVYU8_1X16",
            MbusCode::SBGGR8_1X8 => "SBGGR8_1X8",
            MbusCode::SGBRG8_1X8 => "SGBRG8_1X8",
            MbusCode::SGRBG8_1X8 => "SGRBG8_1X8",
            MbusCode::SRGGB8_1X8 => "SRGGB8_1X8",
            MbusCode::SBGGR10_1X10 => "SBGGR10_1X10",
            MbusCode::SGBRG10_1X10 => "SGBRG10_1X10",
            MbusCode::SGRBG10_1X10 => "SGRBG10_1X10",
            MbusCode::SRGGB10_1X10 => "SRGGB10_1X10",
            MbusCode::SBGGR12_1X12 => "SBGGR12_1X12",
            MbusCode::SGBRG12_1X12 => "SGBRG12_1X12",
            MbusCode::SGRBG12_1X12 => "SGRBG12_1X12",
            MbusCode::SRGGB12_1X12 => "SRGGB12_1X12",
            MbusCode::JPEG_1X8 => "JPEG_1X8",
            _ => return None,
        };
        Some(name)
    }

    /// Looks a code up by its `MEDIA_BUS_FMT_` suffix, e.g. `"UYVY8_2X8"`.
    pub fn from_name(name: &str) -> Option<MbusCode> {
        const KNOWN: [MbusCode; 24] = [
            MbusCode::RGB565_2X8_LE,
            MbusCode::RGB888_1X24,
            MbusCode::BGR888_1X24,
            MbusCode::UYVY8_2X8,
            MbusCode::VYUY8_2X8,
            MbusCode::YUYV8_2X8,
            MbusCode::YVYU8_2X8,
            MbusCode::UYVY8_1X16,
            MbusCode::VYUY8_1X16,
            MbusCode::YUYV8_1X16,
            MbusCode::YVYU8_1X16,
            MbusCode::SBGGR8_1X8,
            MbusCode::SGBRG8_1X8,
            MbusCode::SGRBG8_1X8,
            MbusCode::SRGGB8_1X8,
            MbusCode::SBGGR10_1X10,
            MbusCode::SGBRG10_1X10,
            MbusCode::SGRBG10_1X10,
            MbusCode::SRGGB10_1X10,
            MbusCode::SBGGR12_1X12,
            MbusCode::SGBRG12_1X12,
            MbusCode::SGRBG12_1X12,
            MbusCode::SRGGB12_1X12,
            MbusCode::JPEG_1X8,
        ];
        let name = name.trim_start_matches("MEDIA_BUS_FMT_");
        KNOWN
            .into_iter()
            .find(|code| code.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }
}

impl fmt::Display for MbusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

impl fmt::Debug for MbusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MbusCode({})", self)
    }
}
