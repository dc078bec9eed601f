// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Adapted from https://docs.rs/crate/four-cc/latest to handle endianess and the
// V4L2 pixel format codes understood by the capture controller.
#![forbid(unsafe_code)]

use core::{fmt, result::Result};

/// Memory pixel layout identifier (`V4L2_PIX_FMT_*`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> FourCC {
        FourCC(*code)
    }

    pub const fn to_u32(self) -> u32 {
        #[cfg(target_endian = "little")]
        {
            ((self.0[3] as u32) << 24 & 0xff000000)
                | ((self.0[2] as u32) << 16 & 0x00ff0000)
                | ((self.0[1] as u32) << 8 & 0x0000ff00)
                | ((self.0[0] as u32) & 0x000000ff)
        }
        #[cfg(target_endian = "big")]
        {
            ((self.0[0] as u32) << 24 & 0xff000000)
                | ((self.0[1] as u32) << 16 & 0x00ff0000)
                | ((self.0[2] as u32) << 8 & 0x0000ff00)
                | ((self.0[3] as u32) & 0x000000ff)
        }
    }

    // Bayer
    pub const SBGGR8: FourCC = FourCC::new(b"BA81");
    pub const SGBRG8: FourCC = FourCC::new(b"GBRG");
    pub const SGRBG8: FourCC = FourCC::new(b"GRBG");
    pub const SRGGB8: FourCC = FourCC::new(b"RGGB");
    pub const SBGGR10: FourCC = FourCC::new(b"BG10");
    pub const SGBRG10: FourCC = FourCC::new(b"GB10");
    pub const SGRBG10: FourCC = FourCC::new(b"BA10");
    pub const SRGGB10: FourCC = FourCC::new(b"RG10");
    pub const SBGGR12: FourCC = FourCC::new(b"BG12");
    pub const SGBRG12: FourCC = FourCC::new(b"GB12");
    pub const SGRBG12: FourCC = FourCC::new(b"BA12");
    pub const SRGGB12: FourCC = FourCC::new(b"RG12");

    // YUV 4:2:0
    pub const HM12: FourCC = FourCC::new(b"HM12");
    pub const NV12: FourCC = FourCC::new(b"NV12");
    pub const NV21: FourCC = FourCC::new(b"NV21");
    pub const YUV420: FourCC = FourCC::new(b"YU12");
    pub const YVU420: FourCC = FourCC::new(b"YV12");

    // YUV 4:2:2
    pub const YUYV: FourCC = FourCC::new(b"YUYV");
    pub const YVYU: FourCC = FourCC::new(b"YVYU");
    pub const UYVY: FourCC = FourCC::new(b"UYVY");
    pub const VYUY: FourCC = FourCC::new(b"VYUY");
    pub const NV16: FourCC = FourCC::new(b"NV16");
    pub const NV61: FourCC = FourCC::new(b"NV61");
    pub const YUV422P: FourCC = FourCC::new(b"422P");

    // RGB
    pub const RGB565: FourCC = FourCC::new(b"RGBP");
    pub const RGB555: FourCC = FourCC::new(b"RGBO");
    pub const RGB24: FourCC = FourCC::new(b"RGB3");
    pub const BGR24: FourCC = FourCC::new(b"BGR3");
    pub const RGB32: FourCC = FourCC::new(b"RGB4");
    pub const BGR32: FourCC = FourCC::new(b"BGR4");

    // Compressed
    pub const JPEG: FourCC = FourCC::new(b"JPEG");
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC([buf[0], buf[1], buf[2], buf[3]])
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        #[cfg(target_endian = "little")]
        {
            FourCC([
                (val & 0xff) as u8,
                (val >> 8 & 0xff) as u8,
                (val >> 16 & 0xff) as u8,
                (val >> 24 & 0xff) as u8,
            ])
        }
        #[cfg(target_endian = "big")]
        {
            FourCC([
                (val >> 24 & 0xff) as u8,
                (val >> 16 & 0xff) as u8,
                (val >> 8 & 0xff) as u8,
                (val & 0xff) as u8,
            ])
        }
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.to_u32()
    }
}

impl core::str::FromStr for FourCC {
    type Err = crate::Error;

    /// Parses exactly four ASCII characters, e.g. `"YUYV"` or `"BA81"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        match <[u8; 4]>::try_from(bytes) {
            Ok(code) if code.is_ascii() => Ok(FourCC(code)),
            _ => Err(crate::Error::InvalidFourCC(s.to_owned())),
        }
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match core::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                // If we return fmt::Error, then for example format!() will panic, so we choose
                // an alternative representation instead
                let b = &self.0;
                f.write_fmt(format_args!(
                    "{}{}{}{}",
                    core::ascii::escape_default(b[0]),
                    core::ascii::escape_default(b[1]),
                    core::ascii::escape_default(b[2]),
                    core::ascii::escape_default(b[3])
                ))
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let b = self.0;
        f.debug_tuple("FourCC")
            .field(&format_args!(
                "{}{}{}{}",
                core::ascii::escape_default(b[0]),
                core::ascii::escape_default(b[1]),
                core::ascii::escape_default(b[2]),
                core::ascii::escape_default(b[3])
            ))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u32_roundtrip_matches_v4l2() {
        // V4L2_PIX_FMT_YUYV = v4l2_fourcc('Y', 'U', 'Y', 'V')
        assert_eq!(u32::from(FourCC::YUYV), 0x5659_5559);
        assert_eq!(FourCC::from(0x3231_564e), FourCC::NV12);
    }

    #[test]
    fn test_parse() {
        assert_eq!("BA81".parse::<FourCC>().unwrap(), FourCC::SBGGR8);
        assert!("YUY".parse::<FourCC>().is_err());
        assert!("YUYV2".parse::<FourCC>().is_err());
    }

    #[test]
    fn test_display_escapes_non_utf8() {
        assert_eq!(FourCC::RGB24.to_string(), "RGB3");
        let odd = FourCC([0xff, b'A', b'B', b'C']);
        assert_eq!(odd.to_string(), "\\xffABC");
    }
}
