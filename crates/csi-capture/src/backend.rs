// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Hardware Operations Backend
//!
//! The capability set one SoC variant provides to the coordinator. Every
//! operation has a default body returning [`Error::OperationNotSupported`], so
//! a backend only implements what its register block can do. The coordinator
//! treats a missing operation exactly like an absent capability, never as a
//! failure.
//!
//! # Calling contexts
//!
//! | Operation | Context | May block |
//! |-----------|---------|-----------|
//! | [`CsiOps::get_supported_pixformats`] | coordination lock | yes |
//! | [`CsiOps::is_format_supported`] | coordination lock | no |
//! | [`CsiOps::set_power`] | coordination lock | yes |
//! | [`CsiOps::apply_config`] | coordination lock | yes |
//! | [`CsiOps::set_stream`] | coordination lock | yes |
//! | [`CsiOps::update_buffer_address`] | frame completion (interrupt) | **no** |

use crate::format::Field;
use crate::fourcc::FourCC;
use crate::mbus::MbusCode;
use crate::queue::DmaAddr;
use crate::sensor::SensorSlot;
use crate::{Error, Result};

/// Bus and memory format handed to [`CsiOps::apply_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub pixelformat: FourCC,
    pub code: MbusCode,
    pub field: Field,
    pub width: u32,
    pub height: u32,
}

pub trait CsiOps: Send + Sync {
    /// Short identifier used in log lines.
    fn name(&self) -> &str {
        "csi"
    }

    /// Memory formats the DMA engine can write.
    fn get_supported_pixformats(&self) -> Result<Vec<FourCC>> {
        Err(Error::OperationNotSupported("get_supported_pixformats"))
    }

    /// Whether the controller can produce `pixformat` from `mbus_code` arriving
    /// over the bus described by `sensor`.
    fn is_format_supported(
        &self,
        _pixformat: FourCC,
        _mbus_code: MbusCode,
        _sensor: &SensorSlot,
    ) -> Result<bool> {
        Err(Error::OperationNotSupported("is_format_supported"))
    }

    fn set_power(&self, _enable: bool) -> Result<()> {
        Err(Error::OperationNotSupported("set_power"))
    }

    /// Programs bus timing and format registers for `sensor`.
    fn apply_config(&self, _sensor: &SensorSlot, _config: &CaptureConfig) -> Result<()> {
        Err(Error::OperationNotSupported("apply_config"))
    }

    /// Points the DMA engine at the next frame buffer. Must return in bounded
    /// time without sleeping.
    fn update_buffer_address(&self, _addr: DmaAddr) -> Result<()> {
        Err(Error::OperationNotSupported("update_buffer_address"))
    }

    fn set_stream(&self, _enable: bool) -> Result<()> {
        Err(Error::OperationNotSupported("set_stream"))
    }
}

/// Folds [`Error::OperationNotSupported`] into `Ok(None)`.
pub(crate) fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::OperationNotSupported(op)) => {
            log::debug!("{} not implemented, skipping", op);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl CsiOps for Bare {}

    struct PowerOnly;

    impl CsiOps for PowerOnly {
        fn set_power(&self, enable: bool) -> Result<()> {
            if enable {
                Ok(())
            } else {
                Err(Error::Backend("regulator stuck".to_owned()))
            }
        }
    }

    #[test]
    fn test_defaults_report_not_supported() {
        let ops = Bare;
        assert_eq!(ops.name(), "csi");
        assert!(ops
            .get_supported_pixformats()
            .unwrap_err()
            .is_not_supported());
        assert!(ops.set_power(true).unwrap_err().is_not_supported());
        assert!(ops.update_buffer_address(0x1000).unwrap_err().is_not_supported());
        assert!(ops.set_stream(false).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_optional_folds_absence() {
        assert_eq!(optional(Bare.set_power(true)).unwrap(), None);
        assert_eq!(optional(PowerOnly.set_power(true)).unwrap(), Some(()));
        assert!(matches!(
            optional(PowerOnly.set_power(false)),
            Err(Error::Backend(_))
        ));
    }
}
