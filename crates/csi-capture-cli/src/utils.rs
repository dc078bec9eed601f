// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use csi_capture::{FourCC, MbusCode};
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Parse resolution string in format "WxH" or "W*H"
///
/// # Examples
/// ```ignore
/// assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
/// assert_eq!(parse_resolution("1280*720").unwrap(), (1280, 720));
/// ```
pub fn parse_resolution(s: &str) -> Result<(u32, u32), CliError> {
    let (width_str, height_str) = s
        .split_once('x')
        .or_else(|| s.split_once('*'))
        .ok_or_else(|| {
            CliError::InvalidArgs(format!(
                "Invalid resolution format (expected WxH or W*H): {}",
                s
            ))
        })?;

    let width = width_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid width in resolution: {}", s)))?;
    let height = height_str
        .parse::<u32>()
        .map_err(|_| CliError::InvalidArgs(format!("Invalid height in resolution: {}", s)))?;

    if width == 0 || height == 0 {
        return Err(CliError::InvalidArgs(format!(
            "Resolution dimensions must be positive: {}",
            s
        )));
    }

    Ok((width, height))
}

/// Parse a FOURCC string such as "YUYV" or "BA81"
pub fn parse_fourcc(s: &str) -> Result<FourCC, CliError> {
    s.parse::<FourCC>().map_err(|_| {
        CliError::InvalidArgs(format!("FOURCC must be exactly 4 ASCII characters: {}", s))
    })
}

/// Parse a comma-separated list of FOURCC strings
pub fn parse_fourcc_list(s: &str) -> Result<Vec<FourCC>, CliError> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(parse_fourcc)
        .collect()
}

/// Parse a comma-separated list of media bus codes
///
/// Accepts names with or without the `MEDIA_BUS_FMT_` prefix, or raw hex
/// values such as `0x2008`.
pub fn parse_mbus_list(s: &str) -> Result<Vec<MbusCode>, CliError> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            if let Some(hex) = item
                .strip_prefix("0x")
                .or_else(|| item.strip_prefix("0X"))
            {
                return u32::from_str_radix(hex, 16)
                    .map(MbusCode)
                    .map_err(|_| CliError::InvalidArgs(format!("Invalid media bus code: {}", item)));
            }
            MbusCode::from_name(item)
                .ok_or_else(|| CliError::InvalidArgs(format!("Unknown media bus code: {}", item)))
        })
        .collect()
}

/// Install signal handler for graceful shutdown on Ctrl+C
///
/// Returns an Arc<AtomicBool> that will be set to true when SIGINT is received.
/// Check this flag periodically in your main loop to exit gracefully.
pub fn install_signal_handler() -> Result<Arc<AtomicBool>, CliError> {
    let term = Arc::new(AtomicBool::new(false));

    flag::register(SIGINT, Arc::clone(&term))
        .map_err(|e| CliError::General(format!("Failed to register signal handler: {}", e)))?;

    log::debug!("Installed SIGINT handler");
    Ok(term)
}
