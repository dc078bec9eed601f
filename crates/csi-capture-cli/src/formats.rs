// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Format catalogue listing.

use crate::error::CliError;
use crate::pipeline::PipelineArgs;
use clap::Args as ClapArgs;
use csi_capture::{format, CompletedBuffer};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Show only entries both the controller and the sensor can handle
    #[arg(long)]
    available: bool,
}

#[derive(Debug, Serialize)]
struct FormatEntry {
    fourcc: String,
    mbus_code: String,
    bpp: u8,
    controller: bool,
    sensor: bool,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing formats command: {:?}", args);

    let csi = args.pipeline.build(|_: CompletedBuffer| {})?;
    let supported = csi.enum_formats()?;
    let sensor = csi.active_sensor();

    let entries: Vec<FormatEntry> = format::catalogue()
        .iter()
        .map(|fmt| FormatEntry {
            fourcc: fmt.fourcc.to_string(),
            mbus_code: fmt.mbus_code.to_string(),
            bpp: fmt.bpp,
            controller: supported.contains(&fmt.fourcc),
            sensor: sensor
                .as_ref()
                .is_some_and(|s| s.supports_mbus(fmt.mbus_code)),
        })
        .filter(|entry| !args.available || (entry.controller && entry.sensor))
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&entries)
            .map_err(|e| CliError::General(format!("Failed to serialize formats: {}", e)))?;
        println!("{}", out);
        return Ok(());
    }

    println!("{:<6} {:<16} {:>4}  {:<10} {:<6}", "FOURCC", "MBUS", "BPP", "CONTROLLER", "SENSOR");
    for entry in &entries {
        println!(
            "{:<6} {:<16} {:>4}  {:<10} {:<6}",
            entry.fourcc,
            entry.mbus_code,
            entry.bpp,
            if entry.controller { "yes" } else { "no" },
            if entry.sensor { "yes" } else { "no" }
        );
    }
    log::info!("{} format(s)", entries.len());

    Ok(())
}
