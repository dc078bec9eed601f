// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::pipeline::PipelineArgs;
use crate::utils;
use clap::Args as ClapArgs;
use csi_capture::{CompletedBuffer, FormatRequest};
use serde::Serialize;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Pixel format FOURCC to negotiate
    fourcc: String,

    /// Resolution in WxH format
    #[arg(short, long, default_value = "1280x720")]
    resolution: String,

    /// Only try the format, do not apply it
    #[arg(long)]
    try_only: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Debug, Serialize)]
struct Negotiated {
    sensor: String,
    fourcc: String,
    mbus_code: String,
    bpp: u8,
    width: u32,
    height: u32,
    field: String,
    bytesperline: u32,
    sizeimage: u32,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Executing negotiate command: {:?}", args);

    let fourcc = utils::parse_fourcc(&args.fourcc)?;
    let (width, height) = utils::parse_resolution(&args.resolution)?;
    let request = FormatRequest::new(width, height, fourcc);

    let csi = args.pipeline.build(|_: CompletedBuffer| {})?;
    let pix = if args.try_only {
        csi.try_format(&request)?
    } else {
        csi.set_format(&request)?
    };

    // try_format leaves the selection alone, so look the pairing up again.
    let fmt = match csi.current_format() {
        Some(fmt) if fmt.fourcc == pix.fourcc => fmt,
        _ => csi.negotiate(fourcc)?,
    };
    let sensor = csi
        .active_sensor()
        .map(|s| s.subdev().name().to_string())
        .unwrap_or_default();

    let out = Negotiated {
        sensor,
        fourcc: pix.fourcc.to_string(),
        mbus_code: fmt.mbus_code.to_string(),
        bpp: fmt.bpp,
        width: pix.width,
        height: pix.height,
        field: pix.field.to_string(),
        bytesperline: pix.bytesperline,
        sizeimage: pix.sizeimage,
    };

    if json {
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| CliError::General(format!("Failed to serialize format: {}", e)))?;
        println!("{}", text);
    } else {
        println!("Sensor:        {}", out.sensor);
        println!("Format:        {} <- {}", out.fourcc, out.mbus_code);
        println!("Bits/pixel:    {}", out.bpp);
        println!("Resolution:    {}x{}", out.width, out.height);
        println!("Field:         {}", out.field);
        println!("Bytes/line:    {}", out.bytesperline);
        println!("Image size:    {}", out.sizeimage);
    }

    Ok(())
}
