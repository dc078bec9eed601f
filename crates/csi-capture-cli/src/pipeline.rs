// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Simulated pipeline shared by the subcommands.

use crate::error::CliError;
use crate::utils;
use clap::{Args as ClapArgs, ValueEnum};
use csi_capture::sim::{SimCsi, SimSensor};
use csi_capture::{
    BufferDone, CaptureCoordinator, MbusType, ParallelBus, SensorBinding, MAX_SENSORS,
};
use std::sync::Arc;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bus {
    Parallel,
    Bt656,
    Csi2,
}

impl From<Bus> for MbusType {
    fn from(bus: Bus) -> Self {
        match bus {
            Bus::Parallel => MbusType::Parallel,
            Bus::Bt656 => MbusType::Bt656,
            Bus::Csi2 => MbusType::Csi2Dphy,
        }
    }
}

/// Simulated sensor and controller options
#[derive(ClapArgs, Debug, Clone)]
pub struct PipelineArgs {
    /// Sensor name
    #[arg(long, default_value = "ov5640")]
    pub sensor: String,

    /// Media bus codes the sensor offers (comma-separated)
    #[arg(long, default_value = "YUYV8_2X8,UYVY8_2X8")]
    pub mbus: String,

    /// Bus between sensor and controller
    #[arg(long, value_enum, default_value = "parallel")]
    pub bus: Bus,

    /// Parallel bus width in bits
    #[arg(long, default_value = "8")]
    pub bus_width: u8,

    /// Sensor slot to bind into
    #[arg(long, default_value = "0")]
    pub slot: usize,

    /// Restrict the controller's memory formats (comma-separated FOURCCs)
    #[arg(long)]
    pub pixformats: Option<String>,

    /// Run without any bound sensor
    #[arg(long)]
    pub no_sensor: bool,
}

impl PipelineArgs {
    /// The simulated controller described by the options.
    pub fn controller(&self) -> Result<SimCsi, CliError> {
        let sim = SimCsi::new();
        Ok(match &self.pixformats {
            Some(list) => sim.with_pixformats(&utils::parse_fourcc_list(list)?),
            None => sim,
        })
    }

    /// Builds a coordinator on a fresh controller, binds the sensor and
    /// completes discovery.
    pub fn build(&self, done: impl BufferDone + 'static) -> Result<CaptureCoordinator, CliError> {
        if self.slot >= MAX_SENSORS {
            return Err(CliError::InvalidArgs(format!(
                "Sensor slot must be below {}: {}",
                MAX_SENSORS, self.slot
            )));
        }
        if !matches!(self.bus_width, 8 | 10 | 12 | 16) {
            return Err(CliError::InvalidArgs(format!(
                "Bus width must be 8, 10, 12 or 16: {}",
                self.bus_width
            )));
        }

        let csi = CaptureCoordinator::new(Box::new(self.controller()?), done);

        if !self.no_sensor {
            let codes = utils::parse_mbus_list(&self.mbus)?;
            log::debug!("Sensor {} offers {:?}", self.sensor, codes);
            let sensor = Arc::new(SimSensor::new(&self.sensor, &codes));
            let bus = ParallelBus {
                bus_width: self.bus_width,
                ..ParallelBus::default()
            };
            let binding =
                SensorBinding::new(sensor, self.slot as u32).with_bus(self.bus.into(), bus);
            csi.bind(self.slot, binding)?;
        }

        csi.complete_discovery()?;
        log::debug!("Pipeline ready: {:?}", csi);
        Ok(csi)
    }
}
