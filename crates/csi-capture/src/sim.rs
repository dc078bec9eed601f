// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Simulated Hardware
//!
//! A software model of the CSI controller and of image sensors, for tests and
//! for driving the coordinator without a board. [`SimCsi`] records every
//! backend call, can be told to fail or to lack any operation, and keeps the
//! last DMA address it was programmed with.
//!
//! `SimCsi` is a cheap handle: clones share the same simulated controller, so
//! a test can box one clone into the coordinator and inspect another.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::{CaptureConfig, CsiOps};
use crate::format;
use crate::fourcc::FourCC;
use crate::mbus::MbusCode;
use crate::queue::DmaAddr;
use crate::sensor::{MbusType, SensorSlot, SensorSubdev};
use crate::{Error, Result};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetSupportedPixformats,
    IsFormatSupported(FourCC, MbusCode),
    SetPower(bool),
    ApplyConfig(usize, CaptureConfig),
    UpdateBufferAddress(DmaAddr),
    SetStream(bool),
}

impl Call {
    pub fn op(&self) -> &'static str {
        match self {
            Call::GetSupportedPixformats => "get_supported_pixformats",
            Call::IsFormatSupported(..) => "is_format_supported",
            Call::SetPower(_) => "set_power",
            Call::ApplyConfig(..) => "apply_config",
            Call::UpdateBufferAddress(_) => "update_buffer_address",
            Call::SetStream(_) => "set_stream",
        }
    }
}

#[derive(Default)]
struct Faults {
    failing: HashSet<&'static str>,
    missing: HashSet<&'static str>,
}

struct Controller {
    pixformats: spin::Mutex<Vec<FourCC>>,
    faults: spin::Mutex<Faults>,
    calls: spin::Mutex<Vec<Call>>,
    address: AtomicU64,
    powered: AtomicBool,
    streaming: AtomicBool,
    config: spin::Mutex<Option<CaptureConfig>>,
}

/// Simulated CSI controller.
#[derive(Clone)]
pub struct SimCsi {
    inner: Arc<Controller>,
}

impl Default for SimCsi {
    fn default() -> Self {
        SimCsi::new()
    }
}

impl SimCsi {
    /// A controller implementing every operation and writing every catalogue
    /// format.
    pub fn new() -> Self {
        SimCsi {
            inner: Arc::new(Controller {
                pixformats: spin::Mutex::new(format::fourccs()),
                faults: spin::Mutex::new(Faults::default()),
                calls: spin::Mutex::new(Vec::new()),
                address: AtomicU64::new(0),
                powered: AtomicBool::new(false),
                streaming: AtomicBool::new(false),
                config: spin::Mutex::new(None),
            }),
        }
    }

    /// Restricts the memory formats the DMA engine can write.
    pub fn with_pixformats(self, pixformats: &[FourCC]) -> Self {
        *self.inner.pixformats.lock() = pixformats.to_vec();
        self
    }

    /// Makes `op` return [`Error::Backend`].
    pub fn failing(self, op: &'static str) -> Self {
        self.fail(op);
        self
    }

    /// Removes `op` from the capability set.
    pub fn without(self, op: &'static str) -> Self {
        self.inner.faults.lock().missing.insert(op);
        self
    }

    pub fn fail(&self, op: &'static str) {
        self.inner.faults.lock().failing.insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.inner.faults.lock().failing.remove(op);
    }

    /// Recorded calls, oldest first. Calls to missing operations are not
    /// recorded.
    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().clone()
    }

    /// Names of the recorded calls.
    pub fn ops(&self) -> Vec<&'static str> {
        self.inner.calls.lock().iter().map(Call::op).collect()
    }

    pub fn clear_calls(&self) {
        self.inner.calls.lock().clear();
    }

    /// Last programmed DMA address.
    pub fn address(&self) -> DmaAddr {
        self.inner.address.load(Ordering::Acquire)
    }

    pub fn is_powered(&self) -> bool {
        self.inner.powered.load(Ordering::Acquire)
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.load(Ordering::Acquire)
    }

    pub fn config(&self) -> Option<CaptureConfig> {
        *self.inner.config.lock()
    }

    fn enter(&self, call: Call) -> Result<()> {
        let op = call.op();
        {
            let faults = self.inner.faults.lock();
            if faults.missing.contains(op) {
                return Err(Error::OperationNotSupported(op));
            }
            self.inner.calls.lock().push(call);
            if faults.failing.contains(op) {
                return Err(Error::Backend(format!("simulated {} failure", op)));
            }
        }
        Ok(())
    }
}

impl CsiOps for SimCsi {
    fn name(&self) -> &str {
        "sim-csi"
    }

    fn get_supported_pixformats(&self) -> Result<Vec<FourCC>> {
        self.enter(Call::GetSupportedPixformats)?;
        Ok(self.inner.pixformats.lock().clone())
    }

    /// Accepts a pairing when the DMA engine writes `pixformat` and the bus
    /// can carry `mbus_code`: a parallel bus needs enough data lines, BT.656
    /// only carries 8-bit YUV 4:2:2.
    fn is_format_supported(
        &self,
        pixformat: FourCC,
        mbus_code: MbusCode,
        sensor: &SensorSlot,
    ) -> Result<bool> {
        self.enter(Call::IsFormatSupported(pixformat, mbus_code))?;
        if !self.inner.pixformats.lock().contains(&pixformat) {
            return Ok(false);
        }
        let Some(width) = mbus_code.bus_width() else {
            return Ok(false);
        };
        let bus = &sensor.binding;
        Ok(match bus.bus_type {
            MbusType::Parallel => width <= bus.parallel.bus_width,
            MbusType::Bt656 => mbus_code.is_yuv422_2x8(),
            MbusType::Csi2Dphy => true,
        })
    }

    fn set_power(&self, enable: bool) -> Result<()> {
        self.enter(Call::SetPower(enable))?;
        self.inner.powered.store(enable, Ordering::Release);
        Ok(())
    }

    fn apply_config(&self, sensor: &SensorSlot, config: &CaptureConfig) -> Result<()> {
        self.enter(Call::ApplyConfig(sensor.index, *config))?;
        *self.inner.config.lock() = Some(*config);
        Ok(())
    }

    fn update_buffer_address(&self, addr: DmaAddr) -> Result<()> {
        self.enter(Call::UpdateBufferAddress(addr))?;
        self.inner.address.store(addr, Ordering::Release);
        Ok(())
    }

    fn set_stream(&self, enable: bool) -> Result<()> {
        self.enter(Call::SetStream(enable))?;
        self.inner.streaming.store(enable, Ordering::Release);
        Ok(())
    }
}

/// Simulated image sensor.
pub struct SimSensor {
    name: String,
    codes: Vec<MbusCode>,
    has_stream: bool,
    fail_stream: AtomicBool,
    streaming: AtomicBool,
    stream_calls: AtomicUsize,
}

impl SimSensor {
    pub fn new(name: &str, codes: &[MbusCode]) -> Self {
        SimSensor {
            name: name.to_owned(),
            codes: codes.to_vec(),
            has_stream: true,
            fail_stream: AtomicBool::new(false),
            streaming: AtomicBool::new(false),
            stream_calls: AtomicUsize::new(0),
        }
    }

    /// A sensor that streams whenever powered and has no stream control.
    pub fn without_stream(self) -> Self {
        SimSensor {
            has_stream: false,
            ..self
        }
    }

    pub fn set_stream_failure(&self, fail: bool) {
        self.fail_stream.store(fail, Ordering::Release);
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::Acquire)
    }
}

impl SensorSubdev for SimSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn enum_mbus_codes(&self) -> Vec<MbusCode> {
        self.codes.clone()
    }

    fn set_stream(&self, enable: bool) -> Result<()> {
        if !self.has_stream {
            return Err(Error::OperationNotSupported("sensor set_stream"));
        }
        self.stream_calls.fetch_add(1, Ordering::AcqRel);
        if self.fail_stream.load(Ordering::Acquire) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{}: i2c timeout", self.name),
            )));
        }
        self.streaming.store(enable, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{ParallelBus, SensorBinding};

    fn slot(bus_type: MbusType, bus_width: u8) -> SensorSlot {
        let sensor = Arc::new(SimSensor::new("sim", &[]));
        SensorSlot {
            index: 0,
            binding: SensorBinding::new(sensor, 0).with_bus(
                bus_type,
                ParallelBus {
                    bus_width,
                    ..ParallelBus::default()
                },
            ),
        }
    }

    #[test]
    fn test_bus_width_rules() {
        let csi = SimCsi::new();
        let narrow = slot(MbusType::Parallel, 8);
        assert!(csi
            .is_format_supported(FourCC::YUYV, MbusCode::UYVY8_2X8, &narrow)
            .unwrap());
        assert!(!csi
            .is_format_supported(FourCC::SBGGR10, MbusCode::SBGGR10_1X10, &narrow)
            .unwrap());
        let wide = slot(MbusType::Parallel, 12);
        assert!(csi
            .is_format_supported(FourCC::SBGGR10, MbusCode::SBGGR10_1X10, &wide)
            .unwrap());
        let bt656 = slot(MbusType::Bt656, 8);
        assert!(!csi
            .is_format_supported(FourCC::SBGGR8, MbusCode::SBGGR8_1X8, &bt656)
            .unwrap());
    }

    #[test]
    fn test_faults_and_calls() {
        let csi = SimCsi::new().without("set_power").failing("set_stream");
        let handle = csi.clone();
        assert!(csi.set_power(true).unwrap_err().is_not_supported());
        assert!(matches!(csi.set_stream(true), Err(Error::Backend(_))));
        csi.update_buffer_address(0x8000).unwrap();
        assert_eq!(handle.ops(), vec!["set_stream", "update_buffer_address"]);
        assert_eq!(handle.address(), 0x8000);
        assert!(!handle.is_streaming());

        handle.recover("set_stream");
        csi.set_stream(true).unwrap();
        assert!(handle.is_streaming());
    }

    #[test]
    fn test_restricted_pixformats() {
        let csi = SimCsi::new().with_pixformats(&[FourCC::NV12]);
        assert_eq!(csi.get_supported_pixformats().unwrap(), vec![FourCC::NV12]);
        let s = slot(MbusType::Parallel, 8);
        assert!(!csi
            .is_format_supported(FourCC::YUYV, MbusCode::YUYV8_2X8, &s)
            .unwrap());
    }

    #[test]
    fn test_sensor_stream_control() {
        let sensor = SimSensor::new("ov7670", &[MbusCode::YUYV8_2X8]);
        sensor.set_stream(true).unwrap();
        assert!(sensor.is_streaming());
        sensor.set_stream_failure(true);
        assert!(matches!(sensor.set_stream(false), Err(Error::Io(_))));
        assert_eq!(sensor.stream_calls(), 2);

        let fixed = SimSensor::new("tvp5150", &[]).without_stream();
        assert!(fixed.set_stream(true).unwrap_err().is_not_supported());
    }
}
