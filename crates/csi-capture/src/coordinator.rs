// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Capture Coordinator
//!
//! Owns the sensor registry, the buffer queue and the active backend, and
//! drives the streaming state machine:
//!
//! ```text
//! Uninitialized --complete_discovery--> Initialized <--stop-- Streaming
//!                                           |  ^                 ^
//!                                           |  +-----------------+ start
//!                                           +--cleanup--> CleanedUp
//! ```
//!
//! Two locks with different contexts protect the state:
//!
//! - the coordination lock (`std::sync::Mutex`) guards format, registry and
//!   state. It is held across backend calls that may sleep and is never taken
//!   by [`CaptureCoordinator::on_frame_complete`];
//! - the queue lock (inside [`BufferQueue`]) never sleeps and is never held
//!   across a backend call.
//!
//! Lock order is always coordination, then queue.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{optional, CaptureConfig, CsiOps};
use crate::format::{self, CsiFormat, FormatRequest, PixFormat, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::fourcc::FourCC;
use crate::queue::{
    self, BufferDone, BufferQueue, BufferState, CaptureStats, CompletedBuffer, Completion,
    DmaAddr, FrameBuffer, FrameEvent,
};
use crate::sensor::{SensorBinding, SensorRegistry, SensorSlot};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for sensor discovery to complete.
    Uninitialized,
    Initialized,
    Streaming,
    /// Terminal.
    CleanedUp,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Uninitialized => write!(f, "uninitialized"),
            State::Initialized => write!(f, "initialized"),
            State::Streaming => write!(f, "streaming"),
            State::CleanedUp => write!(f, "cleaned-up"),
        }
    }
}

struct Control {
    state: State,
    registry: SensorRegistry,
    fmt: PixFormat,
    current: Option<CsiFormat>,
}

impl Control {
    /// Format and binding changes need a device that is registered and idle.
    fn ensure_idle(&self) -> Result<()> {
        match self.state {
            State::Initialized => Ok(()),
            State::Streaming => Err(Error::Busy),
            other => Err(Error::InvalidState(other)),
        }
    }

    /// Sensor binding is also allowed while discovery is still running.
    fn ensure_bindable(&self) -> Result<()> {
        match self.state {
            State::Uninitialized | State::Initialized => Ok(()),
            State::Streaming => Err(Error::Busy),
            State::CleanedUp => Err(Error::InvalidState(State::CleanedUp)),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            State::Initialized | State::Streaming => Ok(()),
            other => Err(Error::InvalidState(other)),
        }
    }
}

/// The capture-pipeline coordinator for one CSI controller instance.
///
/// Share it between the control, submission and interrupt contexts with an
/// `Arc`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use csi_capture::sim::{SimCsi, SimSensor};
/// use csi_capture::{
///     CaptureCoordinator, CompletedBuffer, FourCC, FrameBuffer, MbusCode, SensorBinding,
/// };
///
/// let csi = CaptureCoordinator::new(Box::new(SimCsi::new()), |done: CompletedBuffer| {
///     println!("buffer {} seq {}", done.buffer.index, done.sequence);
/// });
/// let sensor = Arc::new(SimSensor::new("ov5640", &[MbusCode::UYVY8_2X8]));
/// csi.bind(0, SensorBinding::new(sensor, 0))?;
/// csi.complete_discovery()?;
///
/// let fmt = csi.negotiate(FourCC::YUYV)?;
/// assert_eq!(fmt.mbus_code, MbusCode::UYVY8_2X8);
///
/// let size = csi.format().sizeimage as usize;
/// csi.submit(FrameBuffer::new(0, 0x4000_0000, size))?;
/// csi.start_streaming()?;
/// csi.on_frame_complete(); // discarded
/// csi.on_frame_complete(); // buffer 0, sequence 0
/// csi.stop_streaming()?;
/// # Ok::<(), csi_capture::Error>(())
/// ```
pub struct CaptureCoordinator {
    ops: Box<dyn CsiOps>,
    done: Box<dyn BufferDone>,
    control: Mutex<Control>,
    queue: BufferQueue,
}

impl CaptureCoordinator {
    /// Creates a coordinator driving `ops`. Finished buffers are handed to
    /// `done`, possibly from the interrupt context.
    pub fn new(ops: Box<dyn CsiOps>, done: impl BufferDone + 'static) -> Self {
        let fourcc = format::fourccs()
            .first()
            .copied()
            .unwrap_or(FourCC::YUYV);
        CaptureCoordinator {
            ops,
            done: Box::new(done),
            control: Mutex::new(Control {
                state: State::Uninitialized,
                registry: SensorRegistry::new(),
                fmt: PixFormat::from_request(&FormatRequest::new(
                    DEFAULT_WIDTH,
                    DEFAULT_HEIGHT,
                    fourcc,
                )),
                current: None,
            }),
            queue: BufferQueue::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    pub fn backend_name(&self) -> &str {
        self.ops.name()
    }

    // -------------------------------------------------------------------------
    // Sensor discovery
    // -------------------------------------------------------------------------

    pub fn bind(&self, slot: usize, binding: SensorBinding) -> Result<()> {
        let mut ctl = self.lock();
        ctl.ensure_bindable()?;
        ctl.registry.bind(slot, binding)
    }

    /// Binds into the lowest free slot, returning its index.
    pub fn bind_next(&self, binding: SensorBinding) -> Result<usize> {
        let mut ctl = self.lock();
        ctl.ensure_bindable()?;
        ctl.registry.bind_next(binding)
    }

    pub fn unbind(&self, slot: usize) -> Result<Option<SensorSlot>> {
        let mut ctl = self.lock();
        ctl.ensure_bindable()?;
        Ok(ctl.registry.unbind(slot))
    }

    /// Switches the active input to `slot`.
    pub fn select_sensor(&self, slot: usize) -> Result<()> {
        let mut ctl = self.lock();
        ctl.ensure_bindable()?;
        ctl.registry.select(slot)
    }

    pub fn sensor(&self, slot: usize) -> Option<SensorSlot> {
        self.lock().registry.get(slot).cloned()
    }

    pub fn active_sensor(&self) -> Option<SensorSlot> {
        self.lock().registry.active().cloned()
    }

    pub fn sensor_count(&self) -> usize {
        self.lock().registry.len()
    }

    /// Called once every firmware endpoint has been bound. Picks the default
    /// format and makes the device usable. Zero bound sensors is accepted; such
    /// a device can negotiate nothing and cannot stream.
    pub fn complete_discovery(&self) -> Result<()> {
        let mut ctl = self.lock();
        if ctl.state != State::Uninitialized {
            return Err(Error::InvalidState(ctl.state));
        }

        let formats = self.supported_fourccs()?;
        let mut chosen = None;
        if ctl.registry.active().is_some() {
            for &fourcc in &formats {
                match self.find_format(&ctl.registry, fourcc) {
                    Ok(fmt) => {
                        chosen = Some(fmt);
                        break;
                    }
                    Err(Error::FormatUnsupported(_)) => continue,
                    Err(err) => return Err(err),
                }
            }
        }
        // Nothing matched a sensor yet: take the first backend fourcc for the
        // memory format but leave the pairing unset until one negotiates.
        match chosen {
            Some(fmt) => ctl.fmt = ctl.fmt.with_fourcc(fmt.fourcc),
            None => {
                if let Some(&fourcc) = formats.first() {
                    ctl.fmt = ctl.fmt.with_fourcc(fourcc);
                }
            }
        }
        ctl.current = chosen;
        ctl.state = State::Initialized;
        log::debug!(
            "{}: discovery complete, {} sensor(s), default format {}",
            self.ops.name(),
            ctl.registry.len(),
            ctl.fmt
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Format negotiation
    // -------------------------------------------------------------------------

    /// Backend formats restricted to the catalogue, in catalogue order. The
    /// whole catalogue when the backend does not report a list.
    fn supported_fourccs(&self) -> Result<Vec<FourCC>> {
        let catalogue = format::fourccs();
        Ok(match optional(self.ops.get_supported_pixformats())? {
            Some(backend) => catalogue
                .into_iter()
                .filter(|f| backend.contains(f))
                .collect(),
            None => catalogue,
        })
    }

    /// First catalogue pairing for `fourcc` accepted by the backend and the
    /// active sensor.
    fn find_format(&self, registry: &SensorRegistry, fourcc: FourCC) -> Result<CsiFormat> {
        if !format::is_known(fourcc) {
            return Err(Error::FormatUnsupported(fourcc));
        }
        if let Some(backend) = optional(self.ops.get_supported_pixformats())? {
            if !backend.contains(&fourcc) {
                return Err(Error::FormatUnsupported(fourcc));
            }
        }
        let sensor = registry.active().ok_or(Error::NoSensor)?;
        let codes = sensor.subdev().enum_mbus_codes();

        for entry in format::entries_for(fourcc) {
            if !codes.contains(&entry.mbus_code) {
                continue;
            }
            let accepted =
                optional(self.ops.is_format_supported(fourcc, entry.mbus_code, sensor))?;
            if accepted != Some(false) {
                return Ok(*entry);
            }
        }
        Err(Error::FormatUnsupported(fourcc))
    }

    /// Client-visible list of capturable pixel formats.
    pub fn enum_formats(&self) -> Result<Vec<FourCC>> {
        self.lock().ensure_open()?;
        self.supported_fourccs()
    }

    /// Selects `fourcc` and its media bus code for the active sensor. Geometry
    /// is kept; stride and size are recomputed. No other format is
    /// substituted on failure and the previous selection stays in place.
    pub fn negotiate(&self, fourcc: FourCC) -> Result<CsiFormat> {
        let mut ctl = self.lock();
        ctl.ensure_idle()?;
        let fmt = self.find_format(&ctl.registry, fourcc)?;
        ctl.fmt = ctl.fmt.with_fourcc(fourcc);
        ctl.current = Some(fmt);
        log::debug!("negotiated {}", fmt);
        Ok(fmt)
    }

    /// Adjusts `req` to what the pipeline would accept without applying it.
    pub fn try_format(&self, req: &FormatRequest) -> Result<PixFormat> {
        let ctl = self.lock();
        ctl.ensure_open()?;
        self.find_format(&ctl.registry, req.fourcc)?;
        Ok(PixFormat::from_request(req))
    }

    pub fn set_format(&self, req: &FormatRequest) -> Result<PixFormat> {
        let mut ctl = self.lock();
        ctl.ensure_idle()?;
        let fmt = self.find_format(&ctl.registry, req.fourcc)?;
        let pix = PixFormat::from_request(req);
        ctl.fmt = pix;
        ctl.current = Some(fmt);
        log::debug!("format set to {} ({})", pix, fmt.mbus_code);
        Ok(pix)
    }

    pub fn format(&self) -> PixFormat {
        self.lock().fmt
    }

    pub fn current_format(&self) -> Option<CsiFormat> {
        self.lock().current
    }

    // -------------------------------------------------------------------------
    // Buffers
    // -------------------------------------------------------------------------

    /// Queues `buffer` for capture. The buffer must hold one full image of the
    /// current format.
    pub fn submit(&self, buffer: FrameBuffer) -> Result<()> {
        let ctl = self.lock();
        ctl.ensure_open()?;
        let needed = ctl.fmt.sizeimage as usize;
        if buffer.length < needed {
            return Err(Error::BufferTooSmall {
                needed,
                actual: buffer.length,
            });
        }
        log::trace!("queue buffer {} @ {:#x}", buffer.index, buffer.addr);
        // The coordination lock stays held so two refills cannot reorder
        // their address writes.
        if let Some(addr) = self.queue.push(buffer) {
            match self.ops.update_buffer_address(addr) {
                Ok(()) | Err(Error::OperationNotSupported(_)) => {}
                Err(err) => {
                    log::warn!("{}: buffer address update failed: {}", self.ops.name(), err);
                    self.queue.record_address_error();
                }
            }
        }
        Ok(())
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Returns every queued buffer to its owner in [`BufferState::Error`].
    /// Stopping keeps buffers queued; this is the explicit way to get them
    /// back.
    pub fn release_buffers(&self) -> Result<usize> {
        let ctl = self.lock();
        ctl.ensure_idle()?;
        Ok(self.return_all(BufferState::Error))
    }

    fn return_all(&self, state: BufferState) -> usize {
        let buffers = self.queue.drain();
        let count = buffers.len();
        let timestamp = queue::now();
        for buffer in buffers {
            self.done.buffer_done(CompletedBuffer {
                buffer,
                sequence: 0,
                timestamp,
                state,
            });
        }
        count
    }

    // -------------------------------------------------------------------------
    // Streaming
    // -------------------------------------------------------------------------

    /// Powers and programs the controller and starts capture into the queued
    /// buffers.
    ///
    /// Needs an active sensor and at least one queued buffer. On any backend
    /// failure the steps already applied are undone in reverse order and the
    /// coordinator stays [`State::Initialized`].
    pub fn start_streaming(&self) -> Result<()> {
        let mut ctl = self.lock();
        ctl.ensure_idle()?;

        let sensor = ctl.registry.active().cloned().ok_or(Error::NoSensor)?;
        let head = self.queue.head_addr().ok_or(Error::NoBuffers)?;

        // Link validation: the sensor may have changed since negotiation.
        let fmt = self.find_format(&ctl.registry, ctl.fmt.fourcc)?;
        let config = CaptureConfig {
            pixelformat: fmt.fourcc,
            code: fmt.mbus_code,
            field: ctl.fmt.field,
            width: ctl.fmt.width,
            height: ctl.fmt.height,
        };

        let powered = optional(self.ops.set_power(true))?.is_some();
        if let Err(err) = self.enable_pipeline(&sensor, &config, head) {
            if powered {
                if let Err(e) = self.ops.set_power(false) {
                    log::warn!("{}: power off during unwind failed: {}", self.ops.name(), e);
                }
            }
            return Err(err);
        }

        ctl.current = Some(fmt);
        ctl.state = State::Streaming;
        log::debug!(
            "{}: streaming {} from {} (slot {})",
            self.ops.name(),
            ctl.fmt,
            sensor.subdev().name(),
            sensor.index
        );
        Ok(())
    }

    fn enable_pipeline(
        &self,
        sensor: &SensorSlot,
        config: &CaptureConfig,
        head: DmaAddr,
    ) -> Result<()> {
        optional(self.ops.apply_config(sensor, config))?;
        optional(self.ops.update_buffer_address(head))?;

        // The first completion after enable is stale; arm before the
        // hardware can raise it.
        self.queue.arm();
        let streaming = match optional(self.ops.set_stream(true)) {
            Ok(enabled) => enabled.is_some(),
            Err(err) => {
                self.queue.disarm();
                return Err(err);
            }
        };

        if let Err(err) = optional(sensor.subdev().set_stream(true)) {
            if streaming {
                if let Err(e) = self.ops.set_stream(false) {
                    log::warn!("{}: stream off during unwind failed: {}", self.ops.name(), e);
                }
            }
            self.queue.disarm();
            return Err(err);
        }
        Ok(())
    }

    /// Stops capture. Backend failures are logged and ignored; the coordinator
    /// always ends up [`State::Initialized`]. Queued buffers stay queued.
    pub fn stop_streaming(&self) -> Result<()> {
        let mut ctl = self.lock();
        match ctl.state {
            State::Streaming => {}
            State::Initialized => return Ok(()),
            other => return Err(Error::InvalidState(other)),
        }
        self.disable_pipeline(&ctl.registry);
        ctl.state = State::Initialized;
        Ok(())
    }

    fn disable_pipeline(&self, registry: &SensorRegistry) {
        let name = self.ops.name();
        if let Some(sensor) = registry.active() {
            if let Err(err) = optional(sensor.subdev().set_stream(false)) {
                log::warn!("{}: sensor {} stream off failed: {}", name, sensor.subdev().name(), err);
            }
        }
        if let Err(err) = optional(self.ops.set_stream(false)) {
            log::warn!("{}: stream off failed: {}", name, err);
        }
        self.queue.disarm();
        if let Err(err) = optional(self.ops.set_power(false)) {
            log::warn!("{}: power off failed: {}", name, err);
        }
        log::debug!("{}: streaming stopped, {} buffer(s) queued", name, self.queue.len());
    }

    /// Tears the device down: stops streaming, returns queued buffers in
    /// [`BufferState::Error`] and unbinds every sensor.
    pub fn cleanup(&self) -> Result<()> {
        let mut ctl = self.lock();
        if ctl.state == State::CleanedUp {
            return Err(Error::InvalidState(State::CleanedUp));
        }
        if ctl.state == State::Streaming {
            self.disable_pipeline(&ctl.registry);
        }
        let returned = self.return_all(BufferState::Error);
        let unbound = ctl.registry.clear();
        ctl.current = None;
        ctl.state = State::CleanedUp;
        log::debug!(
            "{}: cleaned up, returned {} buffer(s), unbound {} sensor(s)",
            self.ops.name(),
            returned,
            unbound.len()
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Frame completion
    // -------------------------------------------------------------------------

    /// Hardware frame-complete handler.
    ///
    /// Safe to call from interrupt context: it only takes the queue lock, and
    /// releases it before reprogramming the DMA address and handing the
    /// finished buffer back. Never fails; problems end up in [`Self::stats`].
    pub fn on_frame_complete(&self) -> FrameEvent {
        match self.queue.complete(queue::now()) {
            Completion::Spurious => FrameEvent::Spurious,
            Completion::Skipped => {
                log::trace!("skipped first frame after stream on");
                FrameEvent::Skipped
            }
            Completion::Dropped => {
                log::trace!("frame dropped, no buffer queued");
                FrameEvent::Dropped
            }
            Completion::Done { buffer, next } => {
                if let Some(addr) = next {
                    match self.ops.update_buffer_address(addr) {
                        Ok(()) | Err(Error::OperationNotSupported(_)) => {}
                        Err(err) => {
                            log::warn!("{}: buffer address update failed: {}", self.ops.name(), err);
                            self.queue.record_address_error();
                        }
                    }
                }
                let sequence = buffer.sequence;
                log::trace!("buffer {} done, sequence {}", buffer.buffer.index, sequence);
                self.done.buffer_done(buffer);
                FrameEvent::Completed { sequence }
            }
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.queue.stats()
    }
}

impl fmt::Debug for CaptureCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ctl = self.lock();
        f.debug_struct("CaptureCoordinator")
            .field("backend", &self.ops.name())
            .field("state", &ctl.state)
            .field("sensors", &ctl.registry.len())
            .field("format", &ctl.fmt)
            .field("queue", &self.queue)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mbus::MbusCode;
    use crate::sensor::SensorSubdev;
    use std::sync::{Arc, Mutex};

    /// Backend with no capabilities at all.
    struct Bare;

    impl CsiOps for Bare {}

    struct Sensor;

    impl SensorSubdev for Sensor {
        fn name(&self) -> &str {
            "tvp5150"
        }

        fn enum_mbus_codes(&self) -> Vec<MbusCode> {
            vec![MbusCode::UYVY8_2X8]
        }
    }

    fn coordinator() -> (CaptureCoordinator, Arc<Mutex<Vec<CompletedBuffer>>>) {
        let done = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&done);
        let csi = CaptureCoordinator::new(Box::new(Bare), move |buf: CompletedBuffer| {
            sink.lock().unwrap().push(buf);
        });
        (csi, done)
    }

    #[test]
    fn test_lifecycle_without_capabilities() {
        let (csi, done) = coordinator();
        assert_eq!(csi.state(), State::Uninitialized);
        csi.bind(0, SensorBinding::new(Arc::new(Sensor), 0)).unwrap();
        csi.complete_discovery().unwrap();
        assert_eq!(csi.state(), State::Initialized);

        // No backend list: the catalogue is the list, and the sensor limits
        // the default to a YUV format.
        assert_eq!(csi.current_format().unwrap().mbus_code, MbusCode::UYVY8_2X8);

        let size = csi.format().sizeimage as usize;
        csi.submit(FrameBuffer::new(0, 0x1000, size)).unwrap();
        csi.start_streaming().unwrap();
        assert_eq!(csi.state(), State::Streaming);
        assert_eq!(csi.on_frame_complete(), FrameEvent::Skipped);
        assert_eq!(csi.on_frame_complete(), FrameEvent::Completed { sequence: 0 });
        assert_eq!(csi.on_frame_complete(), FrameEvent::Dropped);
        csi.stop_streaming().unwrap();
        assert_eq!(done.lock().unwrap().len(), 1);

        csi.cleanup().unwrap();
        assert_eq!(csi.state(), State::CleanedUp);
        assert!(matches!(
            csi.start_streaming(),
            Err(Error::InvalidState(State::CleanedUp))
        ));
        assert!(matches!(
            csi.cleanup(),
            Err(Error::InvalidState(State::CleanedUp))
        ));
    }

    #[test]
    fn test_operations_before_discovery() {
        let (csi, _) = coordinator();
        assert!(matches!(
            csi.negotiate(FourCC::YUYV),
            Err(Error::InvalidState(State::Uninitialized))
        ));
        assert!(matches!(
            csi.submit(FrameBuffer::new(0, 0, 0)),
            Err(Error::InvalidState(State::Uninitialized))
        ));
        assert!(matches!(
            csi.stop_streaming(),
            Err(Error::InvalidState(State::Uninitialized))
        ));
        csi.complete_discovery().unwrap();
        assert!(matches!(
            csi.complete_discovery(),
            Err(Error::InvalidState(State::Initialized))
        ));
    }

    #[test]
    fn test_submit_checks_size() {
        let (csi, _) = coordinator();
        csi.complete_discovery().unwrap();
        let size = csi.format().sizeimage as usize;
        match csi.submit(FrameBuffer::new(0, 0x1000, size - 1)) {
            Err(Error::BufferTooSmall { needed, actual }) => {
                assert_eq!(needed, size);
                assert_eq!(actual, size - 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(csi.queued(), 0);
    }

    #[test]
    fn test_release_buffers_returns_errors() {
        let (csi, done) = coordinator();
        csi.complete_discovery().unwrap();
        let size = csi.format().sizeimage as usize;
        csi.submit(FrameBuffer::new(3, 0x3000, size)).unwrap();
        csi.submit(FrameBuffer::new(5, 0x5000, size)).unwrap();
        assert_eq!(csi.release_buffers().unwrap(), 2);
        let done = done.lock().unwrap();
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].buffer.index, 3);
        assert!(done.iter().all(|b| b.state == BufferState::Error));
    }
}
