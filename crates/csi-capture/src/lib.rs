// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! CSI Capture Library for Rust
//!
//! Capture-pipeline coordination for the parallel/BT.656 camera sensor
//! interface found on Allwinner-class SoCs.
//!
//! The library sits between a buffer-queue client, up to four image sensors
//! discovered asynchronously from the firmware description, and a per-SoC
//! hardware backend. It negotiates memory and media bus formats, sequences
//! power and stream enable, and recycles DMA buffers on every frame-complete
//! interrupt.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use csi_capture::sim::{SimCsi, SimSensor};
//! use csi_capture::{
//!     CaptureCoordinator, CompletedBuffer, FourCC, FrameBuffer, MbusCode, SensorBinding,
//! };
//!
//! let csi = Arc::new(CaptureCoordinator::new(Box::new(SimCsi::new()), |done: CompletedBuffer| {
//!     println!("frame {} in buffer {}", done.sequence, done.buffer.index);
//! }));
//!
//! let sensor = Arc::new(SimSensor::new("ov5640", &[MbusCode::YUYV8_2X8]));
//! csi.bind(0, SensorBinding::new(sensor, 0))?;
//! csi.complete_discovery()?;
//! csi.negotiate(FourCC::NV12)?;
//!
//! let size = csi.format().sizeimage as usize;
//! for i in 0..4 {
//!     csi.submit(FrameBuffer::new(i, 0x4000_0000 + u64::from(i) * 0x20_0000, size))?;
//! }
//! csi.start_streaming()?;
//! // Hardware interrupt handler:
//! csi.on_frame_complete();
//! csi.stop_streaming()?;
//! # Ok::<(), csi_capture::Error>(())
//! ```
//!
//! # Features
//!
//! - Format catalogue of Bayer, YUV and RGB memory formats
//! - Sensor registry with active input selection
//! - Capability-set hardware backends; missing operations are skipped
//! - Interrupt-safe buffer recycling on a non-sleeping lock
//! - Simulated controller and sensor for tests and tooling
//!
//! # Support
//!
//! For questions and support:
//! - Repository: <https://github.com/EdgeFirstAI/csi-capture>
//! - Professional support: support@au-zone.com

use std::{error, fmt, io};

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

/// Media bus pixel codes exchanged between sensor and controller.
pub mod mbus;

/// The format module holds the static format catalogue and geometry rules.
pub mod format;

/// Sensor subdevices and the slot registry.
pub mod sensor;

/// The backend module defines the per-SoC hardware operations.
pub mod backend;

/// DMA buffer queue and frame-completion bookkeeping.
pub mod queue;

/// The coordinator module drives negotiation, streaming and teardown.
pub mod coordinator;

/// Simulated controller and sensors.
pub mod sim;

pub use backend::{CaptureConfig, CsiOps};
pub use coordinator::{CaptureCoordinator, State};
pub use format::{CsiFormat, Field, FormatRequest, PixFormat};
pub use fourcc::FourCC;
pub use mbus::MbusCode;
pub use queue::{
    BufferDone, BufferState, CaptureStats, CompletedBuffer, DmaAddr, FrameBuffer, FrameEvent,
};
pub use sensor::{
    BusFlags, MbusType, ParallelBus, SensorBinding, SensorSlot, SensorSubdev, MAX_SENSORS,
};

/// Error type for capture pipeline operations
#[derive(Debug)]
pub enum Error {
    /// The backend or sensor does not implement the named operation
    OperationNotSupported(&'static str),

    /// No catalogue pairing for this fourcc is accepted by the backend and
    /// the active sensor
    FormatUnsupported(FourCC),

    /// The operation is not allowed while streaming
    Busy,

    /// Sensor slot index past the last slot
    SlotRange(usize),

    /// Sensor slot already bound, or another slot holds the same endpoint
    SlotOccupied(usize),

    /// Backend reported a failure
    Backend(String),

    /// I/O error from a backend talking to hardware
    Io(io::Error),

    /// No sensor bound or selected
    NoSensor,

    /// Streaming needs at least one queued buffer
    NoBuffers,

    /// Submitted buffer cannot hold one image of the current format
    BufferTooSmall { needed: usize, actual: usize },

    /// The operation is not valid in this coordinator state
    InvalidState(State),

    /// String is not a valid four character code
    InvalidFourCC(String),
}

impl Error {
    /// True for [`Error::OperationNotSupported`].
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::OperationNotSupported(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OperationNotSupported(op) => write!(f, "Operation not supported: {}", op),
            Error::FormatUnsupported(fourcc) => write!(f, "Format not supported: {}", fourcc),
            Error::Busy => write!(f, "Device busy: streaming in progress"),
            Error::SlotRange(slot) => {
                write!(f, "Sensor slot {} out of range (max {})", slot, MAX_SENSORS)
            }
            Error::SlotOccupied(slot) => write!(f, "Sensor slot {} already bound", slot),
            Error::Backend(msg) => write!(f, "Backend error: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::NoSensor => write!(f, "No sensor bound"),
            Error::NoBuffers => write!(f, "No buffers queued"),
            Error::BufferTooSmall { needed, actual } => write!(
                f,
                "Buffer too small: {} bytes, need {}",
                actual, needed
            ),
            Error::InvalidState(state) => write!(f, "Invalid in state {}", state),
            Error::InvalidFourCC(s) => write!(f, "Invalid fourcc: {:?}", s),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Library version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::FormatUnsupported(FourCC::RGB24).to_string(),
            "Format not supported: RGB3"
        );
        assert_eq!(
            Error::BufferTooSmall {
                needed: 100,
                actual: 10
            }
            .to_string(),
            "Buffer too small: 10 bytes, need 100"
        );
        assert!(Error::OperationNotSupported("set_power").is_not_supported());
        assert!(!Error::Busy.is_not_supported());
    }

    #[test]
    fn test_io_source() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "bus timeout").into();
        assert!(err.source().is_some());
        assert!(Error::NoSensor.source().is_none());
    }
}
