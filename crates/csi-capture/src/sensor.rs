// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Sensor Registry
//!
//! Fixed-capacity arena of sensor slots filled by asynchronous discovery. Each
//! slot records the bound subdevice together with the endpoint and bus
//! metadata taken from the firmware description.
//!
//! The registry also tracks the active input, the one slot whose link to the
//! controller is enabled. Negotiation and streaming always use that slot.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::mbus::MbusCode;
use crate::{Error, Result};

/// Number of sensor inputs on the controller.
pub const MAX_SENSORS: usize = 4;

/// A bound image sensor.
///
/// Only `name` and `enum_mbus_codes` are mandatory. Sensors without a
/// stream control report [`Error::OperationNotSupported`], which the
/// coordinator treats as "nothing to do".
pub trait SensorSubdev: Send + Sync {
    fn name(&self) -> &str;

    /// Media bus codes the sensor can output.
    fn enum_mbus_codes(&self) -> Vec<MbusCode>;

    fn set_stream(&self, _enable: bool) -> Result<()> {
        Err(Error::OperationNotSupported("sensor set_stream"))
    }
}

/// Physical bus between sensor and controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbusType {
    Parallel,
    Bt656,
    Csi2Dphy,
}

impl fmt::Display for MbusType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MbusType::Parallel => write!(f, "parallel"),
            MbusType::Bt656 => write!(f, "bt656"),
            MbusType::Csi2Dphy => write!(f, "csi2-dphy"),
        }
    }
}

bitflags! {
    /// Parallel bus signal polarities (`V4L2_MBUS_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BusFlags: u32 {
        const HSYNC_ACTIVE_HIGH = 1 << 2;
        const HSYNC_ACTIVE_LOW = 1 << 3;
        const VSYNC_ACTIVE_HIGH = 1 << 4;
        const VSYNC_ACTIVE_LOW = 1 << 5;
        const PCLK_SAMPLE_RISING = 1 << 6;
        const PCLK_SAMPLE_FALLING = 1 << 7;
        const DATA_ACTIVE_HIGH = 1 << 8;
        const DATA_ACTIVE_LOW = 1 << 9;
        const FIELD_EVEN_HIGH = 1 << 12;
        const FIELD_EVEN_LOW = 1 << 13;
    }
}

/// Parallel (and BT.656) bus timing parameters from the firmware endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelBus {
    pub flags: BusFlags,
    pub bus_width: u8,
    pub data_shift: u8,
}

impl Default for ParallelBus {
    fn default() -> Self {
        ParallelBus {
            flags: BusFlags::HSYNC_ACTIVE_HIGH
                | BusFlags::VSYNC_ACTIVE_HIGH
                | BusFlags::PCLK_SAMPLE_RISING,
            bus_width: 8,
            data_shift: 0,
        }
    }
}

/// Everything discovery knows about one endpoint at bind time.
#[derive(Clone)]
pub struct SensorBinding {
    pub subdev: Arc<dyn SensorSubdev>,
    /// Controller input pad index.
    pub pad: u32,
    /// Firmware endpoint identifier.
    pub endpoint_id: u32,
    pub bus_type: MbusType,
    pub parallel: ParallelBus,
}

impl SensorBinding {
    pub fn new(subdev: Arc<dyn SensorSubdev>, endpoint_id: u32) -> Self {
        SensorBinding {
            subdev,
            pad: endpoint_id,
            endpoint_id,
            bus_type: MbusType::Parallel,
            parallel: ParallelBus::default(),
        }
    }

    pub fn with_pad(self, pad: u32) -> Self {
        SensorBinding { pad, ..self }
    }

    pub fn with_bus(self, bus_type: MbusType, parallel: ParallelBus) -> Self {
        SensorBinding {
            bus_type,
            parallel,
            ..self
        }
    }
}

impl fmt::Debug for SensorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorBinding")
            .field("subdev", &self.subdev.name())
            .field("pad", &self.pad)
            .field("endpoint_id", &self.endpoint_id)
            .field("bus_type", &self.bus_type)
            .field("parallel", &self.parallel)
            .finish()
    }
}

/// An occupied registry slot.
#[derive(Debug, Clone)]
pub struct SensorSlot {
    pub index: usize,
    pub binding: SensorBinding,
}

impl SensorSlot {
    pub fn subdev(&self) -> &dyn SensorSubdev {
        self.binding.subdev.as_ref()
    }

    pub fn supports_mbus(&self, code: MbusCode) -> bool {
        self.subdev().enum_mbus_codes().contains(&code)
    }
}

#[derive(Debug, Default)]
pub struct SensorRegistry {
    slots: [Option<SensorSlot>; MAX_SENSORS],
    active: Option<usize>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        SensorRegistry::default()
    }

    /// Binds a discovered sensor into `slot`.
    ///
    /// Fails with [`Error::SlotRange`] past the last slot and with
    /// [`Error::SlotOccupied`] when the slot is taken or another slot already
    /// holds the same endpoint or pad. The first bound sensor becomes active.
    pub fn bind(&mut self, slot: usize, binding: SensorBinding) -> Result<()> {
        let entry = self.slots.get(slot).ok_or(Error::SlotRange(slot))?;
        if entry.is_some() {
            return Err(Error::SlotOccupied(slot));
        }
        if let Some(other) = self.iter().find(|s| {
            s.binding.endpoint_id == binding.endpoint_id || s.binding.pad == binding.pad
        }) {
            return Err(Error::SlotOccupied(other.index));
        }

        log::debug!(
            "bound sensor {} to slot {} (endpoint {}, pad {}, {})",
            binding.subdev.name(),
            slot,
            binding.endpoint_id,
            binding.pad,
            binding.bus_type
        );
        self.slots[slot] = Some(SensorSlot {
            index: slot,
            binding,
        });
        if self.active.is_none() {
            self.active = Some(slot);
        }
        Ok(())
    }

    /// Binds into the lowest free slot and returns its index.
    pub fn bind_next(&mut self, binding: SensorBinding) -> Result<usize> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::SlotRange(MAX_SENSORS))?;
        self.bind(slot, binding)?;
        Ok(slot)
    }

    /// Clears `slot`, returning what was bound there. The active input falls
    /// back to the lowest remaining bound slot.
    pub fn unbind(&mut self, slot: usize) -> Option<SensorSlot> {
        let removed = self.slots.get_mut(slot)?.take()?;
        log::debug!(
            "unbound sensor {} from slot {}",
            removed.binding.subdev.name(),
            slot
        );
        if self.active == Some(slot) {
            let next = self.iter().next().map(|s| s.index);
            self.active = next;
        }
        Some(removed)
    }

    pub fn get(&self, slot: usize) -> Option<&SensorSlot> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn find_endpoint(&self, endpoint_id: u32) -> Option<&SensorSlot> {
        self.iter().find(|s| s.binding.endpoint_id == endpoint_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorSlot> {
        self.slots.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn active(&self) -> Option<&SensorSlot> {
        self.get(self.active?)
    }

    /// Makes `slot` the active input. The slot must be bound.
    pub fn select(&mut self, slot: usize) -> Result<()> {
        if slot >= MAX_SENSORS {
            return Err(Error::SlotRange(slot));
        }
        if self.get(slot).is_none() {
            return Err(Error::NoSensor);
        }
        self.active = Some(slot);
        Ok(())
    }

    /// Unbinds everything, returning the cleared slots.
    pub fn clear(&mut self) -> Vec<SensorSlot> {
        self.active = None;
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake(&'static str);

    impl SensorSubdev for Fake {
        fn name(&self) -> &str {
            self.0
        }

        fn enum_mbus_codes(&self) -> Vec<MbusCode> {
            vec![MbusCode::UYVY8_2X8]
        }
    }

    fn binding(ep: u32) -> SensorBinding {
        SensorBinding::new(Arc::new(Fake("ov5640")), ep)
    }

    #[test]
    fn test_bind_and_get() {
        let mut reg = SensorRegistry::new();
        assert!(reg.is_empty());
        reg.bind(2, binding(7)).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(2).unwrap().binding.endpoint_id, 7);
        assert!(reg.get(0).is_none());
        assert!(reg.get(99).is_none());
        assert_eq!(reg.active().unwrap().index, 2);
        assert!(reg.active().unwrap().supports_mbus(MbusCode::UYVY8_2X8));
    }

    #[test]
    fn test_bind_out_of_range() {
        let mut reg = SensorRegistry::new();
        assert!(matches!(
            reg.bind(MAX_SENSORS, binding(0)),
            Err(Error::SlotRange(4))
        ));
    }

    #[test]
    fn test_bind_collisions() {
        let mut reg = SensorRegistry::new();
        reg.bind(0, binding(1)).unwrap();
        assert!(matches!(reg.bind(0, binding(2)), Err(Error::SlotOccupied(0))));
        // Same endpoint in a different slot.
        assert!(matches!(reg.bind(1, binding(1)), Err(Error::SlotOccupied(0))));
        // Same pad in a different slot.
        assert!(matches!(
            reg.bind(1, binding(5).with_pad(1)),
            Err(Error::SlotOccupied(0))
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_bind_next_fills_then_fails() {
        let mut reg = SensorRegistry::new();
        for ep in 0..MAX_SENSORS as u32 {
            assert_eq!(reg.bind_next(binding(ep)).unwrap(), ep as usize);
        }
        assert!(matches!(
            reg.bind_next(binding(10)),
            Err(Error::SlotRange(_))
        ));
    }

    #[test]
    fn test_unbind_moves_active() {
        let mut reg = SensorRegistry::new();
        reg.bind(1, binding(1)).unwrap();
        reg.bind(3, binding(3)).unwrap();
        reg.select(3).unwrap();
        assert!(reg.unbind(3).is_some());
        assert_eq!(reg.active().unwrap().index, 1);
        assert!(reg.unbind(3).is_none());
        assert!(reg.unbind(1).is_some());
        assert!(reg.active().is_none());
        assert!(reg.find_endpoint(1).is_none());
    }

    #[test]
    fn test_select_requires_bound_slot() {
        let mut reg = SensorRegistry::new();
        reg.bind(0, binding(0)).unwrap();
        assert!(matches!(reg.select(2), Err(Error::NoSensor)));
        assert!(matches!(reg.select(9), Err(Error::SlotRange(9))));
        assert_eq!(reg.clear().len(), 1);
        assert!(reg.is_empty());
    }
}
