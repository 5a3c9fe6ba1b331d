//! Sensor subsystem: the PMS5003 frame decoder and the latest-reading slot.
//!
//! The decoder produces at most one [`SensorReading`] per poll.  The
//! [`ReadingSlot`] keeps the most recent valid one; rejected frames never
//! touch it, so consumers (telemetry, heartbeat) always see the last good
//! value.

pub mod pms5003;

/// One decoded particulate-matter sample, in µg/m³.
///
/// `cf1` values use the factory calibration basis, `atm` values the
/// atmospheric-environment basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorReading {
    pub pm1_cf1: u16,
    pub pm25_cf1: u16,
    pub pm10_cf1: u16,
    pub pm1_atm: u16,
    pub pm25_atm: u16,
    pub pm10_atm: u16,
    /// Monotonic capture time.
    pub captured_at_ms: u64,
    pub valid: bool,
}

/// Single-slot holder for the most recent valid reading.
#[derive(Debug, Default)]
pub struct ReadingSlot {
    latest: Option<SensorReading>,
}

impl ReadingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reading` if it is valid.  Returns whether the slot changed.
    pub fn offer(&mut self, reading: SensorReading) -> bool {
        if !reading.valid {
            return false;
        }
        self.latest = Some(reading);
        true
    }

    pub fn latest(&self) -> Option<&SensorReading> {
        self.latest.as_ref()
    }

    /// Milliseconds since the held reading was captured.
    pub fn age_ms(&self, now_ms: u64) -> Option<u64> {
        self.latest
            .as_ref()
            .map(|r| now_ms.saturating_sub(r.captured_at_ms))
    }
}
