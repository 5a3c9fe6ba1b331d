//! PMS5003 frame decoder.
//!
//! Wire format (all multi-byte fields big-endian):
//! ```text
//! ┌──────┬──────┬────────────┬──────────────────────────────┬──────────┐
//! │ 0x42 │ 0x4D │ Length (2B)│ Data words (Length - 2 bytes)│ Sum (2B) │
//! └──────┴──────┴────────────┴──────────────────────────────┴──────────┘
//! ```
//!
//! `Length` counts the data words plus the checksum.  The checksum is the
//! 16-bit wrapping sum of every byte before it, marker and length included.
//! Data words 0..6 are PM1/PM2.5/PM10 on the factory (CF=1) basis, then
//! PM1/PM2.5/PM10 on the atmospheric basis.
//!
//! The decoder is stateless between calls: each call scans the stream from
//! wherever it currently is, so a dropped frame costs one poll and nothing
//! else.  A call is bounded by `marker_timeout + payload_timeout`.

use core::fmt;

use log::debug;

use crate::app::ports::{ByteSource, Clock};
use crate::config::NodeSettings;

use super::SensorReading;

/// Start-of-frame marker.
pub const FRAME_MARKER: [u8; 2] = [0x42, 0x4D];

/// Smallest accepted length field (13 data words + checksum on a PMS5003).
pub const MIN_FRAME_LEN: u16 = 28;

/// Largest accepted length field (protects the fixed payload buffer).
pub const MAX_FRAME_LEN: u16 = 64;

/// Header size: marker + length field.
const HEADER_SIZE: usize = 4;

/// Reasons a poll produced no reading.  None of them are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// No marker seen within the marker budget (sensor idle or absent).
    MarkerTimeout,
    /// The length field is outside `MIN_FRAME_LEN..=MAX_FRAME_LEN`.
    BadLength(u16),
    /// The stream went quiet before the length field or payload completed.
    ShortRead { expected: u16, got: u16 },
    /// The carried checksum disagrees with the computed one.
    ChecksumMismatch { computed: u16, carried: u16 },
}

impl FrameError {
    /// Integrity failures indicate line noise or a corrupted frame, as
    /// opposed to simply having nothing to read.
    pub fn is_integrity(&self) -> bool {
        !matches!(self, Self::MarkerTimeout)
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkerTimeout => write!(f, "no frame marker"),
            Self::BadLength(len) => write!(f, "frame length {} out of range", len),
            Self::ShortRead { expected, got } => {
                write!(f, "short read ({} of {} bytes)", got, expected)
            }
            Self::ChecksumMismatch { computed, carried } => {
                write!(f, "checksum mismatch: calc={}, frame={}", computed, carried)
            }
        }
    }
}

/// Marker scan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    WaitFirst,
    WaitSecond,
}

/// Bounded-time PMS5003 frame reader.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    marker_timeout_ms: u32,
    payload_timeout_ms: u32,
    idle_delay_ms: u32,
}

impl FrameDecoder {
    pub fn new(settings: &NodeSettings) -> Self {
        Self {
            marker_timeout_ms: settings.marker_timeout_ms,
            payload_timeout_ms: settings.payload_timeout_ms,
            idle_delay_ms: settings.idle_poll_delay_ms,
        }
    }

    /// Read at most one frame from `src`.
    ///
    /// The marker search gets `marker_timeout_ms`; the length field and the
    /// payload share a second `payload_timeout_ms` budget.
    pub fn read_frame(
        &self,
        src: &mut impl ByteSource,
        clock: &mut impl Clock,
    ) -> Result<SensorReading, FrameError> {
        self.scan_marker(src, clock)?;

        let deadline = clock.now_ms() + u64::from(self.payload_timeout_ms);

        let mut len_bytes = [0u8; 2];
        let got = self.read_until(src, clock, &mut len_bytes, deadline);
        if got < len_bytes.len() {
            return Err(FrameError::ShortRead {
                expected: 2,
                got: got as u16,
            });
        }

        let len = u16::from_be_bytes(len_bytes);
        if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) {
            return Err(FrameError::BadLength(len));
        }

        let mut buf = [0u8; MAX_FRAME_LEN as usize];
        let payload = &mut buf[..len as usize];
        let got = self.read_until(src, clock, payload, deadline);
        if got < payload.len() {
            return Err(FrameError::ShortRead {
                expected: len,
                got: got as u16,
            });
        }

        let (body, sum) = payload.split_at(payload.len() - 2);
        let carried = u16::from_be_bytes([sum[0], sum[1]]);
        let computed = checksum(len_bytes, body);
        if computed != carried {
            return Err(FrameError::ChecksumMismatch { computed, carried });
        }

        Ok(parse_body(body, clock.now_ms()))
    }

    /// Consume bytes until the two-byte marker has been seen.
    fn scan_marker(
        &self,
        src: &mut impl ByteSource,
        clock: &mut impl Clock,
    ) -> Result<(), FrameError> {
        let deadline = clock.now_ms() + u64::from(self.marker_timeout_ms);
        let mut state = ScanState::WaitFirst;

        while clock.now_ms() < deadline {
            let Some(b) = src.read_byte() else {
                clock.delay_ms(self.idle_delay_ms);
                continue;
            };
            state = match (state, b) {
                (ScanState::WaitFirst, 0x42) => ScanState::WaitSecond,
                (ScanState::WaitSecond, 0x4D) => return Ok(()),
                _ => ScanState::WaitFirst,
            };
        }

        debug!("PMS: no marker within {} ms", self.marker_timeout_ms);
        Err(FrameError::MarkerTimeout)
    }

    /// Fill `buf` until it is full or `deadline` passes.  Returns bytes read.
    fn read_until(
        &self,
        src: &mut impl ByteSource,
        clock: &mut impl Clock,
        buf: &mut [u8],
        deadline: u64,
    ) -> usize {
        let mut got = 0;
        while got < buf.len() && clock.now_ms() < deadline {
            match src.read_byte() {
                Some(b) => {
                    buf[got] = b;
                    got += 1;
                }
                None => clock.delay_ms(self.idle_delay_ms),
            }
        }
        got
    }
}

/// 16-bit wrapping sum over marker, length and frame body.
pub fn checksum(len_bytes: [u8; 2], body: &[u8]) -> u16 {
    FRAME_MARKER
        .iter()
        .chain(len_bytes.iter())
        .chain(body.iter())
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

fn parse_body(body: &[u8], now_ms: u64) -> SensorReading {
    let word = |idx: usize| u16::from_be_bytes([body[idx * 2], body[idx * 2 + 1]]);
    SensorReading {
        pm1_cf1: word(0),
        pm25_cf1: word(1),
        pm10_cf1: word(2),
        pm1_atm: word(3),
        pm25_atm: word(4),
        pm10_atm: word(5),
        captured_at_ms: now_ms,
        valid: true,
    }
}

/// Encode `words` as a complete frame into `out`.
///
/// Returns the total number of bytes written, or `None` if the resulting
/// length field would be out of range or `out` is too small.  Used by the
/// UART simulation and by tests.
pub fn encode_frame(words: &[u16], out: &mut [u8]) -> Option<usize> {
    let len = words.len() * 2 + 2;
    let len16 = u16::try_from(len).ok()?;
    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len16) || out.len() < HEADER_SIZE + len {
        return None;
    }

    let len_bytes = len16.to_be_bytes();
    out[..2].copy_from_slice(&FRAME_MARKER);
    out[2..HEADER_SIZE].copy_from_slice(&len_bytes);
    for (i, w) in words.iter().enumerate() {
        let at = HEADER_SIZE + i * 2;
        out[at..at + 2].copy_from_slice(&w.to_be_bytes());
    }

    let body_end = HEADER_SIZE + words.len() * 2;
    let sum = checksum(len_bytes, &out[HEADER_SIZE..body_end]);
    out[body_end..body_end + 2].copy_from_slice(&sum.to_be_bytes());
    Some(body_end + 2)
}
