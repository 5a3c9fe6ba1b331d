//! PMS5003 UART adapter.
//!
//! Implements [`ByteSource`] over the sensor's UART RX line (9600 8N1).
//! Reads never block: the driver is drained with a zero timeout into a
//! small local buffer and handed out one byte at a time.
//!
//! - **`target_os = "espidf"`**: `esp_idf_hal::uart::UartRxDriver`.
//! - **all other targets**: a byte queue that is either scripted by tests or
//!   refilled with synthetic frames for host runs.

use crate::app::ports::ByteSource;

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

#[cfg(target_os = "espidf")]
use esp_idf_hal::{delay::NON_BLOCK, uart::UartRxDriver};

#[cfg(not(target_os = "espidf"))]
use crate::sensors::pms5003::{MAX_FRAME_LEN, encode_frame};

#[cfg(target_os = "espidf")]
const RX_CHUNK: usize = 64;

/// Baud rate of the PMS5003 serial interface.
pub const PMS_BAUD: u32 = 9_600;

pub struct UartSensorPort {
    #[cfg(target_os = "espidf")]
    uart: UartRxDriver<'static>,
    #[cfg(target_os = "espidf")]
    chunk: [u8; RX_CHUNK],
    #[cfg(target_os = "espidf")]
    pos: usize,
    #[cfg(target_os = "espidf")]
    len: usize,

    #[cfg(not(target_os = "espidf"))]
    queue: VecDeque<u8>,
    /// Simulation: refill with a synthetic frame whenever the queue drains.
    #[cfg(not(target_os = "espidf"))]
    synthetic: bool,
    #[cfg(not(target_os = "espidf"))]
    sample: u16,
}

impl UartSensorPort {
    #[cfg(target_os = "espidf")]
    pub fn new(uart: UartRxDriver<'static>) -> Self {
        Self {
            uart,
            chunk: [0; RX_CHUNK],
            pos: 0,
            len: 0,
        }
    }

    /// Simulation: a port producing a steady stream of valid frames.
    #[cfg(not(target_os = "espidf"))]
    pub fn synthetic() -> Self {
        Self {
            queue: VecDeque::new(),
            synthetic: true,
            sample: 0,
        }
    }

    /// Simulation: a port that only yields what tests push.
    #[cfg(not(target_os = "espidf"))]
    pub fn scripted() -> Self {
        Self {
            queue: VecDeque::new(),
            synthetic: false,
            sample: 0,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.queue.extend(bytes.iter().copied());
    }

    /// Queue one well-formed frame carrying `words`.
    #[cfg(not(target_os = "espidf"))]
    pub fn push_frame(&mut self, words: &[u16]) {
        let mut buf = [0u8; MAX_FRAME_LEN as usize + 4];
        if let Some(n) = encode_frame(words, &mut buf) {
            self.push_bytes(&buf[..n]);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[cfg(not(target_os = "espidf"))]
    fn refill_synthetic(&mut self) {
        self.sample = self.sample.wrapping_add(1);
        // Slow sawtooth so consecutive readings differ.
        let base = 5 + self.sample % 20;
        let mut words = [0u16; 13];
        words[..6].copy_from_slice(&[base, base + 3, base + 6, base, base + 3, base + 6]);
        self.push_frame(&words);
    }
}

impl ByteSource for UartSensorPort {
    #[cfg(target_os = "espidf")]
    fn read_byte(&mut self) -> Option<u8> {
        if self.pos >= self.len {
            self.pos = 0;
            self.len = match self.uart.read(&mut self.chunk, NON_BLOCK) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("PMS: UART read failed: {}", e);
                    0
                }
            };
        }
        if self.pos < self.len {
            let b = self.chunk[self.pos];
            self.pos += 1;
            Some(b)
        } else {
            None
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_byte(&mut self) -> Option<u8> {
        if self.queue.is_empty() && self.synthetic {
            self.refill_synthetic();
        }
        self.queue.pop_front()
    }
}
