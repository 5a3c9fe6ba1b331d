//! Fuzz target: `FrameDecoder::read_frame`
//!
//! Drives arbitrary byte sequences through the PMS5003 frame decoder until
//! the input is exhausted and asserts that it never panics and that every
//! reading it yields is marked valid.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use std::cell::Cell;

use airnode::app::ports::{ByteSource, Clock};
use airnode::config::NodeSettings;
use airnode::sensors::pms5003::FrameDecoder;
use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;

struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl ByteSource for Input<'_> {
    fn read_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied();
        self.pos += 1;
        b
    }
}

#[derive(Default)]
struct FuzzClock(Cell<u64>);

impl DelayNs for FuzzClock {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + u64::from(ns.div_ceil(1_000_000)));
    }
}

impl Clock for FuzzClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

fuzz_target!(|data: &[u8]| {
    let decoder = FrameDecoder::new(&NodeSettings::default());
    let mut src = Input { data, pos: 0 };
    let mut clock = FuzzClock::default();

    while src.pos < data.len() {
        if let Ok(reading) = decoder.read_frame(&mut src, &mut clock) {
            assert!(reading.valid, "decoder yielded an invalid reading");
        }
    }
});
