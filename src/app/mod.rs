//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the orchestration for the sensor node: provisioning,
//! registration, and the cooperative poll loop that drives the links, the
//! frame decoder and the heartbeat.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod registration;
pub mod service;
