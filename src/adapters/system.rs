//! Chip-level services: heap metrics and restart.
//!
//! Implements [`SystemPort`].  On the host the heap figure is synthetic and
//! a restart only sets a flag, so simulation paths exercise the same
//! branches as real hardware.

use log::warn;

use crate::app::ports::SystemPort;

#[derive(Debug, Default)]
pub struct SystemAdapter {
    #[cfg(not(target_os = "espidf"))]
    restart_requested: bool,
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulation: whether `restart()` has been called.
    #[cfg(not(target_os = "espidf"))]
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }
}

impl SystemPort for SystemAdapter {
    #[cfg(target_os = "espidf")]
    fn free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap(&self) -> u32 {
        300 * 1024
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        warn!("System: restarting");
        unsafe { esp_idf_svc::sys::esp_restart() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        warn!("System(sim): restart requested");
        self.restart_requested = true;
    }
}
