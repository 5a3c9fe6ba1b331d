//! Provisioning submission and one-time-key registration.
//!
//! ```text
//!  form ─▶ apply + invalidate ─▶ save ─▶ re-join ─▶ key? ──no──▶ Skipped
//!                                                     │
//!                                  station up? ◀──────┘ (if the backend needs it)
//!                                     │
//!                     perform_registration ─▶ validate ─▶ apply grant ─▶ save
//! ```
//!
//! Running the flow twice with the same form ends in the same record.  A
//! failed registration leaves the derived fields empty and
//! `registration_complete == false`.

use log::{info, warn};

use crate::app::ports::{
    BackendPort, Clock, RegistrationError, RegistrationRequest, StationPort, StorageError,
    StoragePort,
};
use crate::config::{DeviceConfig, ProvisioningForm};
use crate::config_store::ConfigStore;
use crate::link::station::StationLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    /// No one-time key was supplied; the backend was not contacted.
    Skipped,
    Failed(RegistrationError),
}

/// Outcome plus the first persistence failure seen along the way, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationReport {
    pub outcome: RegistrationOutcome,
    pub persist_error: Option<StorageError>,
}

/// One run of the provisioning flow over borrowed service state.
pub struct RegistrationFlow<'a, S, W, B> {
    pub config: &'a mut DeviceConfig,
    pub store: &'a mut ConfigStore<S>,
    pub station: &'a mut StationLink,
    pub wifi: &'a mut W,
    pub backend: &'a mut B,
    pub join_timeout_ms: u32,
}

impl<S, W, B> RegistrationFlow<'_, S, W, B>
where
    S: StoragePort,
    W: StationPort,
    B: BackendPort,
{
    pub fn submit(mut self, form: &ProvisioningForm, clock: &mut impl Clock) -> RegistrationReport {
        // 1. Apply the submission.  Any previous registration is void.
        self.config.apply_submission(form);
        let mut persist_error = self.persist();

        // 2. Re-validate the station credentials on every save.
        self.station.request_join(self.wifi);

        let outcome = self.redeem(clock, &mut persist_error);
        match outcome {
            RegistrationOutcome::Registered => {
                info!("Registration: complete\n{}", self.config);
            }
            RegistrationOutcome::Skipped => {
                info!("Registration: no one-time key, skipped");
            }
            RegistrationOutcome::Failed(e) => {
                warn!("Registration: failed: {}", e);
            }
        }

        RegistrationReport {
            outcome,
            persist_error,
        }
    }

    fn redeem(
        &mut self,
        clock: &mut impl Clock,
        persist_error: &mut Option<StorageError>,
    ) -> RegistrationOutcome {
        if self.config.one_time_key.is_empty() {
            return RegistrationOutcome::Skipped;
        }

        if self.backend.requires_station()
            && !self
                .station
                .wait_joined(clock, self.config, self.wifi, self.join_timeout_ms)
        {
            return RegistrationOutcome::Failed(RegistrationError::StationDown);
        }

        let request = RegistrationRequest {
            one_time_key: &self.config.one_time_key,
            user_email: &self.config.user_email,
            device_name: &self.config.device_name,
        };
        info!(
            "Registration: redeeming key for '{}' ({})",
            request.device_name, request.user_email
        );

        let grant = match self.backend.perform_registration(&request) {
            Ok(grant) => grant,
            Err(e) => return RegistrationOutcome::Failed(e),
        };
        if !grant.is_complete() {
            return RegistrationOutcome::Failed(RegistrationError::IncompleteGrant);
        }

        self.config.apply_grant(&grant);
        if let Some(e) = self.persist() {
            persist_error.get_or_insert(e);
        }
        RegistrationOutcome::Registered
    }

    fn persist(&mut self) -> Option<StorageError> {
        self.store.save(self.config).err().inspect(|e| {
            warn!("Registration: save failed ({}), continuing in memory", e);
        })
    }
}
