//! Inbound commands to the application service.
//!
//! These are the actions the provisioning portal can request.  The portal
//! never writes config fields directly; everything goes through
//! [`NodeService::handle_command`](super::service::NodeService::handle_command).

use crate::app::ports::StorageError;
use crate::app::registration::RegistrationReport;
use crate::config::ProvisioningForm;
use crate::status::StatusSnapshot;

/// Commands the portal can send into the application core.
#[derive(Debug, Clone)]
pub enum PortalCommand {
    /// Save the submitted fields and redeem the one-time key.
    SubmitProvisioning(ProvisioningForm),

    /// Reset the stored record to defaults.
    Clear,

    /// Restart the device.
    Reboot,

    /// Read-only status for the portal page.
    GetStatus,
}

/// Result of a [`PortalCommand`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Registration(RegistrationReport),
    Cleared { error: Option<StorageError> },
    RebootRequested,
    Status(StatusSnapshot),
}
