//! Offline backend.
//!
//! Implements [`BackendPort`] without any network traffic so a node can be
//! provisioned and exercised end to end on the bench.  Registration returns
//! a fixed demo identity; the broker "session" is always accepted and
//! publishes are written to the log.  A networked backend implements the
//! same trait and reports `requires_station() == true`.

use log::info;

use crate::app::ports::{
    BackendPort, BrokerCredentials, LinkError, RegistrationError, RegistrationGrant,
    RegistrationRequest,
};

const DEMO_NODE_ID: &str = "00000000-0000-0000-0000-000000000001";
const DEMO_BROKER_HOST: &str = "mqtt.example.local";
const DEMO_BROKER_PORT: u16 = 1883;
const DEMO_BROKER_USER: &str = "demo-user";
const DEMO_BROKER_PASS: &str = "demo-pass";
const DEMO_SENSOR_ID: &str = "00000000-0000-0000-0000-00000000SENS";
const DEMO_SENSOR_SERIAL: &str = "PMS5003-EDU";

#[derive(Debug, Default)]
pub struct StubBackend {
    connected: bool,
    published: u32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of publishes accepted so far.
    pub fn published(&self) -> u32 {
        self.published
    }
}

impl BackendPort for StubBackend {
    fn requires_station(&self) -> bool {
        false
    }

    fn perform_registration(
        &mut self,
        request: &RegistrationRequest<'_>,
    ) -> Result<RegistrationGrant, RegistrationError> {
        info!(
            "Backend(stub): registering '{}' for {}",
            request.device_name, request.user_email
        );
        Ok(RegistrationGrant {
            node_id: DEMO_NODE_ID.into(),
            broker_host: DEMO_BROKER_HOST.into(),
            broker_port: DEMO_BROKER_PORT,
            broker_username: DEMO_BROKER_USER.into(),
            broker_password: DEMO_BROKER_PASS.into(),
            first_sensor_id: DEMO_SENSOR_ID.into(),
            first_sensor_serial: DEMO_SENSOR_SERIAL.into(),
        })
    }

    fn connect_broker(&mut self, credentials: &BrokerCredentials<'_>) -> Result<(), LinkError> {
        info!(
            "Backend(stub): broker session {}:{} accepted",
            credentials.host, credentials.port
        );
        self.connected = true;
        Ok(())
    }

    fn broker_connected(&self) -> bool {
        self.connected
    }

    fn disconnect_broker(&mut self) {
        self.connected = false;
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        self.published += 1;
        info!(
            "Backend(stub): PUB topic='{}' payload={}",
            topic,
            String::from_utf8_lossy(payload)
        );
        Ok(())
    }
}
