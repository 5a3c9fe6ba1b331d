//! Network links: the station (WiFi STA) join and the telemetry broker
//! session.  Both are poll-driven state machines that share the same
//! capped linear [`Backoff`](backoff::Backoff).

pub mod backoff;
pub mod station;
pub mod telemetry;
