//! The single configuration record built once at startup and shared by
//! reference with every consumer (§A.3): the tracker, the address filter's
//! rotation task, the scorer's correction-bit-count policy, and every mux
//! service/connector.

use crate::net::{Connector, Protocol};

/// A listening or outbound endpoint for one wire protocol (§6 "Outbound
/// connectors"). `connect_to` being `None` means this service listens;
/// `Some` means it dials out instead.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub protocol: Protocol,
    pub listen_port: Option<u16>,
    pub connect_to: Option<Connector>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub services: Vec<ServiceSpec>,

    /// Maximum number of bit corrections the decoder/scorer will attempt
    /// on a frame (§4.4's `max_weight`), mirroring readsb's `nfix_crc`.
    pub nfix_crc: u8,
    /// Cap on the position-reliability counters (§4.6, `FILTER_PERSISTENCE`
    /// in the tracker).
    pub filter_persistence: u8,
    /// Discard positions implying travel further than this from the
    /// receiver, in nautical miles. `None` disables the check.
    pub max_range_nm: Option<f64>,
    /// Receiver's own antenna position, used for CPR local-decode
    /// disambiguation when no aircraft-relative reference is available yet.
    pub receiver_position: Option<(f64, f64)>,

    pub heartbeat_interval_ms: u64,
    pub net_connector_delay_ms: u64,
    pub expire_after_minutes: u64,

    pub snapshot_dir: Option<String>,
    pub snapshot_interval_ms: u64,

    pub verbose: bool,
    pub json_log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            services: Vec::new(),
            nfix_crc: 1,
            filter_persistence: 4,
            max_range_nm: None,
            receiver_position: None,
            heartbeat_interval_ms: 60_000,
            net_connector_delay_ms: 30_000,
            expire_after_minutes: 10,
            snapshot_dir: None,
            snapshot_interval_ms: 1_000,
            verbose: false,
            json_log_path: None,
        }
    }
}
