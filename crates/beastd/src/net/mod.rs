//! Connection mux: input framers, output framers, and the client registry
//! that fans decoded traffic back out (§6, §9 "Cyclic graphs").

pub mod beast;
pub mod mux;
pub mod raw;
pub mod sbs;

use std::fmt;
use std::str::FromStr;
use url::Url;

/// The eight wire protocols §6 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    BeastIn,
    BeastOut,
    BeastReduceOut,
    RawIn,
    RawOut,
    SbsIn,
    SbsOut,
    VrsOut,
}

impl Protocol {
    pub fn is_input(self) -> bool {
        matches!(self, Protocol::BeastIn | Protocol::RawIn | Protocol::SbsIn)
    }

    /// The keepalive frame written on this protocol after a silent
    /// heartbeat interval (§6 "Heartbeats").
    pub fn heartbeat(self) -> Vec<u8> {
        match self {
            Protocol::BeastOut | Protocol::BeastReduceOut => beast::heartbeat_frame(),
            Protocol::RawOut => b"*0000;\n".to_vec(),
            Protocol::SbsOut => b"\r\n".to_vec(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::BeastIn => "beast_in",
            Protocol::BeastOut => "beast_out",
            Protocol::BeastReduceOut => "beast_reduce_out",
            Protocol::RawIn => "raw_in",
            Protocol::RawOut => "raw_out",
            Protocol::SbsIn => "sbs_in",
            Protocol::SbsOut => "sbs_out",
            Protocol::VrsOut => "vrs_out",
        };
        write!(f, "{s}")
    }
}

/// An outbound connector: a remote `host:port` this process dials instead
/// of listening on, for one protocol (§6 "Outbound connectors"). Parsed
/// from `proto@host:port`, mirroring the corpus's `tcp://host:port` style
/// URL parsing for feed sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub host: String,
    pub port: u16,
}

impl FromStr for Connector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let default_tcp = Url::parse("tcp://").unwrap();
        let url = default_tcp.join(s).map_err(|e| e.to_string())?;
        let host = url.host_str().ok_or("missing host")?.to_string();
        let port = url.port().ok_or("missing port")?;
        Ok(Connector { host, port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_parses_host_and_port() {
        let c: Connector = "feed.example.com:30005".parse().unwrap();
        assert_eq!(c.host, "feed.example.com");
        assert_eq!(c.port, 30005);
    }

    #[test]
    fn protocol_display_matches_the_configuration_name() {
        assert_eq!(Protocol::BeastReduceOut.to_string(), "beast_reduce_out");
    }
}
