//! Command-line surface (§A.3): builds a [`crate::config::Config`] once at
//! startup from a small `clap`-derived set of flags.

use crate::config::{Config, ServiceSpec};
use crate::net::{Connector, Protocol};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "beastd", version, about = "Decode and re-serve Mode S / ADS-B / TIS-B traffic")]
pub struct Options {
    /// TCP port to listen on for Beast-binary input (feeders connect here).
    #[arg(long)]
    pub beast_in_port: Option<u16>,
    /// TCP port to serve Beast-binary output on.
    #[arg(long)]
    pub beast_out_port: Option<u16>,
    /// TCP port to serve reduced (rate-limited) Beast-binary output on.
    #[arg(long)]
    pub beast_reduce_out_port: Option<u16>,
    /// TCP port to listen on for raw/AVR ASCII input.
    #[arg(long)]
    pub raw_in_port: Option<u16>,
    /// TCP port to serve raw/AVR ASCII output on.
    #[arg(long)]
    pub raw_out_port: Option<u16>,
    /// TCP port to listen on for SBS/BaseStation input.
    #[arg(long)]
    pub sbs_in_port: Option<u16>,
    /// TCP port to serve SBS/BaseStation output on.
    #[arg(long)]
    pub sbs_out_port: Option<u16>,
    /// TCP port to serve the VRS JSON aircraft list on.
    #[arg(long)]
    pub vrs_out_port: Option<u16>,

    /// Outbound connector, `protocol@host:port`, e.g. `beast_out@collector.example.com:30005`.
    #[arg(long = "connect", value_parser = parse_connector)]
    pub connectors: Vec<(Protocol, Connector)>,

    /// Maximum bit corrections the decoder will attempt on a frame.
    #[arg(long, default_value = "1")]
    pub nfix_crc: u8,
    /// Cap on the position-reliability counters.
    #[arg(long, default_value = "4")]
    pub filter_persistence: u8,
    /// Discard positions implying travel further than this many NM.
    #[arg(long)]
    pub max_range_nm: Option<f64>,
    /// Receiver antenna position as `lat,lon`.
    #[arg(long, value_parser = parse_latlon)]
    pub receiver_position: Option<(f64, f64)>,

    #[arg(long, default_value = "60000")]
    pub heartbeat_interval_ms: u64,
    #[arg(long, default_value = "30000")]
    pub net_connector_delay_ms: u64,
    #[arg(long, short = 'x', default_value = "10")]
    pub expire_after_minutes: u64,

    /// Directory to write aircraft.json/stats.json/receiver.json/history_N.json into.
    #[arg(long)]
    pub snapshot_dir: Option<String>,
    #[arg(long, default_value = "1000")]
    pub snapshot_interval_ms: u64,

    /// Log decoded frames as JSON lines to stdout.
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
    /// Dump a copy of received messages as .jsonl.
    #[arg(short, long)]
    pub output: Option<String>,
}

fn parse_connector(s: &str) -> Result<(Protocol, Connector), String> {
    let (proto, rest) = s.split_once('@').ok_or("expected protocol@host:port")?;
    let protocol = match proto {
        "beast_in" => Protocol::BeastIn,
        "beast_out" => Protocol::BeastOut,
        "beast_reduce_out" => Protocol::BeastReduceOut,
        "raw_in" => Protocol::RawIn,
        "raw_out" => Protocol::RawOut,
        "sbs_in" => Protocol::SbsIn,
        "sbs_out" => Protocol::SbsOut,
        "vrs_out" => Protocol::VrsOut,
        other => return Err(format!("unknown protocol {other}")),
    };
    let connector: Connector = rest.parse()?;
    Ok((protocol, connector))
}

fn parse_latlon(s: &str) -> Result<(f64, f64), String> {
    let (lat, lon) = s.split_once(',').ok_or("expected lat,lon")?;
    Ok((lat.parse().map_err(|_| "bad latitude")?, lon.parse().map_err(|_| "bad longitude")?))
}

impl From<Options> for Config {
    fn from(o: Options) -> Self {
        let mut services = Vec::new();
        let mut push = |protocol: Protocol, listen_port: Option<u16>| {
            if listen_port.is_some() {
                services.push(ServiceSpec { protocol, listen_port, connect_to: None });
            }
        };
        push(Protocol::BeastIn, o.beast_in_port);
        push(Protocol::BeastOut, o.beast_out_port);
        push(Protocol::BeastReduceOut, o.beast_reduce_out_port);
        push(Protocol::RawIn, o.raw_in_port);
        push(Protocol::RawOut, o.raw_out_port);
        push(Protocol::SbsIn, o.sbs_in_port);
        push(Protocol::SbsOut, o.sbs_out_port);
        push(Protocol::VrsOut, o.vrs_out_port);
        for (protocol, connector) in o.connectors {
            services.push(ServiceSpec { protocol, listen_port: None, connect_to: Some(connector) });
        }

        Config {
            services,
            nfix_crc: o.nfix_crc,
            filter_persistence: o.filter_persistence,
            max_range_nm: o.max_range_nm,
            receiver_position: o.receiver_position,
            heartbeat_interval_ms: o.heartbeat_interval_ms,
            net_connector_delay_ms: o.net_connector_delay_ms,
            expire_after_minutes: o.expire_after_minutes,
            snapshot_dir: o.snapshot_dir,
            snapshot_interval_ms: o.snapshot_interval_ms,
            verbose: o.verbose,
            json_log_path: o.output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_outbound_connector_flag() {
        let (protocol, connector) = parse_connector("beast_out@collector.example.com:30005").unwrap();
        assert_eq!(protocol, Protocol::BeastOut);
        assert_eq!(connector.host, "collector.example.com");
        assert_eq!(connector.port, 30005);
    }

    #[test]
    fn rejects_an_unknown_protocol_name() {
        assert!(parse_connector("telnet@host:23").is_err());
    }
}
