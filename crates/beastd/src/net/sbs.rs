//! SBS/BaseStation CSV framing (§6): 22 comma-separated fields; only
//! `MSG,3,…` rows (airborne position) with a 6-hex-digit ICAO are consumed
//! as input. Output rows are written in the same 22-field shape.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct Msg3 {
    pub icao: u32,
    pub altitude_ft: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Parses one `MSG,3,…` row. Any other transmission type, or a hex ident
/// that isn't exactly 6 hex digits, is ignored.
pub fn parse_msg3(line: &str) -> Option<Msg3> {
    let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();
    if fields.len() < 16 || fields[0] != "MSG" || fields[1] != "3" {
        return None;
    }
    let hex_ident = fields[4];
    if hex_ident.len() != 6 || !hex_ident.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let icao = u32::from_str_radix(hex_ident, 16).ok()?;
    let altitude_ft = fields.get(11).and_then(|s| s.parse().ok());
    let latitude = fields.get(14).and_then(|s| s.parse().ok());
    let longitude = fields.get(15).and_then(|s| s.parse().ok());
    Some(Msg3 { icao, altitude_ft, latitude, longitude })
}

/// Builds a `MSG,3` row for one position update, timestamped `now`.
#[allow(clippy::too_many_arguments)]
pub fn encode_msg3(
    icao: u32,
    callsign: Option<&str>,
    altitude_ft: Option<i32>,
    ground_speed: Option<f64>,
    track: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    vertical_rate: Option<i32>,
    squawk: Option<u16>,
    on_ground: bool,
    now: DateTime<Utc>,
) -> String {
    let date = now.format("%Y/%m/%d");
    let time = now.format("%H:%M:%S%.3f");
    let field = |v: Option<String>| v.unwrap_or_default();
    format!(
        "MSG,3,1,1,{icao:06X},1,{date},{time},{date},{time},{},{},{},{},{},{},{},{},,,,{}\n",
        field(callsign.map(|s| s.to_string())),
        field(altitude_ft.map(|v| v.to_string())),
        field(ground_speed.map(|v| v.to_string())),
        field(track.map(|v| v.to_string())),
        field(latitude.map(|v| v.to_string())),
        field(longitude.map(|v| v.to_string())),
        field(vertical_rate.map(|v| v.to_string())),
        field(squawk.map(|v| v.to_string())),
        if on_ground { "-1" } else { "0" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_msg3_row() {
        let row = "MSG,3,1,1,4840D6,1,2024/01/01,00:00:00.000,2024/01/01,00:00:00.000,,38000,,,51.5,0.1,,,,,,0";
        let m = parse_msg3(row).unwrap();
        assert_eq!(m.icao, 0x4840D6);
        assert_eq!(m.altitude_ft, Some(38000));
        assert_eq!(m.latitude, Some(51.5));
    }

    #[test]
    fn rejects_non_msg3_rows() {
        assert!(parse_msg3("MSG,4,1,1,4840D6,1,,,,,,,,,,,,,,,,").is_none());
        assert!(parse_msg3("MSG,3,1,1,ZZZZZZ,1,,,,,,,,,,,,,,,,").is_none());
    }
}
