//! FATSV output (§6): tab-separated key/value pairs, one aircraft update
//! per line, newline-terminated, always carrying a leading `_v`/`clock`
//! pair so a consumer can tell format version and receiver clock apart
//! from payload fields.

use tracker1090::track::AircraftTrack;

const FORMAT_VERSION: u8 = 2;

/// Builds one FATSV line for the fields that changed since the last
/// emission, mirroring the tab-separated `key\tvalue` convention.
pub fn encode(track: &AircraftTrack, now_ms: u64) -> String {
    let mut out = format!("_v\t{FORMAT_VERSION}\tclock\t{now_ms}\thexid\t{:06X}", track.address);

    if let Some(cs) = &track.callsign {
        out.push_str(&format!("\tident\t{}", cs.trim()));
    }
    if let Some(squawk) = track.squawk {
        out.push_str(&format!("\tsquawk\t{squawk:04o}"));
    }
    if let Some(alt) = track.altitude_baro {
        out.push_str(&format!("\talt\t{:.0}", alt));
    }
    if let Some((lat, lon)) = track.position {
        out.push_str(&format!("\tlat\t{lat:.5}\tlon\t{lon:.5}"));
    }
    if let Some(gs) = track.ground_speed {
        out.push_str(&format!("\tspeed\t{gs:.0}"));
    }
    if let Some(track_deg) = track.track {
        out.push_str(&format!("\theading\t{track_deg:.0}"));
    }
    if let Some(vr) = track.vertical_rate_baro {
        out.push_str(&format!("\tvrate\t{vr}"));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mode_s_core::message::AddressType;
    use tracker1090::TrackerConfig;

    #[test]
    fn encodes_the_version_and_clock_header_fields() {
        let t = AircraftTrack::new(0x4840D6, AddressType::AdsbIcao, 0, &TrackerConfig::default());
        let line = encode(&t, 1000);
        assert!(line.starts_with("_v\t2\tclock\t1000\thexid\t4840D6"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn includes_altitude_when_present() {
        let mut t = AircraftTrack::new(0x4840D6, AddressType::AdsbIcao, 0, &TrackerConfig::default());
        t.altitude_baro = Some(38000.0);
        let line = encode(&t, 0);
        assert!(line.contains("\talt\t38000"));
    }
}
