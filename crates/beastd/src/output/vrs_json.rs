//! VRS JSON output (§6): the short-key aircraft-list format consumed by
//! Virtual Radar Server clients.

use serde::Serialize;
use tracker1090::track::AircraftTrack;

#[derive(Debug, Serialize)]
pub struct VrsAircraft {
    #[serde(rename = "Id")]
    pub id: u32,
    #[serde(rename = "Icao")]
    pub icao: String,
    #[serde(rename = "Call", skip_serializing_if = "Option::is_none")]
    pub call: Option<String>,
    #[serde(rename = "Alt", skip_serializing_if = "Option::is_none")]
    pub alt: Option<i32>,
    #[serde(rename = "Lat", skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(rename = "Long", skip_serializing_if = "Option::is_none")]
    pub long: Option<f64>,
    #[serde(rename = "Spd", skip_serializing_if = "Option::is_none")]
    pub spd: Option<f64>,
    #[serde(rename = "Trak", skip_serializing_if = "Option::is_none")]
    pub trak: Option<f64>,
    #[serde(rename = "Vsi", skip_serializing_if = "Option::is_none")]
    pub vsi: Option<i32>,
    #[serde(rename = "Sqk", skip_serializing_if = "Option::is_none")]
    pub sqk: Option<String>,
    #[serde(rename = "Gnd")]
    pub gnd: bool,
}

#[derive(Debug, Serialize)]
pub struct VrsResponse {
    #[serde(rename = "acList")]
    pub ac_list: Vec<VrsAircraft>,
    #[serde(rename = "totalAc")]
    pub total_ac: usize,
    pub src: u8,
    #[serde(rename = "showSil")]
    pub show_sil: bool,
}

impl From<&AircraftTrack> for VrsAircraft {
    fn from(t: &AircraftTrack) -> Self {
        VrsAircraft {
            id: t.address,
            icao: format!("{:06X}", t.address),
            call: t.callsign.as_ref().map(|s| s.trim().to_string()),
            alt: t.altitude_baro.map(|v| v.round() as i32),
            lat: t.position.map(|(lat, _)| lat),
            long: t.position.map(|(_, lon)| lon),
            spd: t.ground_speed,
            trak: t.track,
            vsi: t.vertical_rate_baro,
            sqk: t.squawk.map(|s| format!("{s:04o}")),
            gnd: t.air_ground == mode_s_core::message::AirGround::Ground,
        }
    }
}

pub fn encode_response<'a>(tracks: impl Iterator<Item = &'a AircraftTrack>) -> VrsResponse {
    let ac_list: Vec<VrsAircraft> = tracks.map(VrsAircraft::from).collect();
    VrsResponse { total_ac: ac_list.len(), ac_list, src: 1, show_sil: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mode_s_core::message::AddressType;
    use tracker1090::TrackerConfig;

    #[test]
    fn renders_the_hex_icao_with_uppercase_zero_padding() {
        let t = AircraftTrack::new(0x4D, AddressType::AdsbIcao, 0, &TrackerConfig::default());
        let ac = VrsAircraft::from(&t);
        assert_eq!(ac.icao, "00004D");
    }
}
