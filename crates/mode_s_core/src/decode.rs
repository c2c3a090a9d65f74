//! Frame decoder: turns 7 or 14 raw bytes into a [`DownlinkMessage`] (§4.3).
//!
//! The decoder never keeps state across calls beyond what the caller hands
//! it (a `&mut AddressFilter`); everything else is session state that lives
//! in the tracker.

use crate::bits::{extract, extract_bit};
use crate::crc;
use crate::filter::AddressFilter;
use crate::message::{
    AddressType, AirGround, Altitude, AltitudeUnit, CprHalf, DownlinkMessage, GroundSpeed,
    HeadingKind, NavigationIntent, Provenance, Validity,
};
use crate::modeac;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// CRC could not be validated and the frame carries no address we can
    /// use as an anchor.
    UnknownIcao,
    /// Structural failure or an uncorrectable error.
    Bad,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnknownIcao => write!(f, "address not in filter, cannot validate"),
            DecodeError::Bad => write!(f, "bad frame"),
        }
    }
}

impl std::error::Error for DecodeError {}

const CHAR_LOOKUP: &[u8; 64] =
    b"#ABCDEFGHIJKLMNOPQRSTUVWXYZ##### ###############0123456789######";

fn df_length(df: u8) -> usize {
    if df & 0x10 != 0 { 112 } else { 56 }
}

/// Decodes one Mode S frame. `filter` is consulted (and, for newly-proven
/// addresses, updated by the caller — see the tracker's acceptance path)
/// to validate CRC-overlay formats.
pub fn decode_frame(
    raw: &[u8],
    filter: &AddressFilter,
    signal_level: f64,
    timestamp_12mhz: u64,
    timestamp_ms: u64,
    max_weight: u8,
) -> Result<DownlinkMessage, DecodeError> {
    match decode_frame_inner(raw, filter, signal_level, timestamp_12mhz, timestamp_ms, max_weight) {
        Ok(m) => Ok(m),
        Err(e) => {
            tracing::trace!(df = extract(raw, 1, 5), reason = %e, "frame dropped");
            Err(e)
        }
    }
}

fn decode_frame_inner(
    raw: &[u8],
    filter: &AddressFilter,
    signal_level: f64,
    timestamp_12mhz: u64,
    timestamp_ms: u64,
    max_weight: u8,
) -> Result<DownlinkMessage, DecodeError> {
    if raw.iter().all(|&b| b == 0) || raw.len() < 7 {
        return Err(DecodeError::Bad);
    }

    let df = extract(raw, 1, 5) as u8;
    let nbits = df_length(df);
    let msg = &raw[..nbits / 8];

    let mut corrected = msg.to_vec();
    let mut bits_corrected = 0u8;
    let syndrome = crc::checksum(msg, nbits);

    let (address, provenance) = match df {
        0 | 4 | 5 | 16 | 20 | 21 => {
            let addr = syndrome & 0x00ff_ffff;
            if !filter.test(addr) {
                return Err(DecodeError::UnknownIcao);
            }
            (addr, Provenance::ModeSUnchecked)
        }
        11 => {
            let masked = syndrome & 0xffff_ff80;
            if masked == 0 {
                let addr = extract(msg, 9, 32);
                (addr, Provenance::ModeSChecked)
            } else {
                let err = crc::diagnose(masked, nbits, 1).ok_or(DecodeError::Bad)?;
                if err.bit_positions.len() > 1 {
                    return Err(DecodeError::Bad);
                }
                for &bit in &err.bit_positions {
                    crate::bits::flip_bit(&mut corrected, bit);
                    bits_corrected += 1;
                }
                let addr = extract(&corrected, 9, 32);
                if !filter.test(addr) {
                    return Err(DecodeError::UnknownIcao);
                }
                (addr, Provenance::ModeSChecked)
            }
        }
        17 | 18 => {
            if syndrome != 0 {
                let err = crc::diagnose(syndrome, nbits, max_weight).ok_or(DecodeError::Bad)?;
                for &bit in &err.bit_positions {
                    crate::bits::flip_bit(&mut corrected, bit);
                    bits_corrected += 1;
                }
                if crc::checksum(&corrected, nbits) != 0 {
                    return Err(DecodeError::Bad);
                }
            }
            let addr = extract(&corrected, 9, 32);
            let provenance = if df == 17 { Provenance::AdsB } else { Provenance::TisB };
            (addr, provenance)
        }
        24..=31 => {
            let addr = syndrome & 0x00ff_ffff;
            if !filter.test(addr) {
                return Err(DecodeError::UnknownIcao);
            }
            (addr, Provenance::ModeSUnchecked)
        }
        _ => return Err(DecodeError::Bad),
    };

    let address_type = if df == 18 { AddressType::TisbIcao } else { AddressType::AdsbIcao };

    let mut m = DownlinkMessage::bare(
        raw.to_vec(),
        df,
        nbits,
        syndrome,
        address,
        address_type,
        provenance,
        signal_level,
        timestamp_12mhz,
        timestamp_ms,
    );
    m.raw_corrected = corrected.clone();
    m.bits_corrected = bits_corrected;

    match df {
        0 => {
            m.air_ground = if extract_bit(&corrected, 6) == 1 { AirGround::Ground } else { AirGround::Airborne };
            decode_ac13(&corrected, 20, 32, &mut m);
        }
        4 | 20 => {
            decode_ac13(&corrected, 20, 32, &mut m);
        }
        5 | 21 => {
            let id13 = extract(&corrected, 20, 32) as u16;
            m.squawk = Some(modeac::decode_squawk(id13));
            m.validity |= Validity::SQUAWK;
        }
        17 | 18 => decode_extended_squitter(&corrected, df, &mut m),
        _ => {}
    }

    Ok(m)
}

/// Decodes the "is-it-metres / Q-bit / Gillham" 13-bit AC field shared by
/// DF0/4/5/16/20/21 (§4.3 step 10).
fn decode_ac13(msg: &[u8], first: usize, last: usize, m: &mut DownlinkMessage) {
    let field = extract(msg, first, last) as u16;
    if field & 0x0040 != 0 {
        // M bit set: metres, not further decoded here.
        m.altitude_baro = Some(Altitude { value: 0.0, unit: AltitudeUnit::Metres });
        return;
    }
    if field & 0x0010 != 0 {
        let n = ((field & 0x1f80) >> 2) | ((field & 0x0020) >> 1) | (field & 0x000f);
        let ft = n as f64 * 25.0 - 1000.0;
        m.altitude_baro = Some(Altitude { value: ft, unit: AltitudeUnit::Feet });
        m.validity |= Validity::ALTITUDE_BARO;
        return;
    }
    let mode_a = modeac::id13_to_gillham(field);
    if let Some(ft) = modeac::mode_c_to_altitude(mode_a) {
        m.altitude_baro = Some(Altitude { value: ft as f64, unit: AltitudeUnit::Feet });
        m.validity |= Validity::ALTITUDE_BARO;
    }
}

/// Decodes the 12-bit AC field used by DF17/18 airborne-position ME types
/// (§4.3 step 11): identical to the 13-bit case but with an implicit M=0.
fn decode_ac12(field: u16) -> Option<f64> {
    if field & 0x0010 != 0 {
        let n = ((field & 0x0fe0) >> 1) | (field & 0x000f);
        if n == 0 {
            return None;
        }
        return Some(n as f64 * 25.0 - 1000.0);
    }
    let mode_a = modeac::id13_to_gillham(((field & 0x0fc0) << 1) | (field & 0x003f));
    modeac::mode_c_to_altitude(mode_a).map(|ft| ft as f64)
}

fn decode_extended_squitter(msg: &[u8], df: u8, m: &mut DownlinkMessage) {
    let ca_or_cf = extract(msg, 6, 8) as u8;
    let tc = extract(msg, 33, 37) as u8;

    if df == 18 {
        apply_cf(ca_or_cf, m);
    }

    match tc {
        1..=4 => decode_ident(msg, m),
        5..=8 => decode_surface_position(msg, tc, m),
        0 | 9..=18 | 20..=22 => decode_airborne_position(msg, tc, m),
        19 => decode_velocity(msg, m),
        23 => decode_test_message(msg, m),
        28 => decode_aircraft_status(msg, m),
        29 => decode_target_state(msg, m),
        31 => decode_operational_status(msg, m),
        _ => {}
    }

    if df == 18 {
        if let Some(imf_bit) = imf_bit_position(tc) {
            if extract_bit(msg, imf_bit) == 1 {
                m.address_type = m.address_type.apply_imf();
            }
        }
    }
}

/// Overall-frame bit position (1-indexed) of the IMF flag, by ME type
/// bucket (§4.3 step 7). Position and surface messages carry it right
/// before the CPR parity bit; status messages carry it in their last ME
/// byte. Types that don't carry an IMF bit return `None`.
fn imf_bit_position(tc: u8) -> Option<usize> {
    match tc {
        5..=8 | 9..=18 | 20..=22 => Some(53),
        28 | 31 => Some(83),
        _ => None,
    }
}

/// DF18's CF field selects among ADS-B-non-transponder, non-ICAO ADS-B,
/// fine/coarse TIS-B, non-ICAO TIS-B, and ADS-R (§4.3 step 8).
fn apply_cf(cf: u8, m: &mut DownlinkMessage) {
    match cf {
        0 => {
            m.address_type = AddressType::AdsbIcao;
            m.provenance = Provenance::AdsB;
        }
        1 => {
            m.address_type = AddressType::AdsbOther;
            m.provenance = Provenance::AdsB;
        }
        2 => {
            m.address_type = AddressType::TisbIcao;
            m.provenance = Provenance::TisB;
        }
        3 => {
            // Coarse TIS-B: only the IMF bit is meaningful to us here.
            m.address_type = AddressType::TisbOther;
            m.provenance = Provenance::TisB;
        }
        5 => {
            m.address_type = AddressType::TisbOther;
            m.provenance = Provenance::TisB;
        }
        6 => {
            m.address_type = AddressType::AdsrIcao;
            m.provenance = Provenance::AdsR;
        }
        _ => {}
    }
}

fn decode_ident(msg: &[u8], m: &mut DownlinkMessage) {
    let ca = extract(msg, 38, 40) as u8;
    m.category = Some(ca);
    m.validity |= Validity::CATEGORY;

    let mut chars = Vec::with_capacity(8);
    for i in 0..8 {
        let first_bit = 41 + i * 6;
        let c = extract(msg, first_bit, first_bit + 5) as usize;
        if c != 32 {
            chars.push(CHAR_LOOKUP[c] as char);
        }
    }
    m.callsign = Some(chars.into_iter().collect());
    m.validity |= Validity::CALLSIGN;
}

fn decode_surface_position(msg: &[u8], tc: u8, m: &mut DownlinkMessage) {
    m.air_ground = AirGround::Ground;
    let mov = extract(msg, 38, 44) as u8;
    let gs = match mov {
        0 | 125..=127 => None,
        1 => Some(0.0),
        2..=8 => Some(0.125 + (mov - 2) as f64 * 0.125),
        9..=12 => Some(1.0 + (mov - 9) as f64 * 0.25),
        13..=38 => Some(2.0 + (mov - 13) as f64 * 0.5),
        39..=93 => Some(15.0 + (mov - 39) as f64 * 1.0),
        94..=108 => Some(70.0 + (mov - 94) as f64 * 2.0),
        109..=123 => Some(100.0 + (mov - 109) as f64 * 5.0),
        124 => Some(180.0),
        _ => None,
    };
    if let Some(v) = gs {
        m.ground_speed = Some(GroundSpeed { v0: Some(v), v2: Some(v), selected: Some(v) });
        m.validity |= Validity::GROUND_SPEED;
    }

    let track_status = extract_bit(msg, 45) == 1;
    if track_status {
        let trk = extract(msg, 46, 52) as f64 * 360.0 / 128.0;
        m.heading = Some((trk, HeadingKind::Track));
        m.validity |= Validity::HEADING;
    }

    let odd = extract_bit(msg, 54) == 1;
    m.cpr = Some(CprHalf {
        odd,
        lat: extract(msg, 55, 71),
        lon: extract(msg, 72, 88),
        nic: None,
        rc_metres: None,
        me_type: tc,
    });
    m.validity |= Validity::CPR;
}

fn decode_airborne_position(msg: &[u8], tc: u8, m: &mut DownlinkMessage) {
    m.air_ground = AirGround::Airborne;
    let ac12 = extract(msg, 41, 52) as u16;
    let unit = if tc >= 20 { AltitudeUnit::Feet } else { AltitudeUnit::Feet };
    if let Some(ft) = decode_ac12(ac12) {
        let alt = Altitude { value: ft, unit };
        if tc >= 20 {
            m.altitude_geom = Some(alt);
            m.validity |= Validity::ALTITUDE_GEOM;
        } else {
            m.altitude_baro = Some(alt);
            m.validity |= Validity::ALTITUDE_BARO;
        }
    }

    let odd = extract_bit(msg, 54) == 1;
    m.cpr = Some(CprHalf {
        odd,
        lat: extract(msg, 55, 71),
        lon: extract(msg, 72, 88),
        nic: None,
        rc_metres: None,
        me_type: tc,
    });
    m.validity |= Validity::CPR;
}

fn decode_velocity(msg: &[u8], m: &mut DownlinkMessage) {
    let subtype = extract(msg, 38, 40) as u8;
    let vrate_sign: f64 = if extract_bit(msg, 69) == 1 { -1.0 } else { 1.0 };
    let vrate_raw = extract(msg, 70, 78);
    if vrate_raw != 0 {
        m.vertical_rate_baro = Some((vrate_sign * (vrate_raw as i64 - 1) as f64 * 64.0) as i32);
        m.validity |= Validity::VERTICAL_RATE;
    }

    match subtype {
        1 | 2 => {
            let multiplier = if subtype == 2 { 4.0 } else { 1.0 };
            let ew_sign: f64 = if extract_bit(msg, 46) == 1 { -1.0 } else { 1.0 };
            let ew_vel = ew_sign * (extract(msg, 47, 56) as i64 - 1) as f64 * multiplier;
            let ns_sign: f64 = if extract_bit(msg, 57) == 1 { -1.0 } else { 1.0 };
            let ns_vel = ns_sign * (extract(msg, 58, 67) as i64 - 1) as f64 * multiplier;
            let gs = ew_vel.hypot(ns_vel);
            let mut track = ew_vel.atan2(ns_vel).to_degrees();
            if track < 0.0 {
                track += 360.0;
            }
            m.ground_speed = Some(GroundSpeed { v0: Some(gs), v2: Some(gs), selected: Some(gs) });
            m.heading = Some((track, HeadingKind::Track));
            m.validity |= Validity::GROUND_SPEED | Validity::HEADING;
        }
        3 | 4 => {
            let multiplier = if subtype == 4 { 4.0 } else { 1.0 };
            let heading_status = extract_bit(msg, 46) == 1;
            if heading_status {
                let heading = extract(msg, 47, 56) as f64 * 360.0 / 1024.0;
                m.heading = Some((heading, HeadingKind::MagneticHeading));
                m.validity |= Validity::HEADING;
            }
            let airspeed_raw = extract(msg, 58, 67);
            if airspeed_raw != 0 {
                let speed = (airspeed_raw as f64 - 1.0) * multiplier;
                if extract_bit(msg, 57) == 1 {
                    m.true_airspeed = Some(speed);
                } else {
                    m.indicated_airspeed = Some(speed);
                }
                m.validity |= Validity::AIRSPEED;
            }
        }
        _ => {}
    }

    let gnss_sign: f64 = if extract_bit(msg, 80) == 1 { -1.0 } else { 1.0 };
    let gnss_diff = extract(msg, 81, 87);
    if gnss_diff > 1 {
        let delta = gnss_sign * (gnss_diff as f64 - 1.0) * 25.0;
        m.geom_delta = Some(delta as i32);
        m.validity |= Validity::GEOM_DELTA;
    }
}

fn decode_test_message(msg: &[u8], m: &mut DownlinkMessage) {
    let subtype = extract(msg, 38, 40) as u8;
    if subtype == 7 {
        let id13 = extract(msg, 41, 53) as u16;
        m.squawk = Some(modeac::decode_squawk(id13));
        m.validity |= Validity::SQUAWK;
    }
}

fn decode_aircraft_status(msg: &[u8], m: &mut DownlinkMessage) {
    let subtype = extract(msg, 38, 40) as u8;
    if subtype == 1 {
        m.emergency = Some(extract(msg, 41, 43) as u8);
        m.validity |= Validity::EMERGENCY;
        let id13 = extract(msg, 44, 56) as u16;
        m.squawk = Some(modeac::decode_squawk(id13));
        m.validity |= Validity::SQUAWK;
    }
}

fn decode_target_state(msg: &[u8], m: &mut DownlinkMessage) {
    let subtype = extract_bit(msg, 38);
    let mut intent = NavigationIntent::default();
    if subtype == 0 {
        let altitude_type = extract_bit(msg, 39);
        let mcp_raw = extract(msg, 40, 50);
        if mcp_raw > 0 {
            let ft = (mcp_raw as u32 - 1) * 16;
            if altitude_type == 0 {
                intent.mcp_altitude = Some(ft);
            } else {
                intent.fms_altitude = Some(ft);
            }
        }
        let qnh_raw = extract(msg, 54, 62);
        if qnh_raw > 0 {
            intent.qnh = Some(800.0 + (qnh_raw as f64 - 1.0) * 0.8);
        }
        intent.nav_modes = extract(msg, 70, 73) as u16;
    } else {
        let heading_status = extract_bit(msg, 46);
        if heading_status == 1 {
            intent.selected_heading = Some(extract(msg, 47, 55) as f64 * 180.0 / 256.0);
        }
        intent.nav_modes = extract(msg, 93, 96) as u16;
    }
    m.nav_intent = Some(intent);
    m.validity |= Validity::NAV_INTENT;
}

fn decode_operational_status(msg: &[u8], m: &mut DownlinkMessage) {
    let subtype = extract(msg, 38, 40) as u8;
    let version = extract(msg, 73, 75) as i8;
    m.adsb_version = Some(version);
    // The NACp/SIL subfield only exists at these bit offsets from version 1
    // onward; a genuine version-0 operational-status message carries
    // nothing there, so the tracker synthesises them from the position
    // message's ME type instead (§4.6 "ADS-B version learning").
    if subtype <= 2 && version != 0 {
        m.integrity.nacp = Some(extract(msg, 89, 92) as u8);
        m.integrity.sil = Some(extract(msg, 106, 107) as u8);
        m.integrity.sil_type_is_per_hour = extract_bit(msg, 109) == 1;
        m.integrity.nic_baro = Some(extract_bit(msg, 108));
        m.validity |= Validity::INTEGRITY;
    }
    if subtype == 0 {
        m.heading_is_true = Some(extract_bit(msg, 110) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    fn filter_with(addr: u32) -> AddressFilter {
        let mut f = AddressFilter::new();
        f.add(addr);
        f
    }

    #[test]
    fn df17_ident_decodes_callsign_and_category() {
        let raw = hex!("8D4840D6202CC371C32CE0576098");
        let f = AddressFilter::new();
        let m = decode_frame(&raw, &f, 1.0, 0, 0, 1).expect("clean DF17 decodes");
        assert_eq!(m.df, 17);
        assert_eq!(m.address, 0x4840D6);
        assert!(m.callsign.as_deref().unwrap().starts_with("KL"));
    }

    #[test]
    fn df17_airborne_position_even_decodes_altitude_and_cpr() {
        let raw = hex!("8D40621D58C382D690C8AC2863A7");
        let f = AddressFilter::new();
        let m = decode_frame(&raw, &f, 1.0, 0, 0, 1).expect("clean DF17 decodes");
        assert_eq!(m.address, 0x40621D);
        let cpr = m.cpr.expect("position message carries a CPR half");
        assert!(!cpr.odd);
        assert_eq!(cpr.lat, 93000);
        assert_eq!(cpr.lon, 51372);
        assert_eq!(m.altitude_baro.map(|a| a.value), Some(38000.0));
    }

    #[test]
    fn df17_velocity_subtype1_decodes_ground_speed_and_track() {
        let raw = hex!("8D485020994409940838175B284F");
        let f = AddressFilter::new();
        let m = decode_frame(&raw, &f, 1.0, 0, 0, 1).expect("clean DF17 decodes");
        let gs = m.ground_speed.and_then(|g| g.selected).unwrap();
        assert!((gs - 159.0).abs() < 1.0, "gs was {gs}");
        let (track, _) = m.heading.unwrap();
        assert!((track - 183.0).abs() < 1.0, "track was {track}");
        assert_eq!(m.vertical_rate_baro, Some(-832));
    }

    #[test]
    fn df11_all_call_clean_extracts_address() {
        let raw = hex!("5D4CA2519034D0");
        let f = filter_with(0x4CA251);
        let m = decode_frame(&raw, &f, 1.0, 0, 0, 1).expect("IID=0 clean DF11 decodes");
        assert_eq!(m.df, 11);
        assert_eq!(m.address, 0x4CA251);
    }

    #[test]
    fn unknown_address_on_overlay_format_is_rejected() {
        let f = AddressFilter::new();
        let raw = [0x20u8, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode_frame(&raw, &f, 1.0, 0, 0, 1), Err(DecodeError::UnknownIcao));
    }

    #[test]
    fn all_zero_payload_is_rejected() {
        let f = AddressFilter::new();
        let raw = [0u8; 7];
        assert_eq!(decode_frame(&raw, &f, 1.0, 0, 0, 1), Err(DecodeError::Bad));
    }
}
