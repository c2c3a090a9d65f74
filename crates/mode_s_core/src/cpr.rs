//! Compact Position Reporting (CPR) decode (§4.5).
//!
//! Two independent position messages ("even" and "odd") encode a
//! latitude/longitude pair at higher resolution than either carries alone.
//! [`global_decode`] needs one of each; [`local_decode`] needs only one,
//! given a reference position known to be within half a latitude zone.
//!
//! Airborne and surface positions share the same math up to the angular
//! span of a zone: 360° for airborne, 90° for surface (the surface encoding
//! reuses the low bits of a quarter of the globe). That's the only
//! difference the teacher's separate airborne/surface functions had, so
//! here it is a single [`Kind`] parameter instead of four near-duplicate
//! functions.

/// One raw 17-bit CPR sample as transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CprFrame {
    pub odd: bool,
    pub lat: u32,
    pub lon: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Airborne,
    Surface,
}

impl Kind {
    fn span(self) -> f64 {
        match self {
            Kind::Airborne => 360.0,
            Kind::Surface => 90.0,
        }
    }
}

const CPR_MAX: f64 = 131_072.0; // 2^17
const NZ: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlobalOutcome {
    Position(f64, f64),
    /// The even/odd pair straddles a latitude-zone boundary; caller should
    /// fall back to local decoding instead of trusting this result.
    Ambiguous,
    /// Decoded latitude fell outside [-90, 90] — structurally broken input.
    OutOfRange,
}

fn modulo(a: f64, b: f64) -> f64 {
    if a >= 0.0 {
        a % b
    } else {
        a % b + b.abs()
    }
}

/// Number of longitude zones (1..=59) at a given latitude, from the
/// precomputed breakpoints of ICAO Annex 10 / 1090-WP-9-14.
#[rustfmt::skip]
fn nl(lat: f64) -> u64 {
    let lat = lat.abs();
    if lat < 29.911_356_86 {
        if lat < 10.470_471_30 { return 59; }
        if lat < 14.828_174_37 { return 58; }
        if lat < 18.186_263_57 { return 57; }
        if lat < 21.029_394_93 { return 56; }
        if lat < 23.545_044_87 { return 55; }
        if lat < 25.829_247_07 { return 54; }
        if lat < 27.938_987_10 { return 53; }
        return 52;
    }
    if lat < 44.194_549_51 {
        if lat < 31.772_097_08 { return 51; }
        if lat < 33.539_934_36 { return 50; }
        if lat < 35.228_995_98 { return 49; }
        if lat < 36.850_251_08 { return 48; }
        if lat < 38.412_418_92 { return 47; }
        if lat < 39.922_566_84 { return 46; }
        if lat < 41.386_518_32 { return 45; }
        if lat < 42.809_140_12 { return 44; }
        return 43;
    }
    if lat < 59.954_592_77 {
        if lat < 45.546_267_23 { return 42; }
        if lat < 46.867_332_52 { return 41; }
        if lat < 48.160_391_28 { return 40; }
        if lat < 49.427_764_39 { return 39; }
        if lat < 50.671_501_66 { return 38; }
        if lat < 51.893_424_69 { return 37; }
        if lat < 53.095_161_53 { return 36; }
        if lat < 54.278_174_72 { return 35; }
        if lat < 55.443_784_44 { return 34; }
        if lat < 56.593_187_56 { return 33; }
        if lat < 57.727_473_54 { return 32; }
        if lat < 58.847_637_76 { return 31; }
        return 30;
    }
    if lat < 61.049_177_74 { return 29; }
    if lat < 62.132_166_59 { return 28; }
    if lat < 63.204_274_79 { return 27; }
    if lat < 64.266_165_23 { return 26; }
    if lat < 65.318_453_10 { return 25; }
    if lat < 66.361_710_08 { return 24; }
    if lat < 67.396_467_74 { return 23; }
    if lat < 68.423_220_22 { return 22; }
    if lat < 69.442_426_31 { return 21; }
    if lat < 70.454_510_75 { return 20; }
    if lat < 71.459_864_73 { return 19; }
    if lat < 72.458_845_45 { return 18; }
    if lat < 73.451_774_42 { return 17; }
    if lat < 74.438_934_16 { return 16; }
    if lat < 75.420_562_57 { return 15; }
    if lat < 76.396_843_91 { return 14; }
    if lat < 77.367_894_61 { return 13; }
    if lat < 78.333_740_83 { return 12; }
    if lat < 79.294_282_25 { return 11; }
    if lat < 80.249_232_13 { return 10; }
    if lat < 81.198_013_49 { return 9; }
    if lat < 82.139_569_81 { return 8; }
    if lat < 83.071_994_45 { return 7; }
    if lat < 83.991_735_63 { return 6; }
    if lat < 84.891_661_91 { return 5; }
    if lat < 85.755_416_21 { return 4; }
    if lat < 86.535_369_98 { return 3; }
    if lat < 87.000_000_00 { return 2; }
    1
}

/// Globally-unambiguous decode from one even and one odd sample. `latest`
/// indicates which of the two is the more recently received (the result is
/// reported at that frame's resolution).
pub fn global_decode(kind: Kind, even: CprFrame, odd: CprFrame, latest_is_odd: bool) -> GlobalOutcome {
    debug_assert!(!even.odd && odd.odd);
    let span = kind.span();
    let d_lat_even = span / (4.0 * NZ);
    let d_lat_odd = span / (4.0 * NZ - 1.0);

    let cpr_lat_even = even.lat as f64 / CPR_MAX;
    let cpr_lon_even = even.lon as f64 / CPR_MAX;
    let cpr_lat_odd = odd.lat as f64 / CPR_MAX;
    let cpr_lon_odd = odd.lon as f64 / CPR_MAX;

    let j = (59.0 * cpr_lat_even - 60.0 * cpr_lat_odd + 0.5).floor();

    let mut lat_even = d_lat_even * (modulo(j, 60.0) + cpr_lat_even);
    let mut lat_odd = d_lat_odd * (modulo(j, 59.0) + cpr_lat_odd);

    if matches!(kind, Kind::Airborne) {
        if lat_even >= 270.0 {
            lat_even -= 360.0;
        }
        if lat_odd >= 270.0 {
            lat_odd -= 360.0;
        }
    }

    if !(-90.0..=90.0).contains(&lat_even) || !(-90.0..=90.0).contains(&lat_odd) {
        return GlobalOutcome::OutOfRange;
    }
    if nl(lat_even) != nl(lat_odd) {
        return GlobalOutcome::Ambiguous;
    }

    let lat = if latest_is_odd { lat_odd } else { lat_even };
    let (p, c) = if latest_is_odd { (1, cpr_lon_odd) } else { (0, cpr_lon_even) };
    let ni = (nl(lat) as i64 - p).max(1) as f64;
    let m = (cpr_lon_even * (nl(lat) as i64 - 1) as f64 - cpr_lon_odd * nl(lat) as f64 + 0.5).floor();
    let r = modulo(m, ni);

    let mut lon = (span / ni) * (r + c);
    if lon >= span / 2.0 {
        lon -= span;
    }

    GlobalOutcome::Position(lat, lon)
}

/// Locally-referenced decode from a single sample plus a reference position
/// known to be within half a latitude cell of the truth (§4.5).
pub fn local_decode(kind: Kind, frame: CprFrame, lat_ref: f64, lon_ref: f64) -> Option<(f64, f64)> {
    let span = kind.span();
    let cpr_lat = frame.lat as f64 / CPR_MAX;
    let cpr_lon = frame.lon as f64 / CPR_MAX;

    let d_lat = if frame.odd { span / 59.0 } else { span / 60.0 };

    let j = (lat_ref / d_lat).floor() + (0.5 + modulo(lat_ref, d_lat) / d_lat - cpr_lat).floor();
    let lat = d_lat * (j + cpr_lat);

    if !(-90.0..=90.0).contains(&lat) {
        return None;
    }
    if (lat - lat_ref).abs() > d_lat / 2.0 {
        return None;
    }

    let ni = if frame.odd { nl(lat).saturating_sub(1) } else { nl(lat) };
    let d_lon = if ni > 0 { span / ni as f64 } else { span };
    let m = (lon_ref / d_lon).floor() + (0.5 + modulo(lon_ref, d_lon) / d_lon - cpr_lon).floor();
    let lon = d_lon * (m + cpr_lon);

    if (lon - lon_ref).abs() > d_lon / 2.0 {
        return None;
    }

    Some((lat, lon))
}

/// Great-circle distance in nautical miles (haversine formula, accurate
/// near the poles, per §4.5/§4.6's speed-check requirement).
pub fn great_circle_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_NM: f64 = 3440.065;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_NM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn global_airborne_position() {
        // 8D40058B58C901375147EFD09357 / 8D40058B58C904A87F402D3B8C59
        let even = CprFrame { odd: false, lat: 39848, lon: 83951 };
        let odd = CprFrame { odd: true, lat: 21567, lon: 81965 };
        match global_decode(Kind::Airborne, even, odd, true) {
            GlobalOutcome::Position(lat, lon) => {
                assert_relative_eq!(lat, 49.81755, max_relative = 1e-2);
                assert_relative_eq!(lon, 6.08442, max_relative = 1e-2);
            }
            other => panic!("expected a position, got {other:?}"),
        }
    }

    #[test]
    fn local_and_global_agree_within_a_meter() {
        let even = CprFrame { odd: false, lat: 39848, lon: 83951 };
        let odd = CprFrame { odd: true, lat: 21567, lon: 81965 };
        let (lat, lon) = match global_decode(Kind::Airborne, even, odd, true) {
            GlobalOutcome::Position(lat, lon) => (lat, lon),
            other => panic!("expected a position, got {other:?}"),
        };
        let (local_lat, local_lon) =
            local_decode(Kind::Airborne, odd, lat, lon).expect("local decode should succeed from its own result");
        let distance_m = great_circle_nm(lat, lon, local_lat, local_lon) * 1852.0;
        assert!(distance_m < 1.0, "distance was {distance_m} m");
    }

    #[test]
    fn speed_check_rejects_an_impossible_jump() {
        let d = great_circle_nm(0.0, 0.0, 0.0, 1000.0 / 60.0);
        // roughly 1000 NM over 60s implies ~60000 kt, certainly over any
        // plausible envelope.
        assert!(d > 900.0);
    }
}
