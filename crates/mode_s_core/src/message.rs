//! The flat, already-decoded message record produced by the frame decoder
//! (§3) and consumed by the tracker. Built once, never mutated.

use serde::Serialize;

/// Where a field's value ultimately came from. Ordered worst-to-best; the
/// tracker's acceptance rule (§4.6) compares provenances with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Invalid = 0,
    ModeAc = 1,
    Mlat = 2,
    ModeSUnchecked = 3,
    ModeSChecked = 4,
    TisB = 5,
    AdsR = 6,
    AdsB = 7,
}

/// The eight-way split of "whose address is this, and how was it learned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    AdsbIcao,
    AdsbIcaoNt,
    AdsbOther,
    AdsrIcao,
    AdsrOther,
    TisbIcao,
    TisbTrackfile,
    TisbOther,
}

impl AddressType {
    /// The IMF-bit transition table of §4.3.1. Variants with no listed
    /// transition are left untouched.
    pub fn apply_imf(self) -> AddressType {
        match self {
            AddressType::AdsbIcao | AddressType::AdsbIcaoNt => AddressType::AdsbOther,
            AddressType::TisbIcao => AddressType::TisbTrackfile,
            AddressType::AdsrIcao => AddressType::AdsrOther,
            other => other,
        }
    }

    /// Whether the 24-bit address is an ICAO aircraft address rather than an
    /// anonymous/track-file/ground-vehicle identifier.
    pub fn is_icao(self) -> bool {
        matches!(self, AddressType::AdsbIcao | AddressType::AdsbIcaoNt)
    }
}

/// Either of the two altitude units a 13-bit AC field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AltitudeUnit {
    Feet,
    Metres,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Altitude {
    pub value: f64,
    pub unit: AltitudeUnit,
}

/// One half (odd or even) of a Compact Position Reporting pair, as carried
/// on a single message, plus the containment radius resolved from NIC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CprHalf {
    pub odd: bool,
    pub lat: u32,
    pub lon: u32,
    pub nic: Option<u8>,
    pub rc_metres: Option<u32>,
    /// The extended-squitter ME type code this position came from; lets the
    /// tracker resolve NIC/Rc per §4.6.1 without re-parsing the frame.
    pub me_type: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingKind {
    Track,
    MagneticHeading,
    TrueHeading,
    /// Resolves via the aircraft's learned HRD bit.
    MagneticOrTrue,
    /// Resolves via the aircraft's learned TAH bit.
    TrackOrHeading,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroundSpeed {
    pub v0: Option<f64>,
    pub v2: Option<f64>,
    pub selected: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NavigationIntent {
    pub mcp_altitude: Option<u32>,
    pub fms_altitude: Option<u32>,
    pub selected_heading: Option<f64>,
    pub qnh: Option<f64>,
    pub altitude_source: Option<u8>,
    pub nav_modes: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IntegrityBits {
    pub nic_a: Option<u8>,
    pub nic_b: Option<u8>,
    pub nic_c: Option<u8>,
    pub nacp: Option<u8>,
    pub nacv: Option<u8>,
    pub sil: Option<u8>,
    pub sil_type_is_per_hour: bool,
    pub gva: Option<u8>,
    pub sda: Option<u8>,
    pub nic_baro: Option<u8>,
}

bitflags::bitflags! {
    /// One bit per optional field, set when the decoder actually populated
    /// it (as opposed to leaving the `Option` at its default `None`).
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct Validity: u32 {
        const ALTITUDE_BARO   = 1 << 0;
        const ALTITUDE_GEOM   = 1 << 1;
        const GROUND_SPEED    = 1 << 2;
        const AIRSPEED        = 1 << 3;
        const MACH            = 1 << 4;
        const VERTICAL_RATE   = 1 << 5;
        const HEADING         = 1 << 6;
        const ROLL            = 1 << 7;
        const SQUAWK          = 1 << 8;
        const CALLSIGN        = 1 << 9;
        const EMERGENCY       = 1 << 10;
        const CATEGORY        = 1 << 11;
        const CPR             = 1 << 12;
        const NAV_INTENT      = 1 << 13;
        const INTEGRITY       = 1 << 14;
        const GEOM_DELTA      = 1 << 15;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AirGround {
    Airborne,
    Ground,
    #[default]
    Unknown,
}

/// A fully decoded frame (§3). Produced once by the frame decoder, never
/// mutated afterwards; the tracker reads it and folds accepted fields into
/// the per-aircraft track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownlinkMessage {
    pub raw_original: Vec<u8>,
    pub raw_corrected: Vec<u8>,
    pub df: u8,
    pub nbits: usize,
    pub crc_syndrome: u32,
    pub bits_corrected: u8,

    pub address: u32,
    pub address_type: AddressType,
    pub provenance: Provenance,

    pub signal_level: f64,
    pub timestamp_12mhz: u64,
    pub timestamp_ms: u64,

    pub validity: Validity,

    pub air_ground: AirGround,
    pub altitude_baro: Option<Altitude>,
    pub altitude_geom: Option<Altitude>,
    /// Geometric-minus-barometric altitude delta, in feet, from a velocity
    /// message's GNSS height-difference subfield (§4.3 step 12). The
    /// tracker, not the decoder, turns this into `altitude_geom`: combining
    /// it needs the previously tracked baro altitude, which this message
    /// alone never carries.
    pub geom_delta: Option<i32>,
    pub ground_speed: Option<GroundSpeed>,
    pub indicated_airspeed: Option<f64>,
    pub true_airspeed: Option<f64>,
    pub mach: Option<f64>,
    pub vertical_rate_baro: Option<i32>,
    pub vertical_rate_geom: Option<i32>,
    pub heading: Option<(f64, HeadingKind)>,
    pub roll: Option<f64>,
    pub squawk: Option<u16>,
    pub callsign: Option<String>,
    pub emergency: Option<u8>,
    pub category: Option<u8>,
    pub cpr: Option<CprHalf>,
    pub nav_intent: Option<NavigationIntent>,
    pub integrity: IntegrityBits,

    /// ADS-B version number (0-2), carried only on an operational-status
    /// message (§4.6 "ADS-B version learning").
    pub adsb_version: Option<i8>,
    /// Heading Reference Direction from the same message: `true` for true
    /// heading, `false` for magnetic.
    pub heading_is_true: Option<bool>,
}

impl DownlinkMessage {
    /// A message with every optional field cleared, carrying only the
    /// frame-level facts established during decode (§4.3 steps 1-4). Callers
    /// then fill in whatever steps 5-12 produce.
    pub fn bare(
        raw_original: Vec<u8>,
        df: u8,
        nbits: usize,
        crc_syndrome: u32,
        address: u32,
        address_type: AddressType,
        provenance: Provenance,
        signal_level: f64,
        timestamp_12mhz: u64,
        timestamp_ms: u64,
    ) -> Self {
        DownlinkMessage {
            raw_corrected: raw_original.clone(),
            raw_original,
            df,
            nbits,
            crc_syndrome,
            bits_corrected: 0,
            address,
            address_type,
            provenance,
            signal_level,
            timestamp_12mhz,
            timestamp_ms,
            validity: Validity::empty(),
            air_ground: AirGround::Unknown,
            altitude_baro: None,
            altitude_geom: None,
            geom_delta: None,
            ground_speed: None,
            indicated_airspeed: None,
            true_airspeed: None,
            mach: None,
            vertical_rate_baro: None,
            vertical_rate_geom: None,
            heading: None,
            roll: None,
            squawk: None,
            callsign: None,
            emergency: None,
            category: None,
            cpr: None,
            nav_intent: None,
            integrity: IntegrityBits::default(),
            adsb_version: None,
            heading_is_true: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imf_lattice_transitions_match_the_fixed_table() {
        assert_eq!(AddressType::AdsbIcao.apply_imf(), AddressType::AdsbOther);
        assert_eq!(AddressType::AdsbIcaoNt.apply_imf(), AddressType::AdsbOther);
        assert_eq!(AddressType::TisbIcao.apply_imf(), AddressType::TisbTrackfile);
        assert_eq!(AddressType::AdsrIcao.apply_imf(), AddressType::AdsrOther);
        assert_eq!(AddressType::TisbOther.apply_imf(), AddressType::TisbOther);
    }

    #[test]
    fn provenance_orders_adsb_above_mlat() {
        assert!(Provenance::AdsB > Provenance::Mlat);
        assert!(Provenance::ModeSChecked > Provenance::ModeSUnchecked);
    }
}
