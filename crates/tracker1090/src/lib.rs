//! Per-aircraft state tracking: the data-validity lattice, position
//! acceptance, and output scheduling of §4.6/§4.7.

pub mod nic;
pub mod scheduler;
pub mod track;
pub mod validity;

use mode_s_core::filter::AddressFilter;
use mode_s_core::message::{DownlinkMessage, Provenance};
use std::collections::BTreeMap;
use track::AircraftTrack;

/// Tunables §4.5/§4.6 leave to the deployment: position-reliability
/// ceiling, prune timeout, and the receiver's own range/position for CPR
/// max-range rejection and local-decode fallback.
#[derive(Debug, Clone, Copy)]
pub struct TrackerConfig {
    pub filter_persistence: u8,
    pub expire_after_minutes: u64,
    pub max_range_nm: Option<f64>,
    pub receiver_position: Option<(f64, f64)>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig { filter_persistence: 4, expire_after_minutes: 10, max_range_nm: None, receiver_position: None }
    }
}

/// Owns the per-aircraft map and the address filter it feeds on
/// well-attested frames, per §3's address-filter lifecycle ("populated only
/// by the tracker on well-attested frames").
pub struct Tracker {
    aircraft: BTreeMap<u32, AircraftTrack>,
    filter: AddressFilter,
    config: TrackerConfig,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        Tracker { aircraft: BTreeMap::new(), filter: AddressFilter::new(), config }
    }

    pub fn filter(&self) -> &AddressFilter {
        &self.filter
    }

    /// Folds a decoded message into its track, creating one if this is the
    /// first time this address has been seen.
    pub fn update(&mut self, m: &DownlinkMessage) -> &mut AircraftTrack {
        if matches!(m.provenance, Provenance::ModeSChecked | Provenance::AdsB | Provenance::TisB | Provenance::AdsR) {
            self.filter.add(m.address);
        }

        let config = self.config;
        let track = self
            .aircraft
            .entry(m.address)
            .or_insert_with(|| AircraftTrack::new(m.address, m.address_type, m.timestamp_ms, &config));
        track.update(m);
        track
    }

    pub fn get(&self, address: u32) -> Option<&AircraftTrack> {
        self.aircraft.get(&address)
    }

    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &AircraftTrack)> {
        self.aircraft.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&u32, &mut AircraftTrack)> {
        self.aircraft.iter_mut()
    }

    /// Runs the per-field expiry pass (§4.6.2) and prunes tracks that have
    /// gone silent, then rotates the address filter's active generation
    /// (§4.2's 60s swap) if `rotate_filter` is due.
    pub fn periodic(&mut self, now_ms: u64) {
        self.aircraft.retain(|_, a| {
            a.periodic(now_ms);
            !a.should_prune(now_ms)
        });
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn rotate_filter(&mut self) {
        self.filter.rotate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;
    use mode_s_core::decode::decode_frame;

    #[test]
    fn unseen_address_creates_a_track_and_then_updates_it() {
        let mut t = Tracker::new();
        let raw = hex!("8D4840D6202CC371C32CE0576098");
        let f = AddressFilter::new();
        let m = decode_frame(&raw, &f, 1.0, 0, 0, 1).unwrap();
        t.update(&m);
        assert_eq!(t.len(), 1);
        let m2 = decode_frame(&raw, &f, 1.0, 0, 1000, 1).unwrap();
        t.update(&m2);
        assert_eq!(t.get(0x4840D6).unwrap().messages, 2);
    }

    #[test]
    fn a_clean_df17_learns_the_address_into_the_filter() {
        let mut t = Tracker::new();
        let raw = hex!("8D4840D6202CC371C32CE0576098");
        let f = AddressFilter::new();
        let m = decode_frame(&raw, &f, 1.0, 0, 0, 1).unwrap();
        t.update(&m);
        assert!(t.filter().test(0x4840D6));
    }

    #[test]
    fn a_silent_track_is_pruned_after_ten_minutes() {
        let mut t = Tracker::new();
        let raw = hex!("8D4840D6202CC371C32CE0576098");
        let f = AddressFilter::new();
        let m0 = decode_frame(&raw, &f, 1.0, 0, 0, 1).unwrap();
        t.update(&m0);
        let m1 = decode_frame(&raw, &f, 1.0, 0, 1000, 1).unwrap();
        t.update(&m1);
        assert_eq!(t.len(), 1);
        t.periodic(10 * 60_000 + 2000);
        assert_eq!(t.len(), 0);
    }
}
