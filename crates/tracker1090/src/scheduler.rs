//! Change-triggered output scheduling with rate limiting (§4.7).
//!
//! The scheduler doesn't own the track; it's handed a snapshot of what was
//! last emitted and decides, given the track's current state, whether this
//! pass should emit and at what snapshot fields changed.

use crate::track::AircraftTrack;
use mode_s_core::message::AddressType;

/// The subset of an [`AircraftTrack`] that output-change detection cares
/// about, captured at the moment of the last emission.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct EmittedSnapshot {
    pub callsign_hash: u64,
    pub address_type: Option<AddressType>,
    pub squawk: Option<u16>,
    pub emergency: Option<u8>,
    pub nav_modes: u16,
    pub mcp_altitude: Option<u32>,
    pub fms_altitude: Option<u32>,
    pub qnh: Option<f64>,
    pub nav_heading: Option<f64>,
    pub air_ground: mode_s_core::message::AirGround,
    pub altitude_source: Option<u8>,

    pub altitude_baro: Option<f64>,
    pub vertical_rate_baro: Option<i32>,
    pub track: Option<f64>,
    pub mag_heading: Option<f64>,
    pub roll: Option<f64>,
    pub ground_speed: Option<f64>,
    pub indicated_airspeed: Option<f64>,
    pub mach: Option<f64>,
}

fn hash_str(s: &Option<String>) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut h = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut h);
    h.finish()
}

/// Builds the change-detection snapshot for a track's current state, to be
/// stashed as its `last_emit` once the scheduler decides to emit.
pub fn snapshot_of(track: &AircraftTrack) -> EmittedSnapshot {
    EmittedSnapshot {
        callsign_hash: hash_str(&track.callsign),
        address_type: Some(track.address_type),
        squawk: track.squawk,
        emergency: track.emergency,
        nav_modes: track.nav_intent.map(|n| n.nav_modes).unwrap_or(0),
        mcp_altitude: track.nav_intent.and_then(|n| n.mcp_altitude),
        fms_altitude: track.nav_intent.and_then(|n| n.fms_altitude),
        qnh: track.nav_intent.and_then(|n| n.qnh),
        nav_heading: track.nav_intent.and_then(|n| n.selected_heading),
        air_ground: track.air_ground,
        altitude_source: track.nav_intent.and_then(|n| n.altitude_source),
        altitude_baro: track.altitude_baro,
        vertical_rate_baro: track.vertical_rate_baro,
        track: track.track,
        mag_heading: track.mag_heading,
        roll: track.roll,
        ground_speed: track.ground_speed,
        indicated_airspeed: track.indicated_airspeed,
        mach: track.mach,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitDecision {
    Immediate,
    Debounced,
    Periodic,
    Skip,
}

/// One change-decision pass for a track that has already accumulated at
/// least 2 messages and has a `last_seen` newer than its last emission.
pub fn decide(track: &AircraftTrack, last: &EmittedSnapshot, now_ms: u64, last_emit_ms: u64) -> EmitDecision {
    if hash_str(&track.callsign) != last.callsign_hash
        || Some(track.address_type) != last.address_type
        || track.squawk != last.squawk
        || track.emergency != last.emergency
        || track.nav_intent.map(|n| n.nav_modes).unwrap_or(0) != last.nav_modes
        || changed_by(
            track.nav_intent.and_then(|n| n.mcp_altitude).map(|v| v as f64),
            last.mcp_altitude.map(|v| v as f64),
            50.0,
        )
        || changed_by(
            track.nav_intent.and_then(|n| n.fms_altitude).map(|v| v as f64),
            last.fms_altitude.map(|v| v as f64),
            50.0,
        )
        || changed_by(track.nav_intent.and_then(|n| n.qnh), last.qnh, 0.8)
        || changed_by(track.nav_intent.and_then(|n| n.selected_heading), last.nav_heading, 2.0)
        || track.air_ground != last.air_ground
        || track.nav_intent.and_then(|n| n.altitude_source) != last.altitude_source
    {
        return EmitDecision::Immediate;
    }

    let debounced = changed_by(track.altitude_baro, last.altitude_baro, 50.0)
        || changed_by_i32(track.vertical_rate_baro, last.vertical_rate_baro, 500)
        || changed_by(track.track, last.track, 2.0)
        || changed_by(track.mag_heading, last.mag_heading, 2.0)
        || changed_by(track.roll, last.roll, 5.0)
        || changed_by(track.ground_speed, last.ground_speed, 25.0)
        || changed_by(track.indicated_airspeed, last.indicated_airspeed, 25.0)
        || changed_by(track.mach, last.mach, 0.02);

    if debounced {
        return EmitDecision::Debounced;
    }

    if now_ms.saturating_sub(last_emit_ms) >= 600_000 {
        return EmitDecision::Periodic;
    }

    EmitDecision::Skip
}

fn changed_by(current: Option<f64>, last: Option<f64>, threshold: f64) -> bool {
    match (current, last) {
        (Some(c), Some(l)) => (c - l).abs() >= threshold,
        (Some(_), None) | (None, Some(_)) => true,
        (None, None) => false,
    }
}

fn changed_by_i32(current: Option<i32>, last: Option<i32>, threshold: i32) -> bool {
    match (current, last) {
        (Some(c), Some(l)) => (c - l).abs() >= threshold,
        (Some(_), None) | (None, Some(_)) => true,
        (None, None) => false,
    }
}

/// Minimum time before the next emit is permitted, per §4.7's table: zero
/// for an immediate emit, else derived from position validity, air/ground,
/// and altitude.
pub fn min_inter_emit_ms(decision: EmitDecision, track: &AircraftTrack, had_change: bool) -> u64 {
    if decision == EmitDecision::Immediate {
        return 0;
    }
    let likely_on_ground = track.air_ground == mode_s_core::message::AirGround::Ground;
    if likely_on_ground {
        return 1000;
    }
    let below_10k = track.altitude_baro.map(|a| a < 10_000.0).unwrap_or(false);
    match (below_10k, had_change) {
        (true, true) => 5000,
        (true, false) => 10_000,
        (false, true) => 10_000,
        (false, false) => 30_000,
    }
}

/// Whether a message should carry the reduced-Beast-output `reduce_forward`
/// flag: rate-limited per `next_reduce_forward`, except CPR-bearing messages
/// which always forward at least every 7s so remote peers can keep doing
/// global CPR decoding.
pub fn reduce_forward(now_ms: u64, next_reduce_forward: u64, carries_cpr: bool, cpr_next_reduce_forward: u64) -> bool {
    if carries_cpr {
        return now_ms >= cpr_next_reduce_forward;
    }
    now_ms >= next_reduce_forward
}

#[cfg(test)]
mod tests {
    use super::*;
    use mode_s_core::message::AddressType;

    #[test]
    fn squawk_change_triggers_immediate_emit() {
        let mut t = AircraftTrack::new(0x400000, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.squawk = Some(0x1200);
        let last = EmittedSnapshot { squawk: Some(0x7000), ..Default::default() };
        assert_eq!(decide(&t, &last, 1000, 0), EmitDecision::Immediate);
    }

    #[test]
    fn small_altitude_move_is_debounced_not_immediate() {
        let mut t = AircraftTrack::new(0x400000, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.altitude_baro = Some(5100.0);
        let last = EmittedSnapshot { altitude_baro: Some(5000.0), ..Default::default() };
        assert_eq!(decide(&t, &last, 1000, 0), EmitDecision::Debounced);
    }

    #[test]
    fn nothing_changed_and_period_not_elapsed_skips() {
        let t = AircraftTrack::new(0x400000, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        let last = EmittedSnapshot::default();
        assert_eq!(decide(&t, &last, 1000, 0), EmitDecision::Skip);
    }

    #[test]
    fn nothing_changed_but_six_hundred_seconds_elapsed_forces_periodic() {
        let t = AircraftTrack::new(0x400000, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        let last = EmittedSnapshot::default();
        assert_eq!(decide(&t, &last, 600_001, 0), EmitDecision::Periodic);
    }
}
