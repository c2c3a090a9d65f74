//! Per-aircraft state: the long-lived record a [`crate::Tracker`] keeps per
//! 24-bit address, plus the [`AircraftTrack::update`]/[`AircraftTrack::periodic`]
//! logic of §4.6.

use crate::nic;
use crate::scheduler::{self, EmitDecision, EmittedSnapshot};
use crate::validity::DataValidity;
use crate::TrackerConfig;
use mode_s_core::cpr::{self, CprFrame, GlobalOutcome, Kind};
use mode_s_core::message::{
    AddressType, AirGround, DownlinkMessage, HeadingKind, IntegrityBits, NavigationIntent, Provenance, Validity,
};

/// CPR-bearing messages are forwarded on the reduced Beast feed at least
/// this often regardless of rate limiting, so remote peers doing Global
/// CPR decoding always see both halves of a pair within range (§4.7).
const CPR_REDUCE_FORWARD_MS: u64 = 7_000;

const ALTITUDE_BARO_RELIABLE_MAX: i32 = 20;

/// Repeats of the same Mode A/C squawk required within [`MODEAC_REPEAT_WINDOW_MS`]
/// before it's trusted (§A.5, ported from `track.c`'s `modeA_hit`/`modeC_hit`).
const TRACK_MODEAC_MIN_MESSAGES: u8 = 4;
const MODEAC_REPEAT_WINDOW_MS: u64 = 1_000;

/// One half of the aircraft's current CPR pair, with the resolved NIC/Rc.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CprSample {
    pub frame: CprFrame,
    pub kind: Kind,
    pub nic: Option<u8>,
    pub rc_metres: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingReference {
    Magnetic,
    True,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackOrHeadingPref {
    Track,
    Heading,
}

/// The full per-aircraft record; `#[derive(Serialize)]` backs a debug/
/// verbose JSON dump of raw tracker state, distinct from the narrower
/// per-format DTOs beastd's output modules build for wire encoding.
#[derive(serde::Serialize)]
pub struct AircraftTrack {
    pub address: u32,
    pub address_type: AddressType,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    pub messages: u64,

    pub signal_level: [f64; 8],
    pub signal_next: usize,

    pub callsign: Option<String>,
    pub callsign_valid: DataValidity,

    pub altitude_baro: Option<f64>,
    pub altitude_baro_valid: DataValidity,
    pub altitude_baro_reliable: i32,
    pub altitude_geom: Option<f64>,
    pub altitude_geom_valid: DataValidity,
    pub geom_delta: Option<i32>,
    pub geom_delta_valid: DataValidity,

    pub ground_speed: Option<f64>,
    pub gs_valid: DataValidity,
    pub indicated_airspeed: Option<f64>,
    pub ias_valid: DataValidity,
    pub true_airspeed: Option<f64>,
    pub tas_valid: DataValidity,
    pub mach: Option<f64>,
    pub mach_valid: DataValidity,

    pub track: Option<f64>,
    pub track_valid: DataValidity,
    pub mag_heading: Option<f64>,
    pub mag_heading_valid: DataValidity,
    pub true_heading: Option<f64>,
    pub true_heading_valid: DataValidity,
    pub roll: Option<f64>,
    pub roll_valid: DataValidity,

    pub vertical_rate_baro: Option<i32>,
    pub baro_rate_valid: DataValidity,
    pub vertical_rate_geom: Option<i32>,
    pub geom_rate_valid: DataValidity,

    pub squawk: Option<u16>,
    pub squawk_valid: DataValidity,
    /// Mode A/C repeat-confirmation bookkeeping (§A.5): the candidate
    /// squawk under confirmation, how many times it's repeated so far, and
    /// when the run started.
    modeac_repeat_squawk: Option<u16>,
    modeac_repeat_count: u8,
    modeac_repeat_first_ms: u64,
    pub emergency: Option<u8>,
    pub emergency_valid: DataValidity,
    pub category: Option<u8>,
    pub category_valid: DataValidity,
    pub air_ground: AirGround,
    pub airground_valid: DataValidity,

    pub nav_intent: Option<NavigationIntent>,
    pub nav_intent_valid: DataValidity,
    pub integrity: IntegrityBits,
    pub integrity_valid: DataValidity,

    pub cpr_odd: Option<CprSample>,
    pub cpr_odd_valid: DataValidity,
    pub cpr_even: Option<CprSample>,
    pub cpr_even_valid: DataValidity,
    pub pos_reliable_odd: u8,
    pub pos_reliable_even: u8,
    pub position: Option<(f64, f64)>,
    pub position_valid: DataValidity,
    pub gs_last_pos: Option<f64>,

    pub adsb_version: i8,
    pub adsr_version: i8,
    pub tisb_version: i8,
    pub adsb_hrd: HeadingReference,
    pub adsb_tah: TrackOrHeadingPref,
    pub nic_a: bool,
    pub nic_c: bool,

    /// Deployment tunables copied in at construction (§4.5/§4.6): the
    /// position-reliability ceiling, prune timeout, and the receiver's own
    /// range/position for CPR max-range rejection and local-decode
    /// fallback.
    pub filter_persistence: u8,
    pub expire_after_minutes: u64,
    pub max_range_nm: Option<f64>,
    pub receiver_position: Option<(f64, f64)>,

    /// Output-scheduler bookkeeping (§4.7): what was last handed to the
    /// change-triggered telemetry emitter, and when.
    pub last_emit: EmittedSnapshot,
    pub last_emit_ms: u64,
    /// Per-message `reduce_forward` rate-limit horizons for the reduced
    /// Beast feed; the CPR one is capped tighter so Global decoding stays
    /// possible downstream even when nothing else changed.
    pub next_reduce_forward_ms: u64,
    pub cpr_next_reduce_forward_ms: u64,
}

impl AircraftTrack {
    pub fn new(address: u32, address_type: AddressType, now_ms: u64, config: &TrackerConfig) -> Self {
        AircraftTrack {
            address,
            address_type,
            first_seen_ms: now_ms,
            last_seen_ms: now_ms,
            messages: 0,
            signal_level: [1e-5; 8],
            signal_next: 0,
            callsign: None,
            callsign_valid: DataValidity::default(),
            altitude_baro: None,
            altitude_baro_valid: DataValidity::default(),
            altitude_baro_reliable: 0,
            altitude_geom: None,
            altitude_geom_valid: DataValidity::default(),
            geom_delta: None,
            geom_delta_valid: DataValidity::default(),
            ground_speed: None,
            gs_valid: DataValidity::default(),
            indicated_airspeed: None,
            ias_valid: DataValidity::default(),
            true_airspeed: None,
            tas_valid: DataValidity::default(),
            mach: None,
            mach_valid: DataValidity::default(),
            track: None,
            track_valid: DataValidity::default(),
            mag_heading: None,
            mag_heading_valid: DataValidity::default(),
            true_heading: None,
            true_heading_valid: DataValidity::default(),
            roll: None,
            roll_valid: DataValidity::default(),
            vertical_rate_baro: None,
            baro_rate_valid: DataValidity::default(),
            vertical_rate_geom: None,
            geom_rate_valid: DataValidity::default(),
            squawk: None,
            squawk_valid: DataValidity::default(),
            modeac_repeat_squawk: None,
            modeac_repeat_count: 0,
            modeac_repeat_first_ms: 0,
            emergency: None,
            emergency_valid: DataValidity::default(),
            category: None,
            category_valid: DataValidity::default(),
            air_ground: AirGround::Unknown,
            airground_valid: DataValidity::default(),
            nav_intent: None,
            nav_intent_valid: DataValidity::default(),
            integrity: IntegrityBits::default(),
            integrity_valid: DataValidity::default(),
            cpr_odd: None,
            cpr_odd_valid: DataValidity::default(),
            cpr_even: None,
            cpr_even_valid: DataValidity::default(),
            pos_reliable_odd: 0,
            pos_reliable_even: 0,
            position: None,
            position_valid: DataValidity::default(),
            gs_last_pos: None,
            adsb_version: -1,
            adsr_version: -1,
            tisb_version: -1,
            adsb_hrd: HeadingReference::Magnetic,
            adsb_tah: TrackOrHeadingPref::Track,
            nic_a: false,
            nic_c: false,
            filter_persistence: config.filter_persistence,
            expire_after_minutes: config.expire_after_minutes,
            max_range_nm: config.max_range_nm,
            receiver_position: config.receiver_position,
            last_emit: EmittedSnapshot::default(),
            last_emit_ms: 0,
            next_reduce_forward_ms: 0,
            cpr_next_reduce_forward_ms: 0,
        }
    }

    /// `true` if the track has had only one message and it was more than
    /// 60s ago, or if no message has arrived in 10 minutes (§4.6.2/§3).
    pub fn should_prune(&self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_seen_ms) > self.expire_after_minutes * 60_000 {
            return true;
        }
        self.messages == 1 && now_ms.saturating_sub(self.last_seen_ms) > 60_000
    }

    fn record_signal(&mut self, level: f64) {
        self.signal_level[self.signal_next] = level;
        self.signal_next = (self.signal_next + 1) % self.signal_level.len();
    }

    /// Folds one decoded message into the track (§4.6 `update`).
    pub fn update(&mut self, m: &DownlinkMessage) {
        self.last_seen_ms = m.timestamp_ms;
        self.messages += 1;
        self.record_signal(m.signal_level);
        self.address_type = m.address_type;

        if let Some(cs) = &m.callsign {
            if self.callsign_valid.accepts(m.timestamp_ms, m.provenance) {
                self.callsign = Some(cs.clone());
                self.callsign_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }

        if let Some(alt) = &m.altitude_baro {
            self.accept_altitude_baro(alt.value, m);
        }
        if let Some(alt) = &m.altitude_geom {
            if self.altitude_geom_valid.accepts(m.timestamp_ms, m.provenance) {
                self.altitude_geom = Some(alt.value);
                self.altitude_geom_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        } else if let Some(delta) = m.geom_delta {
            if self.geom_delta_valid.accepts(m.timestamp_ms, m.provenance) {
                self.geom_delta = Some(delta);
                self.geom_delta_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
            self.derive_altitude_geom(m.timestamp_ms);
        }

        if let Some(gs) = &m.ground_speed {
            let selected = self.select_ground_speed(gs.v0, gs.v2, gs.selected);
            if let Some(v) = selected {
                if self.gs_valid.accepts(m.timestamp_ms, m.provenance) {
                    self.ground_speed = Some(v);
                    self.gs_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
                }
            }
        }
        if let Some(ias) = m.indicated_airspeed {
            if self.ias_valid.accepts(m.timestamp_ms, m.provenance) {
                self.indicated_airspeed = Some(ias);
                self.ias_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }
        if let Some(tas) = m.true_airspeed {
            if self.tas_valid.accepts(m.timestamp_ms, m.provenance) {
                self.true_airspeed = Some(tas);
                self.tas_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }
        if let Some(mach) = m.mach {
            if self.mach_valid.accepts(m.timestamp_ms, m.provenance) {
                self.mach = Some(mach);
                self.mach_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }

        if let Some((value, kind)) = m.heading {
            self.accept_heading(value, kind, m);
        }
        if let Some(roll) = m.roll {
            if self.roll_valid.accepts(m.timestamp_ms, m.provenance) {
                self.roll = Some(roll);
                self.roll_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }

        if let Some(vr) = m.vertical_rate_baro {
            if self.baro_rate_valid.accepts(m.timestamp_ms, m.provenance) {
                self.vertical_rate_baro = Some(vr);
                self.baro_rate_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }
        if let Some(vr) = m.vertical_rate_geom {
            if self.geom_rate_valid.accepts(m.timestamp_ms, m.provenance) {
                self.vertical_rate_geom = Some(vr);
                self.geom_rate_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }

        if let Some(sq) = m.squawk {
            let confirmed = m.provenance != Provenance::ModeAc || self.confirm_modeac_squawk(sq, m.timestamp_ms);
            if confirmed && self.squawk_valid.accepts(m.timestamp_ms, m.provenance) {
                self.squawk = Some(sq);
                self.squawk_valid.accept(m.timestamp_ms, m.provenance, 15, 70);
            }
        }
        if let Some(e) = m.emergency {
            if self.emergency_valid.accepts(m.timestamp_ms, m.provenance) {
                self.emergency = Some(e);
                self.emergency_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }
        if let Some(cat) = m.category {
            if self.category_valid.accepts(m.timestamp_ms, m.provenance) {
                self.category = Some(cat);
                self.category_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }
        if m.air_ground != AirGround::Unknown && self.airground_valid.accepts(m.timestamp_ms, m.provenance) {
            self.air_ground = m.air_ground;
            self.airground_valid.accept(m.timestamp_ms, m.provenance, 15, 70);
        }

        if let Some(intent) = &m.nav_intent {
            if self.nav_intent_valid.accepts(m.timestamp_ms, m.provenance) {
                self.nav_intent = Some(combine_nav_modes(self.nav_intent, *intent));
                self.nav_intent_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
            }
        }
        if m.validity.contains(Validity::INTEGRITY) && self.integrity_valid.accepts(m.timestamp_ms, m.provenance) {
            self.integrity = m.integrity;
            self.integrity_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
        }

        if let Some(cpr) = &m.cpr {
            self.accept_cpr(cpr, m);
        }

        if let Some(version) = m.adsb_version {
            let hrd = match m.heading_is_true {
                Some(true) => HeadingReference::True,
                _ => HeadingReference::Magnetic,
            };
            self.learn_version(version, hrd, self.adsb_tah);
        }
    }

    /// Captures the subset of current state the output scheduler compares
    /// against to decide whether anything worth re-emitting has changed.
    pub fn snapshot(&self) -> EmittedSnapshot {
        scheduler::snapshot_of(self)
    }

    /// One change-decision pass (§4.7): gated on having accumulated at
    /// least 2 messages and a `last_seen` newer than the last emission,
    /// then rate-limited per [`scheduler::min_inter_emit_ms`]. Advances
    /// `last_emit`/`last_emit_ms` whenever it decides to emit.
    pub fn poll_emit(&mut self, now_ms: u64) -> EmitDecision {
        if self.messages < 2 || self.last_seen_ms <= self.last_emit_ms {
            return EmitDecision::Skip;
        }
        let decision = scheduler::decide(self, &self.last_emit, now_ms, self.last_emit_ms);
        if decision == EmitDecision::Skip {
            return EmitDecision::Skip;
        }
        let had_change = decision != EmitDecision::Periodic;
        let min_interval = scheduler::min_inter_emit_ms(decision, self, had_change);
        if now_ms.saturating_sub(self.last_emit_ms) < min_interval {
            return EmitDecision::Skip;
        }
        self.last_emit = self.snapshot();
        self.last_emit_ms = now_ms;
        decision
    }

    /// Whether the message just folded in at `now_ms` should be forwarded
    /// on the reduced Beast feed, per §4.7's "per-message reduce_forward
    /// flag follows a similar rate limit keyed off next_reduce_forward";
    /// CPR-bearing messages always forward at least every 7s. Advances
    /// both horizons when it decides to forward.
    pub fn accept_reduce_forward(&mut self, now_ms: u64, carries_cpr: bool) -> bool {
        let forward = scheduler::reduce_forward(now_ms, self.next_reduce_forward_ms, carries_cpr, self.cpr_next_reduce_forward_ms);
        if forward {
            let interval = scheduler::min_inter_emit_ms(EmitDecision::Periodic, self, false).max(1000);
            self.next_reduce_forward_ms = now_ms + interval;
            if carries_cpr {
                self.cpr_next_reduce_forward_ms = now_ms + CPR_REDUCE_FORWARD_MS;
            }
        }
        forward
    }

    fn select_ground_speed(&self, v0: Option<f64>, v2: Option<f64>, selected: Option<f64>) -> Option<f64> {
        if self.adsb_version <= 1 {
            v0.or(selected)
        } else {
            v2.or(selected)
        }
    }

    fn accept_heading(&mut self, value: f64, kind: HeadingKind, m: &DownlinkMessage) {
        let resolved_kind = match kind {
            HeadingKind::MagneticOrTrue => match self.adsb_hrd {
                HeadingReference::Magnetic => HeadingKind::MagneticHeading,
                HeadingReference::True => HeadingKind::TrueHeading,
            },
            HeadingKind::TrackOrHeading => match self.adsb_tah {
                TrackOrHeadingPref::Track => HeadingKind::Track,
                TrackOrHeadingPref::Heading => HeadingKind::MagneticHeading,
            },
            other => other,
        };
        let (slot, valid) = match resolved_kind {
            HeadingKind::Track => (&mut self.track, &mut self.track_valid),
            HeadingKind::MagneticHeading => (&mut self.mag_heading, &mut self.mag_heading_valid),
            HeadingKind::TrueHeading => (&mut self.true_heading, &mut self.true_heading_valid),
            _ => unreachable!("resolved_kind can't still be an unresolved tag"),
        };
        if valid.accepts(m.timestamp_ms, m.provenance) {
            *slot = Some(value);
            valid.accept(m.timestamp_ms, m.provenance, 60, 70);
        }
    }

    fn accept_altitude_baro(&mut self, value: f64, m: &DownlinkMessage) {
        if !self.altitude_baro_valid.accepts(m.timestamp_ms, m.provenance) {
            return;
        }
        let good_crc_bonus = ALTITUDE_BARO_RELIABLE_MAX / 2 - 1;
        let plausible = match self.altitude_baro {
            None => true,
            Some(prev) => {
                let delta = value - prev;
                if delta.abs() < 300.0 {
                    true
                } else {
                    let age_ms = self.altitude_baro_valid.age_ms(m.timestamp_ms).max(1);
                    let envelope_fpm = 1500.0 + 2.0 * age_ms as f64;
                    let implied_rate_fpm = delta / (age_ms as f64 / 60_000.0);
                    let known_rate_fpm = self.vertical_rate_baro.unwrap_or(0) as f64;
                    (implied_rate_fpm - known_rate_fpm).abs() <= envelope_fpm
                }
            }
        };
        if plausible {
            self.altitude_baro = Some(value);
            self.altitude_baro_valid.accept(m.timestamp_ms, m.provenance, 15, 70);
            let bonus = if m.bits_corrected == 0 { good_crc_bonus } else { 0 };
            self.altitude_baro_reliable = (self.altitude_baro_reliable + 1 + bonus).min(ALTITUDE_BARO_RELIABLE_MAX);
        } else {
            self.altitude_baro_reliable -= good_crc_bonus + 1;
            if self.altitude_baro_reliable <= 0 {
                self.altitude_baro_reliable = 0;
                self.altitude_baro = None;
                self.altitude_baro_valid = DataValidity::default();
            }
        }
    }

    /// Derives geometric altitude as `baro + geom_delta` (§A.5) when no
    /// message has supplied it directly, combining the two stamps per
    /// §4.6's provenance-combining rule so a stale half doesn't silently
    /// keep feeding a fresh one.
    fn derive_altitude_geom(&mut self, now_ms: u64) {
        let (Some(baro), Some(delta)) = (self.altitude_baro, self.geom_delta) else { return };
        let combined = DataValidity::combine(&self.altitude_baro_valid, &self.geom_delta_valid);
        if !combined.is_fresh(now_ms) {
            return;
        }
        if self.altitude_geom_valid.accepts(now_ms, combined.source) {
            self.altitude_geom = Some(baro + delta as f64);
            self.altitude_geom_valid = combined;
        }
    }

    /// Mode A/C repeat confirmation (§A.5): a bare Mode A/C reply's squawk
    /// is trusted only once the same value has repeated
    /// `TRACK_MODEAC_MIN_MESSAGES` times within `MODEAC_REPEAT_WINDOW_MS`.
    fn confirm_modeac_squawk(&mut self, squawk: u16, now_ms: u64) -> bool {
        let within_window = self.modeac_repeat_squawk == Some(squawk)
            && now_ms.saturating_sub(self.modeac_repeat_first_ms) <= MODEAC_REPEAT_WINDOW_MS;
        if within_window {
            self.modeac_repeat_count = self.modeac_repeat_count.saturating_add(1);
        } else {
            self.modeac_repeat_squawk = Some(squawk);
            self.modeac_repeat_first_ms = now_ms;
            self.modeac_repeat_count = 1;
        }
        self.modeac_repeat_count >= TRACK_MODEAC_MIN_MESSAGES
    }

    fn accept_cpr(&mut self, cpr_field: &mode_s_core::message::CprHalf, m: &DownlinkMessage) {
        let kind = if m.air_ground == AirGround::Ground { Kind::Surface } else { Kind::Airborne };
        let (nic_val, rc_val) = if let (Some(n), r) = (cpr_field.nic, cpr_field.rc_metres) {
            (Some(n), r)
        } else {
            nic::nic_and_rc(cpr_field.me_type, self.adsb_version, self.nic_a, false, self.nic_c)
        };
        if self.integrity.nacp.is_none() {
            let (nacp, sil) = nic::synthesize_nacp_sil(cpr_field.me_type, self.adsb_version);
            if nacp.is_some() {
                self.integrity.nacp = nacp;
                self.integrity.sil = sil;
            }
        }
        let sample = CprSample {
            frame: CprFrame { odd: cpr_field.odd, lat: cpr_field.lat, lon: cpr_field.lon },
            kind,
            nic: nic_val,
            rc_metres: rc_val,
        };

        let (slot, valid) = if cpr_field.odd {
            (&mut self.cpr_odd, &mut self.cpr_odd_valid)
        } else {
            (&mut self.cpr_even, &mut self.cpr_even_valid)
        };
        if !valid.accepts(m.timestamp_ms, m.provenance) {
            return;
        }
        *slot = Some(sample);
        valid.accept(m.timestamp_ms, m.provenance, 60, 70);

        let age_limit_ms = match (kind, self.ground_speed) {
            (Kind::Airborne, _) => 10_000,
            (Kind::Surface, Some(gs)) if gs > 25.0 => 25_000,
            (Kind::Surface, _) => 50_000,
        };

        let same_source = self.cpr_odd_valid.source == self.cpr_even_valid.source;
        let both_present = self.cpr_odd.is_some() && self.cpr_even.is_some();
        let recent_enough = self.cpr_odd_valid.age_ms(m.timestamp_ms).max(self.cpr_even_valid.age_ms(m.timestamp_ms))
            <= age_limit_ms;
        let same_kind = matches!(
            (self.cpr_odd, self.cpr_even),
            (Some(o), Some(e)) if o.kind == e.kind
        );

        if both_present && same_source && recent_enough && same_kind {
            let even = self.cpr_even.unwrap().frame;
            let odd = self.cpr_odd.unwrap().frame;
            match cpr::global_decode(kind, even, odd, cpr_field.odd) {
                GlobalOutcome::Position(lat, lon) => {
                    if self.check_position_plausible(lat, lon, m) {
                        self.accept_position(lat, lon, m);
                        self.pos_reliable_odd = (self.pos_reliable_odd + 1).min(self.filter_persistence);
                        self.pos_reliable_even = (self.pos_reliable_even + 1).min(self.filter_persistence);
                    } else {
                        self.reject_position();
                    }
                }
                GlobalOutcome::Ambiguous => self.try_local(kind, m),
                GlobalOutcome::OutOfRange => self.reject_position(),
            }
        } else {
            self.try_local(kind, m);
        }
    }

    /// Local CPR decode (§4.5): prefers the aircraft's own last known
    /// position (only trusted within 10 minutes of age), falling back to
    /// the receiver's fixed antenna position when configured — bounded by
    /// `max_range_nm` so a decode this far out can't wrap to the wrong
    /// zone.
    fn try_local(&mut self, kind: Kind, m: &DownlinkMessage) {
        let own_position_fresh = self.position_valid.age_ms(m.timestamp_ms) <= 10 * 60_000;
        let reference = match (self.position, own_position_fresh) {
            (Some(pos), true) => Some(pos),
            _ => self.receiver_position.filter(|_| self.max_range_nm.is_some()),
        };
        let Some((ref_lat, ref_lon)) = reference else { return };
        let sample = if m.cpr.map(|c| c.odd).unwrap_or(false) { self.cpr_odd } else { self.cpr_even };
        let Some(sample) = sample else { return };
        if let Some((lat, lon)) = cpr::local_decode(kind, sample.frame, ref_lat, ref_lon) {
            if self.check_position_plausible(lat, lon, m) {
                self.accept_position(lat, lon, m);
            }
        }
    }

    fn check_position_plausible(&self, lat: f64, lon: f64, m: &DownlinkMessage) -> bool {
        if let (Some(max_range), Some((rx_lat, rx_lon))) = (self.max_range_nm, self.receiver_position) {
            if cpr::great_circle_nm(rx_lat, rx_lon, lat, lon) > max_range {
                return false;
            }
        }
        let Some((prev_lat, prev_lon)) = self.position else { return true };
        let age_s = self.position_valid.age_ms(m.timestamp_ms) as f64 / 1000.0;
        if age_s <= 0.0 {
            return true;
        }
        let distance_nm = cpr::great_circle_nm(prev_lat, prev_lon, lat, lon);
        let implied_kt = distance_nm / (age_s / 3600.0);
        let known_speed = self.ground_speed.or(self.true_airspeed).or(self.indicated_airspeed).unwrap_or(0.0);
        let min_envelope = if m.air_ground == AirGround::Ground { 150.0 } else { 200.0 };
        let envelope = (known_speed + 2.0 * age_s).max(min_envelope);
        implied_kt <= envelope
    }

    fn accept_position(&mut self, lat: f64, lon: f64, m: &DownlinkMessage) {
        self.position = Some((lat, lon));
        self.position_valid.accept(m.timestamp_ms, m.provenance, 60, 70);
        self.gs_last_pos = self.ground_speed;
    }

    fn reject_position(&mut self) {
        self.pos_reliable_odd = self.pos_reliable_odd.saturating_sub(1);
        self.pos_reliable_even = self.pos_reliable_even.saturating_sub(1);
        if self.pos_reliable_odd == 0 || self.pos_reliable_even == 0 {
            self.position = None;
            self.position_valid = DataValidity::default();
            self.cpr_odd = None;
            self.cpr_even = None;
            self.cpr_odd_valid = DataValidity::default();
            self.cpr_even_valid = DataValidity::default();
        }
    }

    /// Learns the ADS-B version and HRD/TAH bits from an operational-status
    /// message; called by the decode-layer consumer before `update`, or
    /// inline when `m` carries them (§4.6 "ADS-B version learning").
    pub fn learn_version(&mut self, version: i8, hrd: HeadingReference, tah: TrackOrHeadingPref) {
        self.adsb_version = version;
        self.adsb_hrd = hrd;
        self.adsb_tah = tah;
    }

    /// Clears fields whose validity has expired; resets reliability counters
    /// alongside the position/altitude they guard (§4.6.2).
    pub fn periodic(&mut self, now_ms: u64) {
        macro_rules! expire {
            ($value:expr, $valid:expr) => {
                if $valid.expire(now_ms) {
                    $value = None;
                }
            };
        }
        expire!(self.callsign, self.callsign_valid);
        if self.altitude_baro_valid.expire(now_ms) {
            self.altitude_baro = None;
            self.altitude_baro_reliable = 0;
        }
        expire!(self.altitude_geom, self.altitude_geom_valid);
        expire!(self.geom_delta, self.geom_delta_valid);
        expire!(self.ground_speed, self.gs_valid);
        expire!(self.indicated_airspeed, self.ias_valid);
        expire!(self.true_airspeed, self.tas_valid);
        expire!(self.mach, self.mach_valid);
        expire!(self.track, self.track_valid);
        expire!(self.mag_heading, self.mag_heading_valid);
        expire!(self.true_heading, self.true_heading_valid);
        expire!(self.roll, self.roll_valid);
        expire!(self.vertical_rate_baro, self.baro_rate_valid);
        expire!(self.vertical_rate_geom, self.geom_rate_valid);
        expire!(self.squawk, self.squawk_valid);
        expire!(self.emergency, self.emergency_valid);
        expire!(self.category, self.category_valid);
        expire!(self.nav_intent, self.nav_intent_valid);
        if self.position_valid.expire(now_ms) {
            self.position = None;
            self.pos_reliable_odd = 0;
            self.pos_reliable_even = 0;
        }
        if self.cpr_odd_valid.expire(now_ms) {
            self.cpr_odd = None;
        }
        if self.cpr_even_valid.expire(now_ms) {
            self.cpr_even = None;
        }
        if self.airground_valid.expire(now_ms) {
            self.air_ground = AirGround::Unknown;
        }
        self.integrity_valid.expire(now_ms);
    }
}

fn combine_nav_modes(existing: Option<NavigationIntent>, incoming: NavigationIntent) -> NavigationIntent {
    match existing {
        None => incoming,
        Some(mut prev) => {
            prev.nav_modes |= incoming.nav_modes;
            if incoming.mcp_altitude.is_some() {
                prev.mcp_altitude = incoming.mcp_altitude;
            }
            if incoming.fms_altitude.is_some() {
                prev.fms_altitude = incoming.fms_altitude;
            }
            if incoming.selected_heading.is_some() {
                prev.selected_heading = incoming.selected_heading;
            }
            if incoming.qnh.is_some() {
                prev.qnh = incoming.qnh;
            }
            if incoming.altitude_source.is_some() {
                prev.altitude_source = incoming.altitude_source;
            }
            prev
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;
    use mode_s_core::filter::AddressFilter;

    fn decode(raw: &[u8], now_ms: u64) -> DownlinkMessage {
        let f = AddressFilter::new();
        mode_s_core::decode::decode_frame(raw, &f, 1.0, 0, now_ms, 1).expect("clean frame decodes")
    }

    #[test]
    fn small_altitude_delta_is_accepted_unconditionally() {
        let raw = hex!("8D40621D58C382D690C8AC2863A7");
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.update(&decode(&raw, 0));
        assert_eq!(t.altitude_baro, Some(38000.0));
        assert!(t.altitude_baro_reliable > 0);
    }

    #[test]
    fn a_single_message_track_is_pruned_after_sixty_seconds() {
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.messages = 1;
        t.last_seen_ms = 0;
        assert!(!t.should_prune(59_000));
        assert!(t.should_prune(61_000));
    }

    #[test]
    fn a_multi_message_track_survives_past_sixty_seconds_but_not_ten_minutes() {
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.messages = 2;
        t.last_seen_ms = 0;
        assert!(!t.should_prune(61_000));
        assert!(t.should_prune(10 * 60_000 + 1));
    }

    fn modeac_squawk_message(squawk: u16, timestamp_ms: u64) -> DownlinkMessage {
        let mut m = DownlinkMessage::bare(
            vec![0; 2],
            5,
            56,
            0,
            0,
            AddressType::AdsbIcao,
            mode_s_core::message::Provenance::ModeAc,
            1.0,
            0,
            timestamp_ms,
        );
        m.squawk = Some(squawk);
        m
    }

    #[test]
    fn a_lone_modeac_squawk_is_not_trusted() {
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.update(&modeac_squawk_message(0o1200, 0));
        assert_eq!(t.squawk, None);
    }

    #[test]
    fn a_modeac_squawk_repeated_four_times_within_a_second_is_trusted() {
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        for i in 0..4 {
            t.update(&modeac_squawk_message(0o1200, i * 200));
        }
        assert_eq!(t.squawk, Some(0o1200));
    }

    #[test]
    fn a_changed_modeac_squawk_resets_the_repeat_count() {
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.update(&modeac_squawk_message(0o1200, 0));
        t.update(&modeac_squawk_message(0o1200, 200));
        t.update(&modeac_squawk_message(0o7700, 400));
        t.update(&modeac_squawk_message(0o7700, 600));
        assert_eq!(t.squawk, None);
    }

    #[test]
    fn version_zero_synthesizes_nacp_sil_from_position_me_type() {
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.adsb_version = 0;

        let mut m = DownlinkMessage::bare(
            vec![0; 2],
            17,
            112,
            0,
            0x40621D,
            AddressType::AdsbIcao,
            mode_s_core::message::Provenance::AdsB,
            1.0,
            0,
            0,
        );
        m.cpr = Some(mode_s_core::message::CprHalf { odd: false, lat: 1000, lon: 1000, nic: None, rc_metres: None, me_type: 11 });
        t.update(&m);

        assert_eq!(t.integrity.nacp, Some(8));
        assert_eq!(t.integrity.sil, Some(2));
    }

    #[test]
    fn version_two_does_not_synthesize_nacp_sil() {
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        t.adsb_version = 2;

        let mut m = DownlinkMessage::bare(
            vec![0; 2],
            17,
            112,
            0,
            0x40621D,
            AddressType::AdsbIcao,
            mode_s_core::message::Provenance::AdsB,
            1.0,
            0,
            0,
        );
        m.cpr = Some(mode_s_core::message::CprHalf { odd: false, lat: 1000, lon: 1000, nic: None, rc_metres: None, me_type: 11 });
        t.update(&m);

        assert_eq!(t.integrity.nacp, None);
        assert_eq!(t.integrity.sil, None);
    }

    #[test]
    fn geometric_altitude_derives_from_baro_plus_geom_delta() {
        let mut t = AircraftTrack::new(0x40621D, AddressType::AdsbIcao, 0, &crate::TrackerConfig::default());
        let raw = hex!("8D40621D58C382D690C8AC2863A7");
        t.update(&decode(&raw, 0));
        assert_eq!(t.altitude_baro, Some(38000.0));

        let mut m = DownlinkMessage::bare(
            vec![0; 2],
            17,
            112,
            0,
            0x40621D,
            AddressType::AdsbIcao,
            mode_s_core::message::Provenance::AdsB,
            1.0,
            0,
            1000,
        );
        m.geom_delta = Some(550);
        t.update(&m);

        assert_eq!(t.altitude_geom, Some(38550.0));
    }
}
