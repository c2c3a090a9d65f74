//! The data-validity stamp: four timestamps plus a provenance, attached to
//! every measurable field on an [`crate::track::AircraftTrack`] (§3, §4.6).

use mode_s_core::message::Provenance;

/// `updated ≤ stale ≤ expires` always holds for a populated stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DataValidity {
    pub updated: u64,
    pub stale: u64,
    pub expires: u64,
    pub next_reduce_forward: u64,
    pub source: Provenance,
}

impl Default for DataValidity {
    fn default() -> Self {
        DataValidity {
            updated: 0,
            stale: 0,
            expires: 0,
            next_reduce_forward: 0,
            source: Provenance::Invalid,
        }
    }
}

impl DataValidity {
    pub fn is_valid(&self, now_ms: u64) -> bool {
        self.source != Provenance::Invalid && now_ms < self.expires
    }

    pub fn is_fresh(&self, now_ms: u64) -> bool {
        self.source != Provenance::Invalid && now_ms < self.stale
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        if self.source == Provenance::Invalid {
            return u64::MAX;
        }
        now_ms.saturating_sub(self.updated)
    }

    /// The §4.6 acceptance rule: the same or better source always wins; a
    /// weaker source wins only once the current value has gone stale.
    pub fn accepts(&self, now_ms: u64, new_source: Provenance) -> bool {
        now_ms >= self.updated && (new_source >= self.source || now_ms >= self.stale)
    }

    /// Stamps the field as freshly accepted from `new_source` at `now_ms`,
    /// with the given stale/expire horizons (seconds from now).
    pub fn accept(&mut self, now_ms: u64, new_source: Provenance, stale_s: u64, expire_s: u64) {
        self.updated = now_ms;
        self.stale = now_ms + stale_s * 1000;
        self.expires = now_ms + expire_s * 1000;
        self.source = new_source;
    }

    /// Clears the field once it has expired (§4.6.2).
    pub fn expire(&mut self, now_ms: u64) -> bool {
        if self.source != Provenance::Invalid && now_ms >= self.expires {
            self.source = Provenance::Invalid;
            true
        } else {
            false
        }
    }

    /// Combines two stamps (e.g. baro altitude + geo-baro delta -> geometric
    /// altitude): weakest source, latest update, earliest stale/expiry.
    pub fn combine(a: &DataValidity, b: &DataValidity) -> DataValidity {
        DataValidity {
            updated: a.updated.max(b.updated),
            stale: a.stale.min(b.stale),
            expires: a.expires.min(b.expires),
            next_reduce_forward: a.next_reduce_forward.min(b.next_reduce_forward),
            source: a.source.min(b.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_or_better_source_always_wins() {
        let mut v = DataValidity::default();
        v.accept(0, Provenance::AdsB, 60, 70);
        assert!(v.accepts(100, Provenance::AdsB));
        assert!(v.accepts(100, Provenance::ModeSChecked));
        assert!(!v.accepts(100, Provenance::Mlat));
    }

    #[test]
    fn weaker_source_wins_once_stale() {
        let mut v = DataValidity::default();
        v.accept(0, Provenance::AdsB, 60, 70);
        assert!(!v.accepts(30_000, Provenance::Mlat));
        assert!(v.accepts(61_000, Provenance::Mlat));
    }

    #[test]
    fn combine_takes_weakest_source_and_latest_update() {
        let mut a = DataValidity::default();
        a.accept(1000, Provenance::AdsB, 60, 70);
        let mut b = DataValidity::default();
        b.accept(2000, Provenance::ModeSChecked, 15, 70);
        let c = DataValidity::combine(&a, &b);
        assert_eq!(c.source, Provenance::ModeSChecked);
        assert_eq!(c.updated, 2000);
        assert_eq!(c.stale, a.stale.min(b.stale));
    }
}
