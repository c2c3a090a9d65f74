//! NIC (Navigation Integrity Category) and Rc (horizontal containment
//! radius, metres) lookup from the position message's ME type code and the
//! aircraft's learned ADS-B version and NIC supplement bits (§4.6.1).

/// `None` means "unknown": ME type 8 carries no NIC/Rc information at all,
/// regardless of ADS-B version.
pub fn nic_and_rc(me_type: u8, adsb_version: i8, nic_a: bool, nic_b: bool, nic_c: bool) -> (Option<u8>, Option<u32>) {
    match me_type {
        0 => (None, None),
        9 | 20 => (Some(11), Some(7)),
        10 | 21 => (Some(10), Some(25)),
        11 => {
            if adsb_version == 2 {
                if nic_a && nic_c {
                    (Some(11), Some(7))
                } else if nic_a {
                    (Some(9), Some(75))
                } else {
                    (Some(8), Some(185))
                }
            } else {
                (Some(8), Some(185))
            }
        }
        12 | 22 => (Some(7), Some(370)),
        13 => {
            if adsb_version == 2 {
                if nic_a {
                    (Some(6), Some(1111))
                } else if nic_b {
                    (Some(6), Some(1482))
                } else {
                    (Some(6), Some(1482))
                }
            } else {
                (Some(6), Some(1482))
            }
        }
        14 => (Some(5), Some(3704)),
        15 => (Some(4), Some(7408)),
        16 => {
            if adsb_version == 2 && nic_a {
                (Some(3), Some(14816))
            } else {
                (Some(2), Some(18520))
            }
        }
        17 => (Some(1), Some(37040)),
        18 => (Some(0), None),
        8 => (None, None),
        _ => (None, None),
    }
}

/// Synthesizes NACp/SIL from the position message's ME type for version 0
/// aircraft (§4.6 "ADS-B version learning"): a genuine v0 operational-status
/// message, if sent at all, carries no NACp subfield, so there is no other
/// source for these fields. Same simplified-approximation spirit as
/// [`nic_and_rc`]: NACp follows the same ME-type ladder, SIL defaults to
/// the common "per flight hour, unknown basis" value of 2. No-op for v1/v2,
/// which learn both fields directly from their own operational-status
/// message.
pub fn synthesize_nacp_sil(me_type: u8, adsb_version: i8) -> (Option<u8>, Option<u8>) {
    if adsb_version != 0 {
        return (None, None);
    }
    let nacp = match me_type {
        9 | 20 => Some(11),
        10 | 21 => Some(10),
        11 => Some(8),
        12 | 22 => Some(7),
        13 => Some(6),
        14 => Some(5),
        15 => Some(4),
        16 => Some(2),
        17 => Some(1),
        18 => Some(0),
        _ => None,
    };
    (nacp, nacp.map(|_| 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_code_9_gives_nic_11_rc_7m() {
        assert_eq!(nic_and_rc(9, 2, false, false, false), (Some(11), Some(7)));
    }

    #[test]
    fn type_code_8_is_always_unknown() {
        assert_eq!(nic_and_rc(8, 2, true, true, true), (None, None));
        assert_eq!(nic_and_rc(8, 0, false, false, false), (None, None));
    }

    #[test]
    fn type_code_18_is_loosest_containment_not_unknown() {
        assert_eq!(nic_and_rc(18, 2, false, false, false), (Some(0), None));
    }

    #[test]
    fn type_code_11_version2_nic_a_and_c_tightens_containment() {
        let loose = nic_and_rc(11, 2, false, false, false);
        let tight = nic_and_rc(11, 2, true, false, true);
        assert!(tight.1.unwrap() < loose.1.unwrap());
    }

    #[test]
    fn nacp_sil_synthesize_only_for_version_zero() {
        assert_eq!(synthesize_nacp_sil(11, 0), (Some(8), Some(2)));
        assert_eq!(synthesize_nacp_sil(11, 1), (None, None));
        assert_eq!(synthesize_nacp_sil(11, 2), (None, None));
    }

    #[test]
    fn nacp_sil_synthesis_is_unknown_for_unrecognized_me_type() {
        assert_eq!(synthesize_nacp_sil(0, 0), (None, None));
    }
}
