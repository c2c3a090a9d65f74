//! Plausibility scoring for a raw frame, independent of full decode (§4.4).
//!
//! A demodulator that has several overlapping candidate byte windows for the
//! same transmission can call [`score`] on each and keep the highest: it is
//! pure, cheap (no allocation beyond what [`crc::diagnose`] needs), and uses
//! the same DF dispatch and syndrome as [`crate::decode::decode_frame`]
//! without building a [`crate::message::DownlinkMessage`].

use crate::bits::extract;
use crate::crc;
use crate::filter::AddressFilter;

fn df_length(df: u8) -> usize {
    if df & 0x10 != 0 { 112 } else { 56 }
}

/// Scores `raw` against `filter`, per the table in §4.4. Divides by
/// `bit-errors + 1` wherever a correction was applied.
pub fn score(raw: &[u8], filter: &AddressFilter, max_weight: u8) -> i32 {
    if raw.iter().all(|&b| b == 0) || raw.len() < 7 {
        return -2;
    }

    let df = extract(raw, 1, 5) as u8;
    let nbits = df_length(df);
    if raw.len() < nbits / 8 {
        return -2;
    }
    let msg = &raw[..nbits / 8];
    let syndrome = crc::checksum(msg, nbits);

    match df {
        0 | 4 | 5 | 16 | 20 | 21 | 24..=31 => {
            let addr = syndrome & 0x00ff_ffff;
            if filter.test(addr) { 1000 } else { -1 }
        }
        11 => {
            let masked = syndrome & 0xffff_ff80;
            if syndrome == 0 {
                let addr = extract(msg, 9, 32);
                if filter.test(addr) { 1600 } else { 750 }
            } else if masked == 0 {
                // IID != 0 but still fits in the low 7 bits: CRC clean.
                let addr = extract(msg, 9, 32);
                if filter.test(addr) { 1000 } else { -1 }
            } else {
                let err = match crc::diagnose(masked, nbits, 1) {
                    Some(e) if e.bit_positions.len() <= 1 => e,
                    _ => return -1,
                };
                let addr = extract(msg, 9, 32);
                let base = if filter.test(addr) { 1000 } else { -1 };
                if base < 0 {
                    base
                } else {
                    base / (err.bit_positions.len() as i32 + 1)
                }
            }
        }
        17 | 18 => {
            if syndrome == 0 {
                let addr = extract(msg, 9, 32);
                if filter.test(addr) { 1800 } else { 1400 }
            } else {
                let err = match crc::diagnose(syndrome, nbits, max_weight) {
                    Some(e) => e,
                    None => return -1,
                };
                let mut corrected = msg.to_vec();
                crc::apply(&mut corrected, &err);
                if crc::checksum(&corrected, nbits) != 0 {
                    return -1;
                }
                let addr = extract(&corrected, 9, 32);
                let base = if filter.test(addr) { 1800 } else { 1400 };
                base / (err.bit_positions.len() as i32 + 1)
            }
        }
        _ => -2,
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
    fn clean_df17_with_known_address_scores_1800() {
        let raw = hex!("8D4840D6202CC371C32CE0576098");
        let f = filter_with(0x4840D6);
        assert_eq!(score(&raw, &f, 1), 1800);
    }

    #[test]
    fn clean_df17_with_unknown_address_scores_1400() {
        let raw = hex!("8D4840D6202CC371C32CE0576098");
        let f = AddressFilter::new();
        assert_eq!(score(&raw, &f, 1), 1400);
    }

    #[test]
    fn df17_with_a_single_bit_error_scores_half() {
        let mut raw = hex!("8D4840D6202CC371C32CE0576098");
        crate::bits::flip_bit(&mut raw, 42);
        let f = filter_with(0x4840D6);
        assert_eq!(score(&raw, &f, 1), 900);
    }

    #[test]
    fn df11_iid0_clean_known_address_scores_1600() {
        let raw = hex!("5D4CA2519034D0");
        let f = filter_with(0x4CA251);
        assert_eq!(score(&raw, &f, 1), 1600);
    }

    #[test]
    fn df11_iid0_clean_unknown_address_scores_750() {
        let raw = hex!("5D4CA2519034D0");
        let f = AddressFilter::new();
        assert_eq!(score(&raw, &f, 1), 750);
    }

    #[test]
    fn df11_nonzero_iid_clean_known_address_scores_1000() {
        // Flipping a bit within the PI field's low-order (interrogator
        // code) byte only changes the syndrome's low 7 bits directly —
        // the CRC is still clean, just with a nonzero IID.
        let mut raw = hex!("5D4CA2519034D0");
        let f = filter_with(0x4CA251);
        raw[6] ^= 0x01;
        assert_eq!(score(&raw, &f, 1), 1000);
    }

    #[test]
    fn structurally_bad_frame_scores_minus_two() {
        let raw = [0u8; 7];
        let f = AddressFilter::new();
        assert_eq!(score(&raw, &f, 1), -2);
    }

    #[test]
    fn surveillance_reply_with_unknown_address_scores_minus_one() {
        let raw = [0x20u8, 0, 0, 0, 0, 0, 0];
        let f = AddressFilter::new();
        assert_eq!(score(&raw, &f, 1), -1);
    }
}
