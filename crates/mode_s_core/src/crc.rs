//! 24-bit Mode S CRC and the syndrome→bit-error table used for frame repair.
//!
//! The checksum polynomial is linear over GF(2), and the code is systematic:
//! the last 24 bits of every frame are the parity field, so they contribute
//! nothing to a CRC recomputed from the data bits alone ([`CHECKSUM_TABLE`]'s
//! trailing 24 entries are zero for exactly this reason). The *syndrome* —
//! what [`checksum`] actually returns — is that recomputed value XORed with
//! the raw bits the transmitter put in the parity field. On a clean DF17/18
//! frame the two agree and the syndrome is zero; on DF0/4/5/16/20/21 the
//! transmitter XORs its own address into the parity field, so the syndrome
//! *is* the address; on DF11 it's a 7-bit interrogator code.
//!
//! Because the contribution of every bit position — data or parity — to the
//! syndrome is linear and independent, [`ErrorTable`] inverts the per-bit
//! contributions once at startup so [`diagnose`] is a hash lookup.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Precomputed per-bit-position CRC contribution of the first `nbits - 24`
/// (data) bits of a 112-bit frame. For a 56-bit frame, only the last 56
/// entries apply (index offset 56). The trailing 24 entries are zero: the
/// parity field does not feed back into its own computation.
pub const CHECKSUM_TABLE: [u32; 112] = [
    0x3935ea, 0x1c9af5, 0xf1b77e, 0x78dbbf, 0xc397db, 0x9e31e9, 0xb0e2f0, 0x587178,
    0x2c38bc, 0x161c5e, 0x0b0e2f, 0xfa7d13, 0x82c48d, 0xbe9842, 0x5f4c21, 0xd05c14,
    0x682e0a, 0x341705, 0xe5f186, 0x72f8c3, 0xc68665, 0x9cb936, 0x4e5c9b, 0xd8d449,
    0x939020, 0x49c810, 0x24e408, 0x127204, 0x093902, 0x049c81, 0xfdb444, 0x7eda22,
    0x3f6d11, 0xe04c8c, 0x702646, 0x381323, 0xe3f395, 0x8e03ce, 0x4701e7, 0xdc7af7,
    0x91c77f, 0xb719bb, 0xa476d9, 0xadc168, 0x56e0b4, 0x2b705a, 0x15b82d, 0xf52612,
    0x7a9309, 0xc2b380, 0x6159c0, 0x30ace0, 0x185670, 0x0c2b38, 0x06159c, 0x030ace,
    0x018567, 0xff38b7, 0x80665f, 0xbfc92b, 0xa01e91, 0xaff54c, 0x57faa6, 0x2bfd53,
    0xea04ad, 0x8af852, 0x457c29, 0xdd4410, 0x6ea208, 0x375104, 0x1ba882, 0x0dd441,
    0xf91024, 0x7c8812, 0x3e4409, 0xe0d800, 0x706c00, 0x383600, 0x1c1b00, 0x0e0d80,
    0x0706c0, 0x038360, 0x01c1b0, 0x00e0d8, 0x00706c, 0x003836, 0x001c1b, 0xfff409,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
];

fn data_checksum(msg: &[u8], nbits: usize) -> u32 {
    debug_assert!(nbits == 56 || nbits == 112);
    let offset = if nbits == 112 { 0 } else { 112 - 56 };
    let mut crc: u32 = 0;
    for j in 0..nbits {
        let byte = j / 8;
        let bitmask = 1u8 << (7 - (j % 8));
        if byte < msg.len() && msg[byte] & bitmask != 0 {
            crc ^= CHECKSUM_TABLE[j + offset];
        }
    }
    crc
}

fn raw_parity(msg: &[u8], nbits: usize) -> u32 {
    let len = nbits / 8;
    if msg.len() < len {
        return 0;
    }
    ((msg[len - 3] as u32) << 16) | ((msg[len - 2] as u32) << 8) | msg[len - 1] as u32
}

/// Computes the Mode S syndrome of `msg`: the data-only CRC XORed with the
/// parity field actually on the wire. Zero for a clean DF17/18 frame, the
/// transmitter address for an overlay format (DF0/4/5/16/20/21), or the
/// 7-bit interrogator code for DF11, per §4.1.
pub fn checksum(msg: &[u8], nbits: usize) -> u32 {
    data_checksum(msg, nbits) ^ raw_parity(msg, nbits)
}

/// The syndrome contribution of flipping a single 1-indexed, MSB-first bit.
/// Data bits pull from [`CHECKSUM_TABLE`]; parity-field bits contribute
/// their own positional weight, since flipping a parity bit changes
/// `raw_parity` directly rather than going through the table.
fn bit_contribution(bit: usize, nbits: usize) -> u32 {
    let offset = if nbits == 112 { 0 } else { 112 - 56 };
    if bit <= nbits - 24 {
        CHECKSUM_TABLE[bit - 1 + offset]
    } else {
        1 << (nbits - bit)
    }
}

/// A set of bit positions (1-indexed, MSB-first) that, when flipped, repair
/// a frame whose syndrome matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub bit_positions: Vec<usize>,
}

struct ErrorTable {
    /// keyed by (nbits, syndrome)
    single: HashMap<(usize, u32), usize>,
    two_bit: HashMap<(usize, u32), (usize, usize)>,
}

fn build_table(max_weight: usize) -> ErrorTable {
    let mut single = HashMap::new();
    let mut two_bit = HashMap::new();
    // ambiguous syndromes (same syndrome from >1 distinct pattern) must be
    // dropped, so we track which keys are poisoned as we discover them.
    let mut poisoned_two_bit: std::collections::HashSet<(usize, u32)> = Default::default();

    for &nbits in &[56usize, 112usize] {
        for bit in 1..=nbits {
            let syn = bit_contribution(bit, nbits);
            single.insert((nbits, syn), bit);
        }
        if max_weight >= 2 {
            for i in 1..=nbits {
                for j in (i + 1)..=nbits {
                    let syn = bit_contribution(i, nbits) ^ bit_contribution(j, nbits);
                    let key = (nbits, syn);
                    if poisoned_two_bit.contains(&key) {
                        continue;
                    }
                    if let Some(existing) = two_bit.get(&key) {
                        if *existing != (i, j) {
                            two_bit.remove(&key);
                            poisoned_two_bit.insert(key);
                        }
                    } else {
                        two_bit.insert(key, (i, j));
                    }
                }
            }
        }
    }

    ErrorTable { single, two_bit }
}

static TABLE_ONE_BIT: Lazy<ErrorTable> = Lazy::new(|| build_table(1));
static TABLE_TWO_BIT: Lazy<ErrorTable> = Lazy::new(|| build_table(2));

/// Looks up a syndrome and returns the bit positions that would need to be
/// flipped to clear it, provided a correction of weight `<= max_weight`
/// exists and is unambiguous at that weight. Returns `None` otherwise.
pub fn diagnose(syndrome: u32, nbits: usize, max_weight: u8) -> Option<ErrorInfo> {
    if syndrome == 0 {
        return Some(ErrorInfo { bit_positions: vec![] });
    }
    let table = if max_weight >= 2 { &*TABLE_TWO_BIT } else { &*TABLE_ONE_BIT };
    if let Some(&bit) = table.single.get(&(nbits, syndrome)) {
        return Some(ErrorInfo { bit_positions: vec![bit] });
    }
    if max_weight >= 2 {
        if let Some(&(i, j)) = table.two_bit.get(&(nbits, syndrome)) {
            return Some(ErrorInfo { bit_positions: vec![i, j] });
        }
    }
    None
}

/// XORs the bit positions named by `error` into `msg` in place.
pub fn apply(msg: &mut [u8], error: &ErrorInfo) {
    for &bit in &error.bit_positions {
        crate::bits::flip_bit(msg, bit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    #[test]
    fn clean_df17_syndrome_is_zero() {
        let msg = hex!("8D4840D6202CC371C32CE0576098");
        assert_eq!(checksum(&msg, 112), 0);
    }

    #[test]
    fn single_bit_error_is_diagnosed_and_repaired() {
        let mut msg = hex!("8D4840D6202CC371C32CE0576098");
        crate::bits::flip_bit(&mut msg, 42);
        let syn = checksum(&msg, 112);
        assert_ne!(syn, 0);
        let err = diagnose(syn, 112, 1).expect("single bit error should be diagnosable");
        assert_eq!(err.bit_positions, vec![42]);
        apply(&mut msg, &err);
        assert_eq!(checksum(&msg, 112), 0);
    }

    #[test]
    fn single_bit_error_in_the_parity_field_is_also_diagnosable() {
        let mut msg = hex!("8D4840D6202CC371C32CE0576098");
        crate::bits::flip_bit(&mut msg, 100);
        let syn = checksum(&msg, 112);
        assert_ne!(syn, 0);
        let err = diagnose(syn, 112, 1).expect("parity-field bit error should be diagnosable");
        assert_eq!(err.bit_positions, vec![100]);
        apply(&mut msg, &err);
        assert_eq!(checksum(&msg, 112), 0);
    }

    #[test]
    fn overlay_syndrome_recovers_address() {
        // DF4 surveillance reply: AP field is crc(data) XOR address, so the
        // syndrome over the whole frame recovers the address directly.
        let addr: u32 = 0x4ca251;
        let mut msg = [0x20u8, 0x00, 0x00, 0x00, 0, 0, 0];
        let crc = data_checksum(&msg[..4], 56);
        let ap = crc ^ addr;
        msg[4] = (ap >> 16) as u8;
        msg[5] = (ap >> 8) as u8;
        msg[6] = ap as u8;
        assert_eq!(checksum(&msg, 56), addr);
    }
}
