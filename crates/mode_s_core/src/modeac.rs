//! Gillham bit-interleaving, shared by Mode-C altitude and Mode-A squawk
//! decoding (§4.3 steps 9–11).

/// Regroups a raw 13-bit `C1 A1 C2 A2 C4 A4 X B1 D1 B2 D2 B4 D4` field (MSB
/// first, bit 6 = X/M unused here) into the interleaved layout
/// [`mode_c_to_altitude`] expects.
pub fn id13_to_gillham(id13: u16) -> u16 {
    let id13 = id13 as u32;
    let mut hex_gillham: u32 = 0;
    if id13 & 0x1000 != 0 {
        hex_gillham |= 0x0010; // C1
    }
    if id13 & 0x0800 != 0 {
        hex_gillham |= 0x1000; // A1
    }
    if id13 & 0x0400 != 0 {
        hex_gillham |= 0x0020; // C2
    }
    if id13 & 0x0200 != 0 {
        hex_gillham |= 0x2000; // A2
    }
    if id13 & 0x0100 != 0 {
        hex_gillham |= 0x0040; // C4
    }
    if id13 & 0x0080 != 0 {
        hex_gillham |= 0x4000; // A4
    }
    if id13 & 0x0020 != 0 {
        hex_gillham |= 0x0100; // B1
    }
    if id13 & 0x0010 != 0 {
        hex_gillham |= 0x0001; // D1
    }
    if id13 & 0x0008 != 0 {
        hex_gillham |= 0x0200; // B2
    }
    if id13 & 0x0004 != 0 {
        hex_gillham |= 0x0002; // D2
    }
    if id13 & 0x0002 != 0 {
        hex_gillham |= 0x0400; // B4
    }
    if id13 & 0x0001 != 0 {
        hex_gillham |= 0x0004; // D4
    }
    hex_gillham as u16
}

/// Resolves a 13-bit Gillham-coded Mode-C altitude field to feet. Returns
/// `None` for an invalid/unassigned code.
pub fn mode_c_to_altitude(mode_a: u16) -> Option<i32> {
    let mode_a = mode_a as u32;
    let mut five_hundreds: i32 = 0;
    let mut one_hundreds: i32 = 0;

    if (mode_a & 0xffff_8889) != 0 || (mode_a & 0x0000_00f0) == 0 {
        return None;
    }

    if mode_a & 0x0010 != 0 {
        one_hundreds ^= 0x007; // C1
    }
    if mode_a & 0x0020 != 0 {
        one_hundreds ^= 0x003; // C2
    }
    if mode_a & 0x0040 != 0 {
        one_hundreds ^= 0x001; // C4
    }
    if one_hundreds & 5 == 5 {
        one_hundreds ^= 2;
    }
    if one_hundreds > 5 {
        return None;
    }

    if mode_a & 0x0002 != 0 {
        five_hundreds ^= 0x0ff; // D2
    }
    if mode_a & 0x0004 != 0 {
        five_hundreds ^= 0x07f; // D4
    }
    if mode_a & 0x1000 != 0 {
        five_hundreds ^= 0x03f; // A1
    }
    if mode_a & 0x2000 != 0 {
        five_hundreds ^= 0x01f; // A2
    }
    if mode_a & 0x4000 != 0 {
        five_hundreds ^= 0x00f; // A4
    }
    if mode_a & 0x0100 != 0 {
        five_hundreds ^= 0x007; // B1
    }
    if mode_a & 0x0200 != 0 {
        five_hundreds ^= 0x003; // B2
    }
    if mode_a & 0x0400 != 0 {
        five_hundreds ^= 0x001; // B4
    }

    if five_hundreds & 1 != 0 && one_hundreds <= 6 {
        one_hundreds = 6 - one_hundreds;
    }

    let n = (five_hundreds * 5) + one_hundreds;
    if n < 13 {
        return None;
    }
    Some((n - 13) * 100)
}

/// Decodes a 13-bit squawk/identity field
/// (`C1 A1 C2 A2 C4 A4 X B1 D1 B2 D2 B4 D4`) into a 4-digit octal squawk
/// represented as a hex value whose digits read like octal (§4.3 step 9).
pub fn decode_squawk(id13: u16) -> u16 {
    let c1 = (id13 >> 12) & 1;
    let a1 = (id13 >> 11) & 1;
    let c2 = (id13 >> 10) & 1;
    let a2 = (id13 >> 9) & 1;
    let c4 = (id13 >> 8) & 1;
    let a4 = (id13 >> 7) & 1;
    // bit 6 (X) is unused/spare
    let b1 = (id13 >> 5) & 1;
    let d1 = (id13 >> 4) & 1;
    let b2 = (id13 >> 3) & 1;
    let d2 = (id13 >> 2) & 1;
    let b4 = (id13 >> 1) & 1;
    let d4 = id13 & 1;

    let a = (a4 << 2) | (a2 << 1) | a1;
    let b = (b4 << 2) | (b2 << 1) | b1;
    let c = (c4 << 2) | (c2 << 1) | c1;
    let d = (d4 << 2) | (d2 << 1) | d1;

    (a as u16) * 0x1000 + (b as u16) * 0x100 + (c as u16) * 0x10 + (d as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_c_decodes_a_known_field_to_5000_feet() {
        assert_eq!(mode_c_to_altitude(0x4220), Some(5000));
    }

    #[test]
    fn mode_c_rejects_the_spare_bit_pattern() {
        assert_eq!(mode_c_to_altitude(0x0089), None);
    }

    #[test]
    fn squawk_7700_roundtrips_through_gillham() {
        // A=7, B=7, C=0, D=0 -> reconstruct id13 from the same interleaving
        // used by decode_squawk and check we read back 0x7700.
        let a = 7u16;
        let b = 7u16;
        let c = 0u16;
        let d = 0u16;
        let a1 = (a >> 0) & 1;
        let a2 = (a >> 1) & 1;
        let a4 = (a >> 2) & 1;
        let b1 = (b >> 0) & 1;
        let b2 = (b >> 1) & 1;
        let b4 = (b >> 2) & 1;
        let c1 = (c >> 0) & 1;
        let c2 = (c >> 1) & 1;
        let c4 = (c >> 2) & 1;
        let d1 = (d >> 0) & 1;
        let d2 = (d >> 1) & 1;
        let d4 = (d >> 2) & 1;
        let id13 = (c1 << 12)
            | (a1 << 11)
            | (c2 << 10)
            | (a2 << 9)
            | (c4 << 8)
            | (a4 << 7)
            | (b1 << 5)
            | (d1 << 4)
            | (b2 << 3)
            | (d2 << 2)
            | (b4 << 1)
            | d4;
        assert_eq!(decode_squawk(id13), 0x7700);
    }
}
