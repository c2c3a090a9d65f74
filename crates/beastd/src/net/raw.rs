//! AVR/raw ASCII framing (§6): lines ending in `;`, optionally prefixed by
//! `*`, `:`, `@` (timestamp), `%` (CRC-OK timestamp), or `<` (timestamp +
//! signal).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub payload: Vec<u8>,
    pub timestamp_12mhz: Option<u64>,
    pub signal: Option<u8>,
    pub crc_ok: bool,
}

/// Parses one raw line (without its trailing `;`/newline already stripped
/// or not — both are tolerated).
pub fn parse_line(line: &str) -> Option<RawLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let line = line.strip_suffix(';').unwrap_or(line);
    if line.is_empty() {
        return None;
    }

    let (prefix, rest) = line.split_at(1);
    let (crc_ok, has_timestamp, has_signal) = match prefix {
        "*" => (false, false, false),
        ":" => (false, false, false),
        "@" => (false, true, false),
        "%" => (true, true, false),
        "<" => (false, true, true),
        _ => return None,
    };

    let mut rest = rest;
    let timestamp_12mhz = if has_timestamp {
        if rest.len() < 12 {
            return None;
        }
        let (ts_hex, tail) = rest.split_at(12);
        rest = tail;
        u64::from_str_radix(ts_hex, 16).ok()
    } else {
        None
    };

    let signal = if has_signal {
        if rest.len() < 2 {
            return None;
        }
        let (sig_hex, tail) = rest.split_at(2);
        rest = tail;
        u8::from_str_radix(sig_hex, 16).ok()
    } else {
        None
    };

    let payload = hex::decode(rest).ok()?;
    if payload.is_empty() {
        return None;
    }
    Some(RawLine { payload, timestamp_12mhz, signal, crc_ok })
}

/// Encodes a frame as `*HHHH…;\n`, or `@TTTTTTTTTTTT` + hex + `;\n` if a
/// timestamp is supplied.
pub fn encode_line(payload: &[u8], timestamp_12mhz: Option<u64>) -> String {
    let hex_payload = hex::encode_upper(payload);
    match timestamp_12mhz {
        Some(ts) => format!("@{ts:012X}{hex_payload};\n"),
        None => format!("*{hex_payload};\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    #[test]
    fn parses_a_bare_star_prefixed_line() {
        let line = parse_line("*8D4840D6202CC371C32CE0576098;\n").unwrap();
        assert_eq!(line.payload, hex!("8D4840D6202CC371C32CE0576098"));
        assert_eq!(line.timestamp_12mhz, None);
    }

    #[test]
    fn parses_a_timestamped_crc_ok_line() {
        let line = parse_line("%0000000000018D4840D6202CC371C32CE0576098;").unwrap();
        assert!(line.crc_ok);
        assert_eq!(line.timestamp_12mhz, Some(0x18));
    }

    #[test]
    fn round_trips_through_encode() {
        let payload = hex!("8D4840D6202CC371C32CE0576098");
        let encoded = encode_line(&payload, None);
        let parsed = parse_line(&encoded).unwrap();
        assert_eq!(parsed.payload, payload);
    }
}
