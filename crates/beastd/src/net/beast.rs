//! Beast binary framing (§6): `0x1A` escape, a one-byte message type, a
//! 6-byte big-endian 12 MHz timestamp, a signal byte, and a 2/7/14-byte
//! payload, with every `0x1A` inside doubled.

const ESC: u8 = 0x1A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    ModeAc,
    ModeSShort,
    ModeSLong,
    Status,
}

impl MessageType {
    fn tag(self) -> u8 {
        match self {
            MessageType::ModeAc => b'1',
            MessageType::ModeSShort => b'2',
            MessageType::ModeSLong => b'3',
            MessageType::Status => b'4',
        }
    }

    fn payload_len(tag: u8) -> Option<usize> {
        match tag {
            b'1' => Some(2),
            b'2' => Some(7),
            b'3' => Some(14),
            b'4' => Some(14),
            b'5' => Some(8),
            b'H' => Some(24),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub tag: u8,
    pub timestamp_12mhz: u64,
    pub signal: u8,
    pub payload: Vec<u8>,
}

/// Doubles every `0x1A` byte and wraps the result in the escape/type/
/// timestamp/signal header.
pub fn encode_frame(msg_type: MessageType, timestamp_12mhz: u64, signal: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 6 + 1 + payload.len() * 2);
    out.push(ESC);
    out.push(msg_type.tag());
    for shift in (0..6).rev() {
        let byte = ((timestamp_12mhz >> (shift * 8)) & 0xff) as u8;
        out.push(byte);
        if byte == ESC {
            out.push(ESC);
        }
    }
    out.push(signal);
    if signal == ESC {
        out.push(ESC);
    }
    for &byte in payload {
        out.push(byte);
        if byte == ESC {
            out.push(ESC);
        }
    }
    out
}

/// The zero-body keepalive frame (§6 "Heartbeats"): an 11-byte type-`1`
/// frame with an all-zero body.
pub fn heartbeat_frame() -> Vec<u8> {
    encode_frame(MessageType::ModeAc, 0, 0, &[0, 0])
}

/// Streaming Beast decoder: feed it bytes as they arrive off the wire,
/// get back complete frames as they're assembled. Handles the doubled-
/// `0x1A` escaping and the variable payload length per message type.
#[derive(Debug, Default)]
pub struct Decoder {
    state: State,
    tag: u8,
    header: Vec<u8>,
    header_len: usize,
    pending_escape: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    SawEscape,
    InFrame,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte; returns a completed frame if this byte finished one.
    pub fn feed(&mut self, byte: u8) -> Option<RawFrame> {
        match self.state {
            State::Idle => {
                if byte == ESC {
                    self.state = State::SawEscape;
                }
                None
            }
            State::SawEscape => {
                if MessageType::payload_len(byte).is_some() {
                    self.tag = byte;
                    self.header.clear();
                    self.header_len = 7 + MessageType::payload_len(byte).unwrap();
                    self.pending_escape = false;
                    self.state = State::InFrame;
                } else if byte == ESC {
                    // doubled escape outside a frame: stay put, ignore
                } else {
                    self.state = State::Idle;
                }
                None
            }
            State::InFrame => {
                if self.pending_escape {
                    self.pending_escape = false;
                    self.header.push(byte);
                } else if byte == ESC {
                    self.pending_escape = true;
                    return None;
                } else {
                    self.header.push(byte);
                }

                if self.header.len() < self.header_len {
                    return None;
                }

                self.state = State::Idle;
                let timestamp_12mhz = self.header[..6]
                    .iter()
                    .fold(0u64, |acc, &b| (acc << 8) | b as u64);
                let signal = self.header[6];
                let payload = self.header[7..].to_vec();
                Some(RawFrame { tag: self.tag, timestamp_12mhz, signal, payload })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexlit::hex;

    #[test]
    fn round_trips_a_mode_s_long_frame() {
        let payload = hex!("8D4840D6202CC371C32CE0576098");
        let encoded = encode_frame(MessageType::ModeSLong, 0x1234_5678_9abc, 0x7f, &payload);
        let mut dec = Decoder::new();
        let mut got = None;
        for &b in &encoded {
            if let Some(f) = dec.feed(b) {
                got = Some(f);
            }
        }
        let frame = got.expect("a frame was assembled");
        assert_eq!(frame.tag, b'3');
        assert_eq!(frame.timestamp_12mhz, 0x1234_5678_9abc);
        assert_eq!(frame.signal, 0x7f);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn escapes_0x1a_bytes_inside_the_payload() {
        let payload = [0x1A, 0x00, 0x1A];
        let encoded = encode_frame(MessageType::ModeSShort, 0, 0, &payload);
        // every literal 0x1A in header+payload is doubled
        assert!(encoded.windows(2).filter(|w| w == &[0x1A, 0x1A]).count() >= 2);
        let mut dec = Decoder::new();
        let mut got = None;
        for &b in &encoded {
            if let Some(f) = dec.feed(b) {
                got = Some(f);
            }
        }
        assert_eq!(got.unwrap().payload, payload);
    }

    #[test]
    fn heartbeat_is_eleven_bytes() {
        assert_eq!(heartbeat_frame().len(), 11);
    }
}
