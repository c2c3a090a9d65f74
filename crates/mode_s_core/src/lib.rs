//! Bit-accurate Mode S / ADS-B / TIS-B frame decoder, CRC engine, address
//! filter and CPR decoder.
//!
//! Layered bottom-up: [`bits`] is raw bit extraction, [`crc`] and [`filter`]
//! validate and recover addresses, [`modeac`] resolves Gillham-coded
//! altitude/squawk fields, [`cpr`] resolves position pairs, [`decode`] ties
//! all of the above into [`message::DownlinkMessage`], and [`scorer`] offers
//! a cheaper pre-decode plausibility check for demodulators juggling several
//! candidate frames.

pub mod bits;
pub mod cpr;
pub mod crc;
pub mod decode;
pub mod filter;
pub mod message;
pub mod modeac;
pub mod scorer;

pub mod prelude {
    pub use crate::decode::{decode_frame, DecodeError};
    pub use crate::filter::AddressFilter;
    pub use crate::message::{
        AddressType, Altitude, AltitudeUnit, CprHalf, DownlinkMessage, GroundSpeed, HeadingKind,
        Provenance, Validity,
    };
    pub use crate::scorer::score;
}
