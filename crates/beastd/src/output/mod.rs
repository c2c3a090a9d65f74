//! Output formats driven by the tracker's emission schedule (§4.7, §6).

pub mod fatsv;
pub mod snapshot;
pub mod vrs_json;
