#![deny(missing_docs)]
#![doc = "Core error, canonical serialization and phase timing primitives shared by the GSW crates."]

pub mod errors;
/// Canonical hashing helpers.
pub mod hash;
pub mod provenance;
pub mod serde;
pub mod timer;

pub use crate::serde::{
    from_json_slice, from_json_value, to_canonical_json_bytes, to_canonical_value,
};
pub use errors::{ErrorInfo, SweepError};
pub use hash::stable_hash_string;
pub use provenance::RunProvenance;
pub use timer::{timed, PhaseLog, PhaseOutcome, PhaseTimer, PhaseTiming};
