//! Power balance for one control cycle: generation against the active load.

pub mod snapshot;

pub use snapshot::{sanitize_generation, PowerSnapshot};
