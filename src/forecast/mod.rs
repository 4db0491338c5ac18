pub mod cache;
pub mod prediction;

pub use cache::*;
pub use prediction::*;
