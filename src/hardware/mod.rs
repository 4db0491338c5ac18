pub mod relay;

pub use relay::{ActuationSink, SimulatedRelayBank};
