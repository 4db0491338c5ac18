use std::time::Duration;
use thiserror::Error;

/// Prediction source failures. Never fatal: the controller keeps using the
/// last successfully fetched prediction.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("Prediction transport error: {0}")]
    Transport(String),
    #[error("Prediction API error: HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Prediction payload could not be parsed: {0}")]
    Parse(String),
    #[error("Prediction fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Invalid configuration or input values. Each one is clamped to a safe
/// value and reported; the cycle continues.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("Negative or non-finite generation {value}W clamped to 0W")]
    NegativeGeneration { value: f64 },
    #[error("Device {device} has invalid load {value}W, clamped to 0W")]
    NegativeLoad { device: String, value: f64 },
    #[error("Battery capacity {value}Wh is invalid, using {fallback}Wh")]
    InvalidCapacity { value: f64, fallback: f64 },
    #[error("{field} efficiency {value} is outside (0, 1], using {fallback}")]
    InvalidEfficiency {
        field: &'static str,
        value: f64,
        fallback: f64,
    },
    #[error("{field} = {value}% is outside [0, 100], clamped to {clamped}%")]
    PercentOutOfRange {
        field: &'static str,
        value: f64,
        clamped: f64,
    },
    #[error("{field} = {value}W is negative, clamped to 0W")]
    NegativePower { field: &'static str, value: f64 },
    #[error("Daylight window {start}..={end} is invalid, using 6..=18")]
    InvalidDaylightWindow { start: u32, end: u32 },
    #[error("{field} interval must be positive, using {fallback_ms}ms")]
    ZeroInterval { field: &'static str, fallback_ms: u64 },
    #[error("{field} must be positive, using {fallback}")]
    ZeroTimeout { field: &'static str, fallback: u64 },
    #[error("{upper_field} = {upper}% must not be below {lower_field} = {lower}%, using defaults")]
    InvertedThresholds {
        lower_field: &'static str,
        lower: f64,
        upper_field: &'static str,
        upper: f64,
    },
}

/// The actuation sink failed to apply a command. Reported, not retried
/// within the cycle; the next cycle re-asserts the full desired state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActuationError {
    #[error("Actuator unavailable: {0}")]
    Unavailable(String),
    #[error("Actuator did not respond within {0:?}")]
    Timeout(Duration),
}

/// Status sink delivery failures. Best-effort; logged and dropped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StatusError {
    #[error("Status transport error: {0}")]
    Transport(String),
    #[error("Status API error: HTTP {status}")]
    Http { status: u16 },
    #[error("Status delivery timed out after {0:?}")]
    Timeout(Duration),
}
