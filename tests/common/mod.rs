#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use home_energy_controller::controller::{ControllerSettings, EnergyController};
use home_energy_controller::domain::{ActuationCommand, Policy, Prediction, StatusReport};
use home_energy_controller::error::{ActuationError, FetchError, StatusError};
use home_energy_controller::forecast::PredictionSource;
use home_energy_controller::hardware::{ActuationSink, SimulatedRelayBank};
use home_energy_controller::status::StatusSink;

pub fn prediction(generation_w: f64, soc_hint_percent: f64) -> Prediction {
    Prediction {
        generation_w,
        consumption_w: 0.0,
        soc_hint_percent,
    }
}

/// Fixed local time on a summer day
pub fn at_hour(hour: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 1, hour, 0, 0)
        .unwrap()
}

pub fn manual_policy() -> Policy {
    Policy {
        auto_mode: false,
        ..Policy::default()
    }
}

/// Returns queued responses in order, then transport errors
#[derive(Default)]
pub struct ScriptedPredictionSource {
    responses: Mutex<VecDeque<Result<Prediction, FetchError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedPredictionSource {
    pub fn new(responses: Vec<Result<Prediction, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PredictionSource for ScriptedPredictionSource {
    async fn fetch_latest(&self) -> Result<Prediction, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("connection refused".into())))
    }
}

#[derive(Default)]
pub struct RecordingStatusSink {
    pub delivered: Mutex<Vec<StatusReport>>,
    pub fail: bool,
}

#[async_trait]
impl StatusSink for RecordingStatusSink {
    async fn deliver(&self, report: &StatusReport) -> Result<(), StatusError> {
        if self.fail {
            return Err(StatusError::Http { status: 503 });
        }
        self.delivered.lock().push(report.clone());
        Ok(())
    }
}

/// Relay bank that never answers
pub struct StalledActuator;

#[async_trait]
impl ActuationSink for StalledActuator {
    async fn apply(&self, _command: &ActuationCommand) -> Result<(), ActuationError> {
        std::future::pending().await
    }
}

pub struct Harness {
    pub controller: Arc<EnergyController>,
    pub source: Arc<ScriptedPredictionSource>,
    pub sink: Arc<RecordingStatusSink>,
    pub relays: SimulatedRelayBank,
}

pub fn harness(settings: ControllerSettings, source: ScriptedPredictionSource) -> Harness {
    harness_with_sink(settings, source, RecordingStatusSink::default())
}

pub fn harness_with_sink(
    settings: ControllerSettings,
    source: ScriptedPredictionSource,
    sink: RecordingStatusSink,
) -> Harness {
    let source = Arc::new(source);
    let sink = Arc::new(sink);
    let relays = SimulatedRelayBank::new();
    let controller = Arc::new(EnergyController::new(
        settings,
        source.clone(),
        sink.clone(),
        Arc::new(relays.clone()),
    ));
    Harness {
        controller,
        source,
        sink,
        relays,
    }
}
