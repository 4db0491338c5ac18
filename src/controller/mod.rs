pub mod decision;
pub mod priority;
pub mod safety;
pub mod totals;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use parking_lot::Mutex;
use std::mem::{discriminant, Discriminant};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{Config, SocHintPolicy};
use crate::domain::{ActuationCommand, BatteryStatus, Policy, Prediction, StatusReport, SystemMode};
use crate::error::{ActuationError, FetchError, StatusError};
use crate::forecast::{HttpPredictionSource, PredictionCache, PredictionSource, SharedPredictions};
use crate::hardware::{ActuationSink, SimulatedRelayBank};
use crate::status::{DiscardStatusSink, HttpStatusSink, StatusSink};

pub use decision::{efficiency_percent, run_cycle, CycleInputs, CycleOutcome, SystemState};
pub use priority::{apply_priorities, PriorityDecision, PriorityInputs};
pub use safety::{SafetyEvent, SafetyMonitor, SafetyRecord};
pub use totals::EnergyTotals;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<EnergyController>,
}

impl AppState {
    pub fn new(cfg: Config) -> Result<Self> {
        let prediction_source: Arc<dyn PredictionSource> = Arc::new(HttpPredictionSource::new(
            cfg.prediction.base_url.clone(),
            Duration::from_secs(cfg.prediction.http_timeout_secs),
        )?);
        let status_sink: Arc<dyn StatusSink> = if cfg.status.enabled {
            Arc::new(HttpStatusSink::new(
                cfg.status.base_url.clone(),
                Duration::from_secs(cfg.status.http_timeout_secs),
            )?)
        } else {
            Arc::new(DiscardStatusSink)
        };
        let actuator: Arc<dyn ActuationSink> = Arc::new(SimulatedRelayBank::new());

        let controller = Arc::new(EnergyController::new(
            ControllerSettings::from_config(&cfg),
            prediction_source,
            status_sink,
            actuator,
        ));

        Ok(Self { cfg, controller })
    }

    pub fn initial_state(&self) -> SystemState {
        SystemState::new(
            self.cfg.battery.to_state(),
            self.cfg.roster(),
            self.cfg.water_heater(),
        )
    }
}

pub fn spawn_controller_tasks(state: AppState) {
    let initial = state.initial_state();

    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.run_decision_loop(initial).await;
    });

    let controller2 = state.controller.clone();
    tokio::spawn(async move {
        controller2.run_prediction_loop().await;
    });

    let controller3 = state.controller.clone();
    tokio::spawn(async move {
        controller3.run_status_loop().await;
    });
}

/// Runtime knobs of the controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub policy: Policy,
    pub cycle_interval: Duration,
    pub actuation_timeout: Duration,
    pub fetch_interval: Duration,
    pub fetch_timeout: Duration,
    pub status_interval: Duration,
    pub status_timeout: Duration,
    pub grid_available: bool,
    pub soc_hint: SocHintPolicy,
}

impl ControllerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            policy: cfg.policy.clone(),
            cycle_interval: cfg.controller.cycle_interval(),
            actuation_timeout: cfg.controller.actuation_timeout(),
            fetch_interval: Duration::from_secs(cfg.prediction.fetch_interval_secs),
            fetch_timeout: Duration::from_secs(cfg.prediction.http_timeout_secs),
            status_interval: Duration::from_secs(cfg.status.interval_secs),
            status_timeout: Duration::from_secs(cfg.status.http_timeout_secs),
            grid_available: cfg.controller.grid_available,
            soc_hint: cfg.controller.soc_hint,
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives the decision cycle and its I/O.
///
/// The decision loop owns the [`SystemState`]; the prediction task only writes
/// the shared cache and the status task only reads the latest report, so no
/// two cycles ever run at once.
pub struct EnergyController {
    settings: ControllerSettings,
    prediction_source: Arc<dyn PredictionSource>,
    status_sink: Arc<dyn StatusSink>,
    actuator: Arc<dyn ActuationSink>,
    predictions: SharedPredictions,
    reports: watch::Sender<Option<StatusReport>>,
    safety: Mutex<SafetyMonitor>,
    totals: Mutex<EnergyTotals>,
    /// Cache sequence of the last SoC hint applied to the battery model
    hint_sequence: AtomicU64,
    last_mode: Mutex<Option<SystemMode>>,
    /// Event kinds raised by the previous cycle; repeats are not re-recorded
    active_events: Mutex<Vec<Discriminant<SafetyEvent>>>,
}

impl EnergyController {
    pub fn new(
        settings: ControllerSettings,
        prediction_source: Arc<dyn PredictionSource>,
        status_sink: Arc<dyn StatusSink>,
        actuator: Arc<dyn ActuationSink>,
    ) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            settings,
            prediction_source,
            status_sink,
            actuator,
            predictions: PredictionCache::shared(),
            reports,
            safety: Mutex::new(SafetyMonitor::new()),
            totals: Mutex::new(EnergyTotals::new(Local::now().date_naive())),
            hint_sequence: AtomicU64::new(0),
            last_mode: Mutex::new(None),
            active_events: Mutex::new(Vec::new()),
        }
    }

    pub async fn run_decision_loop(&self, mut state: SystemState) {
        let mut interval = tokio::time::interval(self.settings.cycle_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            cycle_interval_ms = self.settings.cycle_interval.as_millis() as u64,
            devices = state.devices.len(),
            soc_percent = state.battery.soc_percent,
            "decision loop started"
        );
        loop {
            interval.tick().await;
            let now: DateTime<FixedOffset> = Local::now().fixed_offset();
            self.step(&mut state, now).await;
        }
    }

    /// Run one cycle against the current prediction cache, apply and publish
    /// its results, and advance `state`.
    pub async fn step(&self, state: &mut SystemState, now: DateTime<FixedOffset>) -> CycleOutcome {
        let predictions = self.predictions.read().await.clone();
        self.apply_soc_hint(state, &predictions);

        let inputs = CycleInputs {
            generation_w: predictions.generation_w(),
            local_hour: now.hour(),
            interval: self.settings.cycle_interval,
            grid_available: self.settings.grid_available,
        };
        let outcome = run_cycle(state, &inputs, &self.settings.policy);

        for err in &outcome.config_errors {
            warn!(error=%err, "cycle input clamped");
        }

        if let Err(e) = self.actuate(&outcome.command).await {
            warn!(error=%e, "actuation failed, next cycle re-asserts state");
        }

        self.record_events(now.with_timezone(&Utc), &outcome.events);
        self.totals.lock().record(
            now.date_naive(),
            outcome.snapshot.generation_w,
            outcome.snapshot.total_load_w,
            outcome.grid_import_w(),
            inputs.interval,
        );

        let previous = self.last_mode.lock().replace(outcome.mode);
        if previous != Some(outcome.mode) {
            info!(
                from = ?previous,
                to = %outcome.mode,
                soc_percent = outcome.state.battery.soc_percent,
                "mode changed"
            );
        }
        debug!(
            mode = %outcome.mode,
            snapshot = %outcome.snapshot,
            battery = %BatteryStatus::from_applied_w(outcome.battery_applied_w),
            battery_w = outcome.battery_applied_w,
            soc_percent = outcome.state.battery.soc_percent,
            grid = outcome.state.grid_engaged,
            efficiency_percent = outcome.efficiency_percent,
            "control tick"
        );

        self.reports.send_replace(Some(outcome.report.clone()));
        *state = outcome.state.clone();
        outcome
    }

    async fn actuate(&self, command: &ActuationCommand) -> Result<(), ActuationError> {
        let timeout = self.settings.actuation_timeout;
        match tokio::time::timeout(timeout, self.actuator.apply(command)).await {
            Ok(result) => result,
            Err(_) => Err(ActuationError::Timeout(timeout)),
        }
    }

    fn apply_soc_hint(&self, state: &mut SystemState, predictions: &PredictionCache) {
        let Some(prediction) = predictions.latest() else {
            return;
        };
        let sequence = predictions.sequence();
        let applied = self.hint_sequence.load(Ordering::SeqCst);
        let apply = match self.settings.soc_hint {
            SocHintPolicy::Startup => applied == 0,
            SocHintPolicy::EveryFetch => sequence > applied,
            SocHintPolicy::Ignore => false,
        };
        if !apply {
            return;
        }
        self.hint_sequence.store(sequence, Ordering::SeqCst);
        let previous = state.battery.soc_percent;
        state.battery = state.battery.clone().with_soc(prediction.soc_hint_percent);
        info!(
            from_percent = previous,
            soc_percent = state.battery.soc_percent,
            "battery SoC set from prediction"
        );
    }

    fn record_events(&self, at: DateTime<Utc>, events: &[SafetyEvent]) {
        let kinds: Vec<_> = events.iter().map(discriminant).collect();
        let mut active = self.active_events.lock();
        let mut safety = self.safety.lock();
        for event in events {
            if !active.contains(&discriminant(event)) {
                safety.record(at, event.clone());
            }
        }
        *active = kinds;
    }

    /// Fetch once and update the shared cache; on failure the previous
    /// prediction stays in effect.
    pub async fn refresh_prediction(&self) -> Result<Prediction, FetchError> {
        let timeout = self.settings.fetch_timeout;
        let result =
            match tokio::time::timeout(timeout, self.prediction_source.fetch_latest()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(timeout)),
            };

        let mut cache = self.predictions.write().await;
        match &result {
            Ok(prediction) => {
                cache.publish(prediction.clone(), Utc::now());
                info!(
                    generation_w = prediction.generation_w,
                    consumption_w = prediction.consumption_w,
                    soc_hint_percent = prediction.soc_hint_percent,
                    "prediction updated"
                );
            }
            Err(e) => {
                cache.record_failure(e.clone());
                warn!(
                    error=%e,
                    consecutive_failures = cache.consecutive_failures(),
                    generation_w = cache.generation_w(),
                    "prediction fetch failed, keeping last values"
                );
            }
        }
        result
    }

    pub async fn run_prediction_loop(&self) {
        let mut interval = tokio::time::interval(self.settings.fetch_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let _ = self.refresh_prediction().await;
        }
    }

    /// Deliver the latest report once, if any cycle has completed
    pub async fn push_status(&self) -> Option<Result<(), StatusError>> {
        let report = self.latest_report()?;
        let timeout = self.settings.status_timeout;
        let result = match tokio::time::timeout(timeout, self.status_sink.deliver(&report)).await {
            Ok(result) => result,
            Err(_) => Err(StatusError::Timeout(timeout)),
        };
        match &result {
            Ok(()) => debug!(report = %report, "status delivered"),
            Err(e) => warn!(error=%e, "status delivery failed"),
        }
        Some(result)
    }

    pub async fn run_status_loop(&self) {
        let mut interval = tokio::time::interval(self.settings.status_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let _ = self.push_status().await;
        }
    }

    pub fn latest_report(&self) -> Option<StatusReport> {
        self.reports.borrow().clone()
    }

    pub fn subscribe_reports(&self) -> watch::Receiver<Option<StatusReport>> {
        self.reports.subscribe()
    }

    pub async fn predictions(&self) -> PredictionCache {
        self.predictions.read().await.clone()
    }

    pub fn recent_events(&self, count: usize) -> Vec<SafetyRecord> {
        self.safety.lock().recent_events(count)
    }

    /// Safety events currently held in the bounded history
    pub fn event_count(&self) -> usize {
        self.safety.lock().len()
    }

    pub fn totals(&self) -> EnergyTotals {
        self.totals.lock().clone()
    }
}
