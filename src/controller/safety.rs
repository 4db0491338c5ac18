use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{error, warn};

/// Safety-relevant decisions taken by the decision loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SafetyEvent {
    /// Non-critical loads were force-deactivated
    LoadShed {
        soc_percent: f64,
        limit_percent: f64,
        devices: Vec<String>,
    },
    /// Battery is at or below its reserve floor during a deficit
    ReserveFloorReached {
        soc_percent: f64,
        floor_percent: f64,
    },
    /// Grid import was requested but no grid connection is available
    GridUnavailable { deficit_w: f64 },
}

/// Recorded safety event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyRecord {
    pub timestamp: DateTime<Utc>,
    pub event: SafetyEvent,
}

/// Bounded history of safety events
pub struct SafetyMonitor {
    last_events: VecDeque<SafetyRecord>,
    max_event_history: usize,
}

impl SafetyMonitor {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(max_event_history: usize) -> Self {
        Self {
            last_events: VecDeque::new(),
            max_event_history: max_event_history.max(1),
        }
    }

    /// Record and log an event
    pub fn record(&mut self, timestamp: DateTime<Utc>, event: SafetyEvent) {
        match &event {
            SafetyEvent::LoadShed {
                soc_percent,
                limit_percent,
                devices,
            } => {
                error!(
                    soc_percent,
                    limit_percent,
                    devices = ?devices,
                    "CRITICAL: battery below critical SoC without grid - load shedding activated"
                );
            }
            SafetyEvent::ReserveFloorReached {
                soc_percent,
                floor_percent,
            } => {
                warn!(soc_percent, floor_percent, "battery at reserve floor");
            }
            SafetyEvent::GridUnavailable { deficit_w } => {
                warn!(deficit_w, "grid import required but grid is unavailable");
            }
        }

        self.last_events.push_back(SafetyRecord { timestamp, event });
        if self.last_events.len() > self.max_event_history {
            self.last_events.pop_front();
        }
    }

    /// Most recent events, oldest first
    pub fn recent_events(&self, count: usize) -> Vec<SafetyRecord> {
        let start = self.last_events.len().saturating_sub(count);
        self.last_events.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.last_events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_events.is_empty()
    }
}

impl Default for SafetyMonitor {
    fn default() -> Self {
        Self::new()
    }
}
