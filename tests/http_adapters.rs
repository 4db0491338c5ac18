mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::at_hour;
use home_energy_controller::controller::{ControllerSettings, EnergyController, SystemState};
use home_energy_controller::domain::{StatusReport, SystemMode};
use home_energy_controller::error::{FetchError, StatusError};
use home_energy_controller::forecast::{HttpPredictionSource, PredictionSource};
use home_energy_controller::hardware::SimulatedRelayBank;
use home_energy_controller::status::{HttpStatusSink, StatusSink};

const TIMEOUT: Duration = Duration::from_secs(2);

fn source(server: &MockServer) -> HttpPredictionSource {
    HttpPredictionSource::new(server.uri(), TIMEOUT).unwrap()
}

fn report() -> StatusReport {
    StatusReport {
        generation_w: 2500.0,
        total_load_w: 1800.0,
        soc_percent: 75.0,
        grid_engaged: false,
        efficiency_percent: 72.0,
        mode: SystemMode::Surplus,
        devices: vec![],
    }
}

#[tokio::test]
async fn fetches_prediction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/current_prediction"))
        .and(header("user-agent", "home-energy-controller/0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pv_power": 2500.0,
            "consumption": 900.0,
            "battery_soc": 80.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let prediction = source(&server).fetch_latest().await.unwrap();

    assert_eq!(prediction.generation_w, 2500.0);
    assert_eq!(prediction.consumption_w, 900.0);
    assert_eq!(prediction.soc_hint_percent, 80.0);
}

#[tokio::test]
async fn missing_fields_take_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/current_prediction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let prediction = source(&server).fetch_latest().await.unwrap();

    assert_eq!(prediction.generation_w, 0.0);
    assert_eq!(prediction.consumption_w, 0.0);
    assert_eq!(prediction.soc_hint_percent, 70.0);
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = source(&server).fetch_latest().await.unwrap_err();

    assert_eq!(
        err,
        FetchError::Http {
            status: 500,
            body: "boom".into()
        }
    );
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = source(&server).fetch_latest().await.unwrap_err();
    assert!(matches!(err, FetchError::Parse(_)));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"pv_power": 1.0}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let source = HttpPredictionSource::new(server.uri(), Duration::from_millis(100)).unwrap();
    let err = source.fetch_latest().await.unwrap_err();
    assert_eq!(err, FetchError::Timeout(Duration::from_millis(100)));
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let source = HttpPredictionSource::new("http://127.0.0.1:1".to_string(), TIMEOUT).unwrap();
    let err = source.fetch_latest().await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn posts_status_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/update_status"))
        .and(body_partial_json(json!({
            "pv_power": 2500.0,
            "consumption": 1800.0,
            "battery_soc": 75.0,
            "grid_power": false,
            "efficiency": 72.0
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sink = HttpStatusSink::new(format!("{}/", server.uri()), TIMEOUT).unwrap();
    assert_eq!(sink.deliver(&report()).await, Ok(()));
}

#[tokio::test]
async fn status_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sink = HttpStatusSink::new(server.uri(), TIMEOUT).unwrap();
    assert_eq!(
        sink.deliver(&report()).await,
        Err(StatusError::Http { status: 503 })
    );
}

#[tokio::test]
async fn controller_round_trip_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/current_prediction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pv_power": 2500.0,
            "consumption": 1800.0,
            "battery_soc": 75.0
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/update_status"))
        .and(body_partial_json(json!({ "pv_power": 2500.0 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let relays = SimulatedRelayBank::new();
    let controller = EnergyController::new(
        ControllerSettings::default(),
        Arc::new(source(&server)),
        Arc::new(HttpStatusSink::new(server.uri(), TIMEOUT).unwrap()),
        Arc::new(relays.clone()),
    );

    controller.refresh_prediction().await.unwrap();
    let mut state = SystemState::default();
    let out = controller.step(&mut state, at_hour(12)).await;

    assert_eq!(out.snapshot.generation_w, 2500.0);
    assert_eq!(state.battery.soc_percent, out.state.battery.soc_percent);
    assert_eq!(relays.last_command().await, Some(out.command));
    assert_eq!(controller.push_status().await, Some(Ok(())));
}
