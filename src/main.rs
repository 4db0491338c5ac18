use anyhow::Result;
use home_energy_controller::{api, config, controller, telemetry};
use config::Config;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing()?;

    let mut cfg = Config::load()?;
    for err in cfg.sanitize() {
        warn!(error=%err, "configuration value corrected");
    }

    let app_state = controller::AppState::new(cfg.clone())?;
    let app = api::router(app_state.clone(), &cfg);
    let addr = cfg.server.socket_addr()?;

    info!(
        %addr,
        devices = cfg.devices.len(),
        prediction_url = %cfg.prediction.base_url,
        grid_available = cfg.controller.grid_available,
        "starting home energy controller"
    );

    controller::spawn_controller_tasks(app_state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
