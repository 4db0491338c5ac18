pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod hardware;
pub mod power_flow;
pub mod status;
pub mod telemetry;
