//! Safety Monitoring Dashboard - Main Entry Point

use anyhow::Context;
use sensorvis_rs::{
    backend::{MySqlStore, SystemClock},
    config::{app_data_dir, AppConfig, ConfigResolver},
    frontend::DashboardApp,
    pipeline::Pipeline,
};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "sensorvis.log";

/// Install the console layer and, when a data directory exists, a daily log file.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sensorvis_rs=debug"));

    let file = app_data_dir().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir.join("logs"), LOG_FILE_PREFIX);
        tracing_appender::non_blocking(appender)
    });

    match file {
        Some((writer, guard)) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging();

    tracing::info!("Starting Safety Monitoring Dashboard");

    let config = AppConfig::load_or_default();
    let store = MySqlStore::new().context("Failed to start database runtime")?;
    let pipeline = Pipeline::from_config(
        &config,
        ConfigResolver::default(),
        store,
        Arc::new(SystemClock),
    );

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Safety Monitoring Dashboard"),
        ..Default::default()
    };

    eframe::run_native(
        "Safety Monitoring Dashboard",
        native_options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(DashboardApp::new(pipeline)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing::info!("Shutting down...");
    Ok(())
}
