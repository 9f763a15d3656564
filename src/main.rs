use anyhow::Context;
use std::sync::Arc;

use statshub::{
    app::App,
    arguments::{config_path_override, is_demo_enabled, patterns, port_override, print_help},
    config::{self, CONFIG_FILE_PATH},
    logger::{self, LogTag},
    webserver::{self, AppState},
};

/// Main entry point for statshub
///
/// Loads configuration, composes the statistics pipeline and serves the
/// websocket + admin API until Ctrl-C.
#[tokio::main]
async fn main() {
    logger::init();

    if patterns::is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    if let Err(e) = run().await {
        logger::error(LogTag::System, &format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    logger::info(LogTag::System, "statshub starting up...");

    let config_path = config_path_override().unwrap_or_else(|| CONFIG_FILE_PATH.to_string());
    config::load_config_from_path(&config_path)
        .with_context(|| format!("loading configuration from '{}'", config_path))?;

    let mut config = config::get_config_clone();
    if let Some(port) = port_override() {
        config.webserver.port = port;
    }

    let demo = is_demo_enabled();
    if demo && config.source.kind != "memory" {
        logger::warning(
            LogTag::System,
            "--demo only seeds the memory source; ignored for this source kind",
        );
    }

    let app = Arc::new(
        App::build(config, demo)
            .await
            .context("building the statistics pipeline")?,
    );
    let state = Arc::new(AppState::new(app.clone()));

    tokio::spawn(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                logger::info(LogTag::System, "Ctrl-C received, shutting down...");
                webserver::shutdown();
            }
            Err(e) => logger::error(
                LogTag::System,
                &format!("Failed to listen for Ctrl-C: {}", e),
            ),
        }
    });

    let served = webserver::start_server(state).await;
    app.shutdown();

    served.map_err(anyhow::Error::msg)?;
    logger::info(LogTag::System, "statshub stopped");
    Ok(())
}
