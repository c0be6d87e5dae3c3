//! Startup and shutdown of the bridge.

use anyhow::Context;
use glsp_bridge_core::config::{Config, ServerConfig};
use glsp_bridge_core::{Router, RouterOptions, ServerChannel};
use glsp_bridge_host::{HostBridge, StdioHost, Transport};
use glsp_bridge_server::{ServerAdapter, ServerAdapterOptions, ServerLaunchOptions, ServerProcess};
use std::sync::Arc;
use tracing::{info, warn};

/// Settings the bridge runs with, resolved from all config layers.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub diagram_type: String,
    pub server: ServerConfig,
    /// Log every routed message.
    pub logging: bool,
}

impl RunnerConfig {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let diagram_type = config.diagram_type.clone().context(
            "No diagram type configured. Pass --diagram-type or set \"diagramType\" in glsp-bridge.json",
        )?;

        Ok(Self {
            diagram_type,
            server: config.server(),
            logging: config.logging.unwrap_or(false),
        })
    }
}

/// Launch or reach the server, then serve the host editor on stdio until it
/// disconnects.
pub async fn run(config: RunnerConfig) -> anyhow::Result<()> {
    let port = config.server.port();

    let process = if config.server.should_launch() {
        let options = ServerLaunchOptions::from_config(&config.server, config.logging)?;
        let process = ServerProcess::start(options)
            .await
            .context("Failed to start the GLSP server")?;
        Some(process)
    } else {
        info!(port, "Using running GLSP server");
        None
    };

    let channel = ServerChannel::new();
    let adapter = ServerAdapter::new(
        channel.clone(),
        ServerAdapterOptions::new(port).with_client(
            config.server.client_id(),
            config.server.client_name.clone(),
        ),
    );
    adapter
        .start()
        .await
        .with_context(|| format!("Failed to connect to the GLSP server on port {}", port))?;

    let (transport, incoming) = Transport::stdio();
    let router = Router::new(
        RouterOptions::new(channel)
            .with_host(Arc::new(StdioHost::new(transport.clone())))
            .with_logging(config.logging),
    );
    let bridge = HostBridge::new(router.clone(), transport, config.diagram_type.as_str());
    info!(diagram_type = %config.diagram_type, port, "glsp-bridge ready");

    tokio::select! {
        _ = bridge.run(incoming) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    bridge.dispose();
    router.dispose();
    if let Err(e) = adapter.stop().await {
        warn!(error = %e, "Failed to shut down the server connection");
    }
    if let Some(process) = process {
        if let Err(e) = process.stop().await {
            warn!(error = %e, "Failed to stop the GLSP server");
        }
    }

    info!("glsp-bridge stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagram_type_is_required() {
        let err = RunnerConfig::from_config(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("--diagram-type"));
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            diagram_type: Some("workflow-diagram".to_string()),
            logging: Some(true),
            ..Default::default()
        };

        let runner = RunnerConfig::from_config(&config).unwrap();
        assert_eq!(runner.diagram_type, "workflow-diagram");
        assert!(runner.logging);
        assert_eq!(runner.server.port(), 5007);
        assert!(runner.server.should_launch());
    }

    #[tokio::test]
    async fn test_missing_jar_fails_before_connecting() {
        let config = RunnerConfig {
            diagram_type: "workflow-diagram".to_string(),
            server: ServerConfig::default(),
            logging: false,
        };

        let err = run(config).await.unwrap_err();
        assert!(err.to_string().contains("jar path is not valid"));
    }
}
