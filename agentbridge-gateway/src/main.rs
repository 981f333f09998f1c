//! AgentBridge gateway
//!
//! Connects a bridge with a small demo capability set to a WebSocket
//! endpoint, so an agent on the other side can discover and drive it.

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentbridge::schema::{Property, Shape};
use agentbridge::{
    handler, ActionDefinition, AgentBridge, ApplicationInfo, AuthLevel, BridgeConfig,
    ComponentDefinition, ComponentHandlers, FunctionDefinition, WebSocketConfig,
    WebSocketTransport,
};

#[derive(Parser, Debug)]
#[command(name = "agentbridge-gateway")]
#[command(version)]
#[command(about = "Expose demo capabilities to an agent over WebSocket")]
struct Args {
    /// Agent endpoint (ws:// or wss://)
    #[arg(long, env = "AGENTBRIDGE_URL", default_value = "ws://127.0.0.1:8790")]
    url: String,

    #[arg(long, default_value = "demo-app")]
    application_id: String,

    #[arg(long, default_value = "AgentBridge Demo")]
    application_name: String,

    #[arg(long, default_value = "development")]
    environment: String,

    /// Include validator/handler details in error payloads sent to the agent
    #[arg(long)]
    detailed_errors: bool,

    /// Reconnect attempts before the transport gives up
    #[arg(long, default_value = "5")]
    max_reconnect_attempts: u32,

    #[arg(long, default_value = "1000")]
    reconnect_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let config = BridgeConfig {
        application: ApplicationInfo {
            id: args.application_id.clone(),
            name: args.application_name.clone(),
            environment: args.environment.clone(),
        },
        detailed_errors: args.detailed_errors,
        ..Default::default()
    };
    let bridge = AgentBridge::new(config);
    register_demo_capabilities(&bridge).await?;

    let mut ws_config = WebSocketConfig::new(args.url.clone());
    ws_config.max_reconnect_attempts = args.max_reconnect_attempts;
    ws_config.reconnect_delay_ms = args.reconnect_delay_ms;
    let transport = Arc::new(WebSocketTransport::new(ws_config));

    bridge.attach_transport(transport).await?;
    info!(url = %args.url, session_id = %bridge.session_id(), "bridge connected");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    bridge.dispose().await;
    Ok(())
}

async fn register_demo_capabilities(bridge: &Arc<AgentBridge>) -> anyhow::Result<()> {
    bridge
        .register_function(
            FunctionDefinition::new(
                "echo",
                "Echo the given text back to the caller",
                Shape::object([("text", Property::new(Shape::String).required())]),
            )
            .with_tag("demo"),
            handler(|params, _context| async move {
                Ok(json!({ "text": params["text"] }))
            }),
        )
        .await?;

    bridge
        .register_function(
            FunctionDefinition::new(
                "whoami",
                "Describe the application and calling agent",
                Shape::empty_object(),
            )
            .with_auth_level(AuthLevel::Public),
            handler(|_params, context| async move {
                Ok(json!({
                    "application": context.application.name,
                    "agent": context.agent.id,
                    "requestId": context.request.id,
                }))
            }),
        )
        .await?;

    bridge
        .register_component(
            ComponentDefinition::new(
                "status-banner",
                "banner",
                "A banner showing a status line the agent can rewrite",
                Shape::object([("text", Property::new(Shape::String).required())]),
            )
            .with_path("demo/header/status")
            .with_action(ActionDefinition::new(
                "clear",
                "Reset the banner to its default text",
                Shape::empty_object(),
            )),
            ComponentHandlers::new()
                .with_update(handler(|properties, _context| async move {
                    info!(text = %properties["text"], "banner updated");
                    Ok(properties)
                }))
                .with_action(
                    "clear",
                    handler(|_params, _context| async move {
                        info!("banner cleared");
                        Ok(json!({ "text": "" }))
                    }),
                ),
        )
        .await?;

    Ok(())
}
