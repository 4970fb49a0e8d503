//! Relay service: wires the Discord client, DeepL client, queue, and dispatch loop.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Settings;
use crate::discord::{DiscordApi, GatewayClient};
use crate::relay::{ChatPlatform, Dispatcher, IngestionHandler, RelayQueue, WebhookCache};
use crate::translate::{DeepLClient, TranslationGateway};

/// Run the relay until the gateway gives up or a shutdown signal arrives.
/// Returns an error when the gateway connection fails for good.
pub async fn run_relay(settings: Settings) -> Result<()> {
    let api = Arc::new(DiscordApi::new(settings.discord_token.clone(), settings.request_timeout));
    let platform: Arc<dyn ChatPlatform> = api;
    let routes = Arc::new(settings.routes);
    let queue = Arc::new(RelayQueue::new());

    let deepl = DeepLClient::new(
        settings.deepl_api_key,
        settings.deepl_base_url,
        settings.request_timeout,
    );
    log::info!("translating via {}", deepl.base_url());
    let translator = TranslationGateway::new(
        Arc::new(deepl),
        settings.attachment_placeholder,
        settings.request_timeout,
    );
    let webhooks = Arc::new(WebhookCache::new(
        platform.clone(),
        settings.webhook_name,
        settings.request_timeout,
    ));

    let dispatcher = Dispatcher::new(
        queue.clone(),
        routes.clone(),
        webhooks,
        translator,
        platform.clone(),
        settings.request_timeout,
    );
    let dispatch_task = tokio::spawn(async move { dispatcher.run().await });

    let handler = IngestionHandler::new(queue, routes.clone(), platform);
    let gateway = GatewayClient::new(settings.discord_token, settings.max_reconnect_attempts);
    log::info!(
        "relaying between {} channel(s): {:?}",
        routes.channel_ids().len(),
        routes.channel_ids()
    );

    let result = tokio::select! {
        r = gateway.run(&handler) => r.context("discord gateway"),
        _ = shutdown_signal() => {
            log::info!("shutdown signal received");
            Ok(())
        }
    };
    dispatch_task.abort();
    result
}

/// Future that completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
