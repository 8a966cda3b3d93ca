//! Sandbox entry point: wire the dispatcher to its channel and serve.

use std::sync::Arc;

use tracing::info;

use assetlink_common::AssetApi;
use assetlink_core::channel::{ChannelError, MessageChannel, MessageSink};
use assetlink_core::SandboxDispatcher;
use assetlink_rest::RestClient;

use crate::bootstrap::SandboxConfig;

/// Run the sandbox side until the channel closes.
///
/// Announces readiness first (the announcement is what lets the host
/// discover this context as its reply target), then serves requests.
///
/// # Arguments
///
/// * `channel` - Inbound side of the transport for this context
/// * `parent` - Sink posting to the host context
/// * `api` - The asset-service collaborator executing the calls
/// * `config` - Bootstrap configuration from the resource query string
///
/// # Errors
///
/// Returns an error if the channel was already consumed or the host side
/// is gone before the announcement is posted.
pub async fn run_sandbox(
    channel: Arc<dyn MessageChannel>,
    parent: Arc<dyn MessageSink>,
    api: Arc<dyn AssetApi>,
    config: SandboxConfig,
) -> Result<(), ChannelError> {
    info!(
        client_id = %config.client_id,
        telemetry = config.telemetry_enabled,
        "sandbox starting"
    );

    let rx = channel.subscribe()?;
    let dispatcher = SandboxDispatcher::new(
        config.client_id,
        api,
        parent,
        config.telemetry_enabled,
    );
    dispatcher.announce()?;
    dispatcher.serve(rx).await;

    Ok(())
}

/// Run the sandbox against the real asset service.
///
/// Convenience wrapper for embeddings that do not inject their own
/// collaborator.
pub async fn run_sandbox_with_service(
    channel: Arc<dyn MessageChannel>,
    parent: Arc<dyn MessageSink>,
    config: SandboxConfig,
) -> Result<(), ChannelError> {
    run_sandbox(channel, parent, Arc::new(RestClient::new()), config).await
}
