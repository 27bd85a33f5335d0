// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{net::TcpListener, sync::Arc, time::Duration};

use anyhow::Context;
use relaybackend::{dispatch::Dispatch, translator::RequestTranslator};
use relayserver::{
    configurations::get_configuration,
    push_notification_provider::ApnsPushNotificationProvider,
    run,
    telemetry::{get_subscriber, init_subscriber},
    tls::load_server_config,
};

/// How long in-flight deliveries get to finish after the server stopped.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging/trace subscription
    let subscriber = get_subscriber("relayserver".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber)?;

    // Load configuration
    let configuration = get_configuration("server/").context("Could not load configuration")?;

    if configuration.application.host.is_empty() {
        anyhow::bail!("No host configured");
    }

    // One APNs client per environment
    let push_clients = ApnsPushNotificationProvider::for_environments(&configuration.apns)
        .context("Could not set up the APNs clients")?;
    let (dispatch, worker_pool) = Dispatch::start(&configuration.dispatch, Arc::new(push_clients));
    tracing::info!(
        mode = ?configuration.dispatch.mode,
        overflow = ?configuration.dispatch.overflow,
        "Dispatcher started"
    );

    let translator = RequestTranslator::new(configuration.routing.clone());

    let tls_config = configuration
        .application
        .tls
        .as_ref()
        .map(load_server_config)
        .transpose()
        .context("Could not set up TLS")?;

    // Port binding
    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener =
        TcpListener::bind(&address).with_context(|| format!("Failed to bind to {address}"))?;

    // Start the server and wait until it's stopped by a signal
    run(listener, tls_config, translator, dispatch)?.await?;

    if let Some(worker_pool) = worker_pool {
        worker_pool.shutdown(SHUTDOWN_TIMEOUT).await;
    }
    Ok(())
}
