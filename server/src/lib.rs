// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Web Push to APNs relay server.

pub mod configurations;
pub mod endpoints;
pub mod push_notification_provider;
pub mod telemetry;
pub mod tls;

use std::net::TcpListener;

use actix_web::{
    App, HttpServer,
    dev::Server,
    web::{self, Data},
};
use relaybackend::{
    dispatch::Dispatch, push::PushNotificationProvider, translator::RequestTranslator,
};
use relaycommon::endpoint_paths::{ENDPOINT_HEALTH_CHECK, ENDPOINT_RELAY};
use tracing_actix_web::TracingLogger;

use crate::endpoints::{health_check, relay::relay_message};

/// Configure and run the server application. The server speaks TLS if a
/// `tls_config` is given and plaintext HTTP otherwise.
pub fn run<P: PushNotificationProvider>(
    listener: TcpListener,
    tls_config: Option<rustls::ServerConfig>,
    translator: RequestTranslator,
    dispatch: Dispatch<P>,
) -> Result<Server, std::io::Error> {
    // Wrap shared state in a Data<T>
    let translator_data = Data::new(translator);
    let dispatch_data = Data::new(dispatch);

    let local_addr = listener.local_addr()?;
    tracing::info!(
        "Starting server, listening on {}:{}",
        local_addr.ip(),
        local_addr.port()
    );

    let relay_tail = format!("{ENDPOINT_RELAY}/{{tail:.*}}");

    // Create & run the server
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route(ENDPOINT_HEALTH_CHECK, web::get().to(health_check))
            .app_data(translator_data.clone())
            .app_data(dispatch_data.clone())
            // Relay endpoint. The bare prefix is routed as well so that it
            // gets a proper error instead of a 404.
            .route(ENDPOINT_RELAY, web::post().to(relay_message::<P>))
            .route(&relay_tail, web::post().to(relay_message::<P>))
    });

    let server = match tls_config {
        Some(tls_config) => server.listen_rustls_0_23(listener, tls_config)?,
        None => server.listen(listener)?,
    };
    Ok(server.run())
}
