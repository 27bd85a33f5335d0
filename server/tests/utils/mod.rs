#![allow(dead_code)]

// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
    time::Duration,
};

use once_cell::sync::Lazy;
use relaybackend::{
    dispatch::{Dispatch, WorkerPool},
    push::{PushClients, test_utils::TestPushNotificationProvider},
    settings::{DispatchSettings, RoutingSettings},
    translator::RequestTranslator,
};
use relayserver::{
    configurations::get_configuration,
    run,
    telemetry::{get_subscriber, init_subscriber},
};

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    // This allows us to choose not to capture traces for tests that pass.
    // To get all logs just run `TEST_LOG=true cargo test health_check_works | bunyan`.
    // bunyan can be installed via `cargo install bunyan`.
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber).expect("Failed to initialize tracing");
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber).expect("Failed to initialize tracing");
    }
});

pub struct TestApp {
    pub address: SocketAddr,
    /// Stands in for APNs in both environments
    pub provider: TestPushNotificationProvider,
    pub worker_pool: Option<WorkerPool>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    /// Wait until the push service saw `count` notifications.
    pub async fn wait_for_attempts(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.provider.attempt_count() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("push attempts did not arrive in time");
    }
}

/// Start the server with the local configuration, adjusted by `configure`.
pub async fn spawn_app(
    configure: impl FnOnce(&mut DispatchSettings, &mut RoutingSettings),
) -> TestApp {
    // Load configuration
    let configuration = get_configuration("").expect("Could not load configuration.");
    let mut dispatch_settings = configuration.dispatch;
    let mut routing_settings = configuration.routing;
    configure(&mut dispatch_settings, &mut routing_settings);

    let provider = TestPushNotificationProvider::new();
    let push_clients = Arc::new(PushClients::new(provider.clone(), provider.clone()));
    let (dispatch, worker_pool) = Dispatch::start(&dispatch_settings, push_clients);

    let address = spawn_with(RequestTranslator::new(routing_settings), dispatch);
    TestApp {
        address,
        provider,
        worker_pool,
    }
}

/// Start the server around an already set up dispatcher and return its
/// address.
pub fn spawn_with(
    translator: RequestTranslator,
    dispatch: Dispatch<TestPushNotificationProvider>,
) -> SocketAddr {
    // Initialize tracing subscription only once.
    Lazy::force(&TRACING);

    // Port binding
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port.");
    let address = listener.local_addr().unwrap();

    // Start the server
    let server = run(listener, None, translator, dispatch).expect("Failed to bind to address.");

    // Execute the server in the background
    tokio::spawn(server);

    address
}
