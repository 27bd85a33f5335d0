// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! TLS for the relay endpoint.

use std::sync::Arc;

use relaybackend::settings::TlsSettings;
use rustls::{
    ServerConfig,
    crypto::ring,
    pki_types::{
        CertificateDer, PrivateKeyDer,
        pem::{self, PemObject},
    },
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Could not read certificates from {path}: {source}")]
    Certificates {
        path: String,
        #[source]
        source: pem::Error,
    },
    #[error("No certificates found in {0}")]
    NoCertificates(String),
    #[error("Could not read private key from {path}: {source}")]
    PrivateKey {
        path: String,
        #[source]
        source: pem::Error,
    },
    #[error("Invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Build the server TLS configuration from a PEM certificate chain and a PEM
/// private key.
pub fn load_server_config(settings: &TlsSettings) -> Result<ServerConfig, TlsError> {
    let certificates = CertificateDer::pem_file_iter(&settings.certpath)
        .and_then(|certificates| certificates.collect::<Result<Vec<_>, _>>())
        .map_err(|source| TlsError::Certificates {
            path: settings.certpath.clone(),
            source,
        })?;
    if certificates.is_empty() {
        return Err(TlsError::NoCertificates(settings.certpath.clone()));
    }

    let private_key =
        PrivateKeyDer::from_pem_file(&settings.keypath).map_err(|source| TlsError::PrivateKey {
            path: settings.keypath.clone(),
            source,
        })?;

    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certificates, private_key)?;
    Ok(config)
}
