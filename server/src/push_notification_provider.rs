// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{
    fs,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use relaybackend::{
    notification::{APNS_ID, Notification},
    push::{PushClients, PushNotificationError, PushNotificationProvider},
    settings::{ApnsCredentials, ApnsSettings},
};
use relaycommon::{DispatchOutcome, Environment};
use reqwest::{
    Certificate, Client, ClientBuilder, Identity, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

const APNS_TOPIC: &str = "apns-topic";

/// JWTs are accepted by APNs for an hour at most, and must not be refreshed
/// more often than every 20 minutes.
const APNS_JWT_LIFETIME_SECS: u64 = 60 * 40;

#[derive(Debug, Error)]
pub enum ProviderSetupError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Certificate credentials need either a path or a base64 value")]
    MissingCertificate,
    #[error("Invalid base64 certificate: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid APNs signing key: {0}")]
    SigningKey(#[from] jsonwebtoken::errors::Error),
    #[error("Could not set up the HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct ApnsClaims {
    iss: String,
    iat: usize,
}

#[derive(Debug, Clone)]
struct ApnsToken {
    jwt: String,
    issued_at: u64,
}

#[derive(Debug, Clone)]
struct ApnsTokenState {
    key_id: String,
    team_id: String,
    private_key: Vec<u8>,
    token: Arc<Mutex<Option<ApnsToken>>>,
}

/// Error body returned by APNs along with non-200 statuses.
#[derive(Debug, Deserialize)]
struct ApnsErrorResponse {
    reason: String,
}

/// Pushes notifications to one APNs endpoint over HTTP/2.
#[derive(Debug, Clone)]
pub struct ApnsPushNotificationProvider {
    client: Client,
    base_url: String,
    topic: String,
    // Only present with token authentication. Certificate authentication
    // happens in the TLS handshake.
    token_state: Option<ApnsTokenState>,
}

impl ApnsPushNotificationProvider {
    /// Create a provider for the APNs endpoint of the given environment.
    /// Fails if the credentials can't be read or are invalid.
    pub fn new(
        settings: &ApnsSettings,
        environment: Environment,
    ) -> Result<Self, ProviderSetupError> {
        let builder = Client::builder().timeout(Duration::from_secs(settings.timeout_secs));

        let (builder, token_state) = match &settings.credentials {
            ApnsCredentials::Certificate {
                path,
                base64,
                password,
            } => {
                let pkcs12 = read_certificate(path.as_deref(), base64.as_deref())?;
                let identity =
                    Identity::from_pkcs12_der(&pkcs12, password.as_deref().unwrap_or_default())?;
                (builder.use_native_tls().identity(identity), None)
            }
            ApnsCredentials::Token {
                keyid,
                teamid,
                privatekeypath,
            } => {
                let private_key = read_file(privatekeypath)?;
                // Fail at startup rather than on the first push.
                EncodingKey::from_ec_pem(&private_key)?;
                let token_state = ApnsTokenState {
                    key_id: keyid.clone(),
                    team_id: teamid.clone(),
                    private_key,
                    token: Arc::new(Mutex::new(None)),
                };
                (builder.use_rustls_tls(), Some(token_state))
            }
        };

        let builder = match &settings.cacertpath {
            Some(cacertpath) => with_trust_roots(builder, cacertpath)?,
            None => builder,
        };

        Ok(Self {
            client: builder.build()?,
            base_url: settings.url(environment).trim_end_matches('/').to_owned(),
            topic: settings.topic.clone(),
            token_state,
        })
    }

    /// Create the providers for both APNs environments.
    pub fn for_environments(
        settings: &ApnsSettings,
    ) -> Result<PushClients<Self>, ProviderSetupError> {
        Ok(PushClients::new(
            Self::new(settings, Environment::Development)?,
            Self::new(settings, Environment::Production)?,
        ))
    }

    fn build_headers(
        &self,
        notification: &Notification,
    ) -> Result<HeaderMap, PushNotificationError> {
        let mut headers = HeaderMap::new();
        headers.insert(APNS_TOPIC, header_value(&self.topic)?);
        for (name, value) in notification.apns_headers() {
            headers.insert(name, header_value(&value)?);
        }
        Ok(headers)
    }
}

impl ApnsTokenState {
    /// Return a JWT for APNS. If the token is older than 40 minutes, a new
    /// token is issued (as JWTs must be between 20 and 60 minutes old).
    async fn issue_jwt(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        // Check whether we already have a token and if it is still valid, i.e.
        // not older than 40 minutes
        let mut token_option = self.token.lock().await;

        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        if let Some(token) = &*token_option {
            if now < token.issued_at + APNS_JWT_LIFETIME_SECS {
                return Ok(token.jwt.clone());
            }
        }

        let claims = ApnsClaims {
            iss: self.team_id.clone(),
            iat: usize::try_from(now)?,
        };

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());

        let jwt = encode(
            &header,
            &claims,
            &EncodingKey::from_ec_pem(&self.private_key)?,
        )?;

        // Store the JWT and update the last issuance time
        *token_option = Some(ApnsToken {
            jwt: jwt.clone(),
            issued_at: now,
        });

        Ok(jwt)
    }
}

impl PushNotificationProvider for ApnsPushNotificationProvider {
    async fn push(
        &self,
        notification: &Notification,
    ) -> Result<DispatchOutcome, PushNotificationError> {
        let mut headers = self.build_headers(notification)?;

        if let Some(token_state) = &self.token_state {
            let jwt = token_state
                .issue_jwt()
                .await
                .map_err(|e| PushNotificationError::JwtCreationError(e.to_string()))?;
            headers.insert(AUTHORIZATION, header_value(&format!("bearer {jwt}"))?);
        }

        let url = format!("{}/3/device/{}", self.base_url, notification.device_token);

        let res = self
            .client
            .post(url)
            .headers(headers)
            .json(&notification.payload)
            .send()
            .await
            .map_err(|e| PushNotificationError::NetworkError(e.to_string()))?;

        let status = res.status();
        let apns_id = res
            .headers()
            .get(APNS_ID)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);

        if status == StatusCode::OK {
            return Ok(DispatchOutcome::accepted(status.as_u16(), apns_id));
        }

        // APNs explains rejections in a JSON body. Anything else is passed on
        // as is.
        let body = res.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<ApnsErrorResponse>(&body) {
            Ok(response) => Some(response.reason),
            Err(_) => Some(body).filter(|body| !body.is_empty()),
        };
        Ok(DispatchOutcome::rejected(status.as_u16(), apns_id, reason))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, PushNotificationError> {
    HeaderValue::from_str(value)
        .map_err(|e| PushNotificationError::InvalidNotification(format!("{value:?}: {e}")))
}

fn read_file(path: &str) -> Result<Vec<u8>, ProviderSetupError> {
    fs::read(path).map_err(|source| ProviderSetupError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Load the PKCS#12 client certificate, preferring the file over the
/// embedded value.
fn read_certificate(
    path: Option<&str>,
    base64: Option<&str>,
) -> Result<Vec<u8>, ProviderSetupError> {
    match (path, base64) {
        (Some(path), _) => read_file(path),
        (None, Some(base64)) => {
            let cleaned: String = base64.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(STANDARD.decode(cleaned)?)
        }
        (None, None) => Err(ProviderSetupError::MissingCertificate),
    }
}

/// Trust only the certificates in the PEM bundle at `cacertpath`.
fn with_trust_roots(
    builder: ClientBuilder,
    cacertpath: &str,
) -> Result<ClientBuilder, ProviderSetupError> {
    let bundle = read_file(cacertpath)?;
    let builder = Certificate::from_pem_bundle(&bundle)?
        .into_iter()
        .fold(builder.tls_built_in_root_certs(false), |builder, certificate| {
            builder.add_root_certificate(certificate)
        });
    Ok(builder)
}
