// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use actix_web::{
    HttpRequest, HttpResponse, Responder,
    http::{
        StatusCode,
        header::{HeaderMap, LOCATION},
    },
    web::{self, Data},
};
use relaybackend::{
    dispatch::{Dispatch, SubmitError, Submission},
    push::PushNotificationProvider,
    translator::{HeaderSource, RequestTranslator, TranslationError},
};
use relaycommon::{DispatchOutcome, endpoint_paths::ENDPOINT_MESSAGES};
use uuid::Uuid;

struct ActixHeaders<'a>(&'a HeaderMap);

impl HeaderSource for ActixHeaders<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Relay endpoint: accepts an encrypted web push message and forwards it to
/// APNs.
#[tracing::instrument(name = "Relay push message", skip_all, fields(path = %request.path()))]
pub(crate) async fn relay_message<P: PushNotificationProvider>(
    request: HttpRequest,
    body: web::Bytes,
    translator: Data<RequestTranslator>,
    dispatch: Data<Dispatch<P>>,
) -> impl Responder {
    let delivery_request =
        match translator.translate(request.path(), &ActixHeaders(request.headers()), &body) {
            Ok(delivery_request) => delivery_request,
            Err(e) => {
                tracing::warn!(error = %e, "Received invalid push message");
                return translation_error_response(&e);
            }
        };

    let message_id = delivery_request.message_id();
    match dispatch.submit(delivery_request).await {
        Ok(Submission::Queued) => {
            tracing::debug!(%message_id, "Queued push message");
            created(message_id)
        }
        Ok(Submission::Delivered(outcome)) if outcome.accepted => {
            tracing::info!(
                %message_id,
                status = outcome.status_code,
                "Delivered push message"
            );
            created(message_id)
        }
        Ok(Submission::Delivered(outcome)) => {
            tracing::warn!(
                %message_id,
                status = outcome.status_code,
                reason = outcome.reason.as_deref().unwrap_or_default(),
                "Push service rejected push message"
            );
            rejection_response(outcome)
        }
        Err(SubmitError::Enqueue(e)) => {
            tracing::warn!(%message_id, error = %e, "Could not queue push message");
            HttpResponse::ServiceUnavailable().body(e.to_string())
        }
        Err(SubmitError::Push(e)) => {
            tracing::error!(%message_id, error = %e, "Failed to send push message");
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

fn created(message_id: Uuid) -> HttpResponse {
    HttpResponse::Created()
        .insert_header((LOCATION, format!("{ENDPOINT_MESSAGES}/{message_id}")))
        .finish()
}

fn translation_error_response(e: &TranslationError) -> HttpResponse {
    let status = match e {
        TranslationError::InvalidPath(_) => StatusCode::BAD_REQUEST,
        TranslationError::UnsupportedEncoding(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        TranslationError::MissingCryptoParam { .. }
        | TranslationError::MalformedCryptoParam { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    HttpResponse::build(status).body(e.to_string())
}

/// Pass the push service's verdict through to the caller.
fn rejection_response(outcome: DispatchOutcome) -> HttpResponse {
    let status =
        StatusCode::from_u16(outcome.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let reason = outcome
        .reason
        .or_else(|| status.canonical_reason().map(ToOwned::to_owned))
        .unwrap_or_default();
    HttpResponse::build(status).body(reason)
}
