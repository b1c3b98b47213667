use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use kanau::processor::Processor;
use nftvault_core::lifecycle::{WebhookDelivery, WebhookOutcome};
use nftvault_sdk::objects::{ProviderKind, WebhookAck};

use super::error::ApiError;
use crate::state::AppState;

/// `POST /webhooks/{provider}`: payment notification from a provider.
///
/// The body is kept as raw bytes; signatures are computed over them.
pub(super) async fn receive_webhook(
    state: State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let provider: ProviderKind = provider
        .parse()
        .map_err(|_| ApiError::UnknownProvider(provider))?;

    let outcome = state
        .lifecycle
        .process(WebhookDelivery {
            provider,
            headers,
            body: body.to_vec(),
        })
        .await?;

    Ok(match outcome {
        WebhookOutcome::Applied(_) | WebhookOutcome::Ignored => {
            (StatusCode::OK, Json(WebhookAck::received()))
        }
        WebhookOutcome::DeadLettered(id) => {
            tracing::info!(dead_letter_id = %id, provider = %provider, "Webhook parked");
            (StatusCode::ACCEPTED, Json(WebhookAck::dead_lettered()))
        }
    })
}
