use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    error::{AppError, AppResult, INVALID_JSON, MESSAGE_REQUIRED},
    message::{ChatRequest, ChatResponse},
    state::SharedState,
};

pub const FALLBACK_REPLY: &str = "Sorry, I didn't catch that.";

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Json<ChatResponse>> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        // No JSON content type: nothing was parsed, same as an empty body.
        Err(JsonRejection::MissingJsonContentType(_)) => ChatRequest::default(),
        Err(JsonRejection::JsonDataError(_)) => {
            return Err(AppError::BadRequest(MESSAGE_REQUIRED));
        }
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(AppError::PayloadTooLarge);
        }
        Err(rejection) => {
            tracing::debug!(%rejection, "rejected chat body");
            return Err(AppError::BadRequest(INVALID_JSON));
        }
    };

    let message = payload
        .trimmed_message()
        .ok_or(AppError::BadRequest(MESSAGE_REQUIRED))?;

    tracing::debug!(
        business_id = payload.business_id.as_deref().unwrap_or("-"),
        chars = message.chars().count(),
        "forwarding chat message"
    );

    let reply = state
        .completion
        .complete(message)
        .await?
        .unwrap_or_else(|| FALLBACK_REPLY.to_string());

    Ok(Json(ChatResponse { reply }))
}
