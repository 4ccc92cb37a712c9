use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    extractors::{require_role, AuthenticatedUser},
    models::{ChatMessage, ConversationSummary, NewChatMessage, PostMessageInput, Role},
    store::{ChatStore, UserStore},
    AppError, AppResult, AppState,
};

/// Conversations are keyed by patient; any other account id is unknown here.
async fn ensure_patient(state: &AppState, patient_id: Uuid) -> AppResult<()> {
    let user = state.store.get_user(patient_id).await?;
    if user.role != Role::Patient {
        return Err(AppError::NotFound(format!("Patient {} not found", patient_id)));
    }
    Ok(())
}

/// GET /api/chat/messages - The caller's own support conversation
#[utoipa::path(
    get,
    path = "/api/chat/messages",
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<ChatMessage>),
        (status = 403, description = "Patient role required")
    ),
    tag = "chat",
    security(("bearer_auth" = []))
)]
pub async fn get_my_messages(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<ChatMessage>>> {
    require_role(&auth, Role::Patient)?;
    let messages = state.store.conversation(auth.user_id).await?;
    Ok(Json(messages))
}

/// POST /api/chat/messages
#[utoipa::path(
    post,
    path = "/api/chat/messages",
    request_body = PostMessageInput,
    responses(
        (status = 201, description = "Message posted", body = ChatMessage),
        (status = 403, description = "Patient role required"),
        (status = 422, description = "Empty or oversized body")
    ),
    tag = "chat",
    security(("bearer_auth" = []))
)]
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
    Json(input): Json<PostMessageInput>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    require_role(&auth, Role::Patient)?;
    let body = input.validated_body()?;

    let message = state
        .store
        .post_message(NewChatMessage {
            patient_id: auth.user_id,
            sender_id: auth.user_id,
            sender_role: Role::Patient,
            body,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/chat/conversations
#[utoipa::path(
    get,
    path = "/api/chat/conversations",
    responses(
        (status = 200, description = "Conversations, most recently active first", body = Vec<ConversationSummary>),
        (status = 403, description = "Admin role required")
    ),
    tag = "chat",
    security(("bearer_auth" = []))
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    require_role(&auth, Role::Admin)?;
    let conversations = state.store.conversations().await?;
    Ok(Json(conversations))
}

/// GET /api/chat/conversations/{patientId}
#[utoipa::path(
    get,
    path = "/api/chat/conversations/{patientId}",
    params(
        ("patientId" = Uuid, Path, description = "Patient account ID")
    ),
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<ChatMessage>),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Patient not found")
    ),
    tag = "chat",
    security(("bearer_auth" = []))
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<ChatMessage>>> {
    require_role(&auth, Role::Admin)?;
    ensure_patient(&state, patient_id).await?;

    let messages = state.store.conversation(patient_id).await?;
    Ok(Json(messages))
}

/// POST /api/chat/conversations/{patientId} - Admin reply
#[utoipa::path(
    post,
    path = "/api/chat/conversations/{patientId}",
    params(
        ("patientId" = Uuid, Path, description = "Patient account ID")
    ),
    request_body = PostMessageInput,
    responses(
        (status = 201, description = "Reply posted", body = ChatMessage),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Patient not found"),
        (status = 422, description = "Empty or oversized body")
    ),
    tag = "chat",
    security(("bearer_auth" = []))
)]
pub async fn reply(
    State(state): State<Arc<AppState>>,
    Path(patient_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(input): Json<PostMessageInput>,
) -> AppResult<(StatusCode, Json<ChatMessage>)> {
    require_role(&auth, Role::Admin)?;
    let body = input.validated_body()?;
    ensure_patient(&state, patient_id).await?;

    let message = state
        .store
        .post_message(NewChatMessage {
            patient_id,
            sender_id: auth.user_id,
            sender_role: Role::Admin,
            body,
        })
        .await?;

    tracing::debug!(%patient_id, admin_id = %auth.user_id, "Admin replied to conversation");
    Ok((StatusCode::CREATED, Json(message)))
}
