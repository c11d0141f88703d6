use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::services::{load_actor, AuthUser},
    error::ApiError,
    state::AppState,
    tickets::{
        dto::{AssignRequest, ShareRequest, TicketResponse, UpdateStatusRequest},
        services::{self, MediaUpload, NewTicketInput, MAX_MEDIA_FILES},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/:id", get(get_ticket).delete(delete_ticket))
        .route("/tickets/:id/status", patch(update_status))
        .route("/tickets/:id/assign", patch(assign_ticket))
        .route("/tickets/:id/share", post(share_ticket))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

#[instrument(skip(state))]
pub async fn list_tickets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<TicketResponse>>, ApiError> {
    let actor = load_actor(&state, user_id).await?;
    let tickets = services::list_tickets(&state, &actor).await?;
    Ok(Json(tickets.into_iter().map(TicketResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_ticket(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketResponse>, ApiError> {
    let actor = load_actor(&state, user_id).await?;
    let ticket = services::get_ticket(&state, &actor, id).await?;
    Ok(Json(ticket.into()))
}

/// POST /tickets (multipart): text fields plus up to five `media` files.
#[instrument(skip(state, multipart))]
pub async fn create_ticket(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let actor = load_actor(&state, user_id).await?;

    let mut title = None;
    let mut description = None;
    let mut office_id = None;
    let mut workstation = None;
    let mut priority = None;
    let mut location_raw = None;
    let mut files: Vec<MediaUpload> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(read_text(field).await?),
            "description" => description = Some(read_text(field).await?),
            "office" => {
                let raw = read_text(field).await?;
                office_id = Some(
                    Uuid::parse_str(raw.trim())
                        .map_err(|_| ApiError::Validation("invalid office id".into()))?,
                );
            }
            "workstation" => workstation = Some(read_text(field).await?),
            "priority" => {
                let raw = read_text(field).await?;
                priority = Some(
                    raw.trim()
                        .parse()
                        .map_err(|e: String| ApiError::Validation(e))?,
                );
            }
            "location" => location_raw = Some(read_text(field).await?),
            "media" | "media[]" => {
                // Attachment cap is a boundary rule, checked before any upload.
                if files.len() >= MAX_MEDIA_FILES {
                    return Err(ApiError::Validation(format!(
                        "at most {MAX_MEDIA_FILES} media attachments per ticket"
                    )));
                }
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("unreadable media field: {e}")))?;
                files.push(MediaUpload {
                    bytes,
                    content_type,
                });
            }
            _ => {}
        }
    }

    let input = NewTicketInput {
        title: title.ok_or(ApiError::Validation("title is required".to_string()))?,
        description: description
            .ok_or(ApiError::Validation("description is required".to_string()))?,
        office_id,
        workstation,
        priority,
        location_raw,
    };

    let ticket = services::create_ticket(&state, &actor, input, files).await?;
    Ok((StatusCode::CREATED, Json(ticket.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let actor = load_actor(&state, user_id).await?;
    let ticket = services::update_status(&state, &actor, id, payload.status).await?;
    Ok(Json(ticket.into()))
}

#[instrument(skip(state, payload))]
pub async fn assign_ticket(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let actor = load_actor(&state, user_id).await?;
    let ticket = services::assign_ticket(&state, &actor, id, payload.assigned_to).await?;
    Ok(Json(ticket.into()))
}

#[instrument(skip(state, payload))]
pub async fn share_ticket(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShareRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let actor = load_actor(&state, user_id).await?;
    let ticket = services::share_ticket(&state, &actor, id, payload.emails).await?;
    Ok(Json(ticket.into()))
}

#[instrument(skip(state))]
pub async fn delete_ticket(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = load_actor(&state, user_id).await?;
    services::delete_ticket(&state, &actor, id).await?;
    Ok(Json(serde_json::json!({ "message": "ticket deleted" })))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::Validation(format!("unreadable field: {e}")))
}
