use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    admin::dto::{AdminUserResponse, CreateUserRequest, UpdateUserRequest},
    auth::{
        repo::{NewUser, User},
        services::{hash_password, is_valid_email, load_actor, AuthUser},
    },
    error::ApiError,
    policy::{can_perform, Action},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/:id",
            axum::routing::put(update_user).delete(deactivate_user),
        )
}

async fn require_admin(state: &AppState, user_id: Uuid) -> Result<User, ApiError> {
    let actor = load_actor(state, user_id).await?;
    can_perform(actor.id, actor.role, Action::ManageUsers, None).check("user")?;
    Ok(actor)
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<AdminUserResponse>>, ApiError> {
    require_admin(&state, user_id).await?;
    let users = User::list_all(&state.db).await?;
    Ok(Json(users.into_iter().map(AdminUserResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(mut payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<AdminUserResponse>), ApiError> {
    let actor = require_admin(&state, user_id).await?;
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation("invalid email".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::Validation("password too short".into()));
    }
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        NewUser {
            name: payload.name.trim(),
            email: &payload.email,
            password_hash: &hash,
            phone: payload.phone.as_deref(),
            role: payload.role,
        },
    )
    .await?;

    info!(user_id = %user.id, role = ?user.role, admin = %actor.id, "user created by admin");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<AdminUserResponse>, ApiError> {
    let actor = require_admin(&state, user_id).await?;

    let mut user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("name must not be empty".into()));
        }
        user.name = name.trim().to_string();
    }
    if let Some(email) = payload.email {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(ApiError::Validation("invalid email".into()));
        }
        if email != user.email
            && User::find_by_email(&state.db, &email).await?.is_some()
        {
            return Err(ApiError::Conflict("email already registered".into()));
        }
        user.email = email;
    }
    if let Some(phone) = payload.phone {
        user.phone = Some(phone);
    }
    if let Some(role) = payload.role {
        user.role = role;
    }
    if let Some(is_active) = payload.is_active {
        user.is_active = is_active;
    }

    let user = user.save(&state.db).await?;
    info!(user_id = %user.id, admin = %actor.id, "user updated by admin");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = require_admin(&state, user_id).await?;

    if !User::deactivate(&state.db, id).await? {
        return Err(ApiError::NotFound("user"));
    }
    info!(user_id = %id, admin = %actor.id, "user deactivated");
    Ok(Json(serde_json::json!({ "message": "user deactivated" })))
}
