use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use sqlx::types::Json as SqlJson;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::{load_actor, AuthUser},
    error::ApiError,
    offices::{
        dto::{CreateOfficeRequest, UpdateOfficeRequest},
        repo::{self, NewOffice, Office},
    },
    policy::{can_perform, Action},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/offices", get(list_offices).post(create_office))
        .route(
            "/offices/:id",
            get(get_office).put(update_office).delete(deactivate_office),
        )
}

#[instrument(skip(state))]
pub async fn list_offices(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Office>>, ApiError> {
    load_actor(&state, user_id).await?;
    let offices = repo::list_active(&state.db).await?;
    Ok(Json(offices))
}

#[instrument(skip(state))]
pub async fn get_office(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Office>, ApiError> {
    load_actor(&state, user_id).await?;
    let office = repo::fetch(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("office"))?;
    Ok(Json(office))
}

#[instrument(skip(state, payload))]
pub async fn create_office(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateOfficeRequest>,
) -> Result<(StatusCode, Json<Office>), ApiError> {
    let actor = load_actor(&state, user_id).await?;
    can_perform(actor.id, actor.role, Action::ManageOffices, None).check("office")?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }

    let office = repo::insert(
        &state.db,
        NewOffice {
            name: payload.name.trim().to_string(),
            address: payload.address,
            city: payload.city,
            country: payload.country,
            workstations: payload.workstations,
        },
    )
    .await?;

    info!(office_id = %office.id, user_id = %actor.id, "office created");
    Ok((StatusCode::CREATED, Json(office)))
}

#[instrument(skip(state, payload))]
pub async fn update_office(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOfficeRequest>,
) -> Result<Json<Office>, ApiError> {
    let actor = load_actor(&state, user_id).await?;
    can_perform(actor.id, actor.role, Action::ManageOffices, None).check("office")?;

    let mut office = repo::fetch(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("office"))?;

    if let Some(name) = payload.name {
        office.name = name;
    }
    if let Some(address) = payload.address {
        office.address = address;
    }
    if let Some(city) = payload.city {
        office.city = city;
    }
    if let Some(country) = payload.country {
        office.country = country;
    }
    if let Some(workstations) = payload.workstations {
        office.workstations = SqlJson(workstations);
    }
    if let Some(is_active) = payload.is_active {
        office.is_active = is_active;
    }

    let office = office.save(&state.db).await?;
    info!(office_id = %office.id, user_id = %actor.id, "office updated");
    Ok(Json(office))
}

#[instrument(skip(state))]
pub async fn deactivate_office(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = load_actor(&state, user_id).await?;
    can_perform(actor.id, actor.role, Action::ManageOffices, None).check("office")?;

    if !repo::deactivate(&state.db, id).await? {
        return Err(ApiError::NotFound("office"));
    }
    info!(office_id = %id, user_id = %actor.id, "office deactivated");
    Ok(Json(serde_json::json!({ "message": "office deactivated" })))
}
