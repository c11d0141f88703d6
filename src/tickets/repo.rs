use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::policy::TicketAccess;
use crate::tickets::lifecycle::TicketState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Assigned,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Assigned => "assigned",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

impl Default for TicketPriority {
    fn default() -> Self {
        TicketPriority::Medium
    }
}

impl std::str::FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "urgent" => Ok(TicketPriority::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Captioning outcome attached to an image. A failed analysis is stored as a
/// degraded entry instead of blocking ticket creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAnalysis {
    pub labels: Vec<String>,
    pub description: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MediaAnalysis {
    pub fn degraded(error: &str) -> Self {
        Self {
            labels: Vec::new(),
            description: "analysis failed".into(),
            confidence: 0.0,
            error: Some(error.to_string()),
        }
    }
}

impl From<crate::analysis::ImageAnalysis> for MediaAnalysis {
    fn from(a: crate::analysis::ImageAnalysis) -> Self {
        Self {
            labels: a.labels,
            description: a.description,
            confidence: a.confidence,
            error: None,
        }
    }
}

/// One attachment, owned by the ticket aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub url: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<MediaAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Ticket row with creator/assignee/office summaries resolved in one query.
#[derive(Debug, Clone, FromRow)]
pub struct TicketRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub office_id: Option<Uuid>,
    pub workstation: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub media: Json<Vec<MediaEntry>>,
    pub location: Option<Json<GeoLocation>>,
    pub shared_with: Vec<String>,
    pub closed_at: Option<OffsetDateTime>,
    pub closed_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub creator_name: String,
    pub creator_email: String,
    pub assignee_name: Option<String>,
    pub assignee_email: Option<String>,
    pub office_name: Option<String>,
}

impl TicketRecord {
    pub fn access(&self) -> TicketAccess {
        TicketAccess {
            creator: self.created_by,
            assignee: self.assigned_to,
        }
    }
}

/// Fields of a new ticket; media entries are complete (uploaded and
/// analyzed) before the row is written, so readers never see a partially
/// populated ticket.
pub struct NewTicketRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_by: Uuid,
    pub office_id: Option<Uuid>,
    pub workstation: Option<String>,
    pub priority: TicketPriority,
    pub media: Vec<MediaEntry>,
    pub location: Option<GeoLocation>,
}

const POPULATED: &str = "SELECT t.id, t.title, t.description, t.created_by, t.assigned_to, \
     t.office_id, t.workstation, t.status, t.priority, t.media, t.location, t.shared_with, \
     t.closed_at, t.closed_by, t.created_at, t.updated_at, \
     cu.name AS creator_name, cu.email AS creator_email, \
     au.name AS assignee_name, au.email AS assignee_email, \
     o.name AS office_name \
     FROM tickets t \
     JOIN users cu ON cu.id = t.created_by \
     LEFT JOIN users au ON au.id = t.assigned_to \
     LEFT JOIN offices o ON o.id = t.office_id";

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<TicketRecord>> {
    let rows = sqlx::query_as::<_, TicketRecord>(&format!(
        "{POPULATED} ORDER BY t.created_at DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_for_creator(db: &PgPool, creator: Uuid) -> anyhow::Result<Vec<TicketRecord>> {
    let rows = sqlx::query_as::<_, TicketRecord>(&format!(
        "{POPULATED} WHERE t.created_by = $1 ORDER BY t.created_at DESC"
    ))
    .bind(creator)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn fetch(db: &PgPool, id: Uuid) -> anyhow::Result<Option<TicketRecord>> {
    let row = sqlx::query_as::<_, TicketRecord>(&format!("{POPULATED} WHERE t.id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Just the ownership metadata the policy needs, without the full joins.
pub async fn access_meta(db: &PgPool, id: Uuid) -> anyhow::Result<Option<TicketAccess>> {
    let row = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
        "SELECT created_by, assigned_to FROM tickets WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|(creator, assignee)| TicketAccess { creator, assignee }))
}

/// Single atomic insert; status defaults to 'open' in the schema.
pub async fn insert(db: &PgPool, new: NewTicketRow) -> anyhow::Result<Uuid> {
    sqlx::query(
        "INSERT INTO tickets (id, title, description, created_by, office_id, workstation, \
         priority, media, location)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(new.id)
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.created_by)
    .bind(new.office_id)
    .bind(&new.workstation)
    .bind(new.priority)
    .bind(Json(&new.media))
    .bind(new.location.as_ref().map(Json))
    .execute(db)
    .await?;
    Ok(new.id)
}

/// Persist the outcome of a lifecycle transition.
pub async fn update_state(db: &PgPool, id: Uuid, state: &TicketState) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "UPDATE tickets
         SET status = $2, assigned_to = $3, closed_at = $4, closed_by = $5, updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(state.status)
    .bind(state.assigned_to)
    .bind(state.closed_at)
    .bind(state.closed_by)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn update_shared_with(
    db: &PgPool,
    id: Uuid,
    shared_with: &[String],
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "UPDATE tickets SET shared_with = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(shared_with)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Hard delete. Tickets are the one entity admins may actually remove.
pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
