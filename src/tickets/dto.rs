use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::tickets::repo::{
    GeoLocation, MediaEntry, TicketPriority, TicketRecord, TicketStatus,
};

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct OfficeSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub creator: UserSummary,
    pub assignee: Option<UserSummary>,
    pub office: Option<OfficeSummary>,
    pub workstation: Option<String>,
    pub media: Vec<MediaEntry>,
    pub location: Option<GeoLocation>,
    pub shared_with: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
    pub closed_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<TicketRecord> for TicketResponse {
    fn from(t: TicketRecord) -> Self {
        let assignee = match (t.assigned_to, t.assignee_name, t.assignee_email) {
            (Some(id), Some(name), Some(email)) => Some(UserSummary { id, name, email }),
            _ => None,
        };
        let office = match (t.office_id, t.office_name) {
            (Some(id), Some(name)) => Some(OfficeSummary { id, name }),
            _ => None,
        };
        Self {
            id: t.id,
            title: t.title,
            description: t.description,
            status: t.status,
            priority: t.priority,
            creator: UserSummary {
                id: t.created_by,
                name: t.creator_name,
                email: t.creator_email,
            },
            assignee,
            office,
            workstation: t.workstation,
            media: t.media.0,
            location: t.location.map(|l| l.0),
            shared_with: t.shared_with,
            closed_at: t.closed_at,
            closed_by: t.closed_by,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TicketStatus,
}

/// `assigned_to: null` (or omitted) unassigns the ticket.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub emails: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn record() -> TicketRecord {
        TicketRecord {
            id: Uuid::new_v4(),
            title: "Printer jam".into(),
            description: "Paper stuck in tray 2".into(),
            created_by: Uuid::new_v4(),
            assigned_to: None,
            office_id: None,
            workstation: None,
            status: TicketStatus::Open,
            priority: TicketPriority::Medium,
            media: Json(Vec::new()),
            location: None,
            shared_with: Vec::new(),
            closed_at: None,
            closed_by: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
            creator_name: "Alice".into(),
            creator_email: "alice@example.com".into(),
            assignee_name: None,
            assignee_email: None,
            office_name: None,
        }
    }

    #[test]
    fn fresh_ticket_response_has_expected_defaults() {
        let response = TicketResponse::from(record());
        assert_eq!(response.status, TicketStatus::Open);
        assert_eq!(response.priority, TicketPriority::Medium);
        assert!(response.media.is_empty());
        assert!(response.shared_with.is_empty());
        assert!(response.assignee.is_none());
        assert!(response.closed_at.is_none());
    }

    #[test]
    fn response_serializes_status_snake_case_and_rfc3339_times() {
        let json = serde_json::to_value(TicketResponse::from(record())).unwrap();
        assert_eq!(json["status"], "open");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["creator"]["email"], "alice@example.com");
        // rfc3339 timestamps serialize as strings
        assert!(json["created_at"].is_string());
        assert!(json["closed_at"].is_null());
    }

    #[test]
    fn assign_request_tolerates_null_and_missing() {
        let explicit: AssignRequest = serde_json::from_str(r#"{"assigned_to": null}"#).unwrap();
        assert!(explicit.assigned_to.is_none());
        let omitted: AssignRequest = serde_json::from_str("{}").unwrap();
        assert!(omitted.assigned_to.is_none());
    }
}
