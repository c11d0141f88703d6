use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::ImageAnalyzer;
use crate::auth::repo::User;
use crate::auth::services::is_valid_email;
use crate::error::ApiError;
use crate::mailer::OutgoingEmail;
use crate::offices;
use crate::policy::{can_perform, Action, Role};
use crate::state::AppState;
use crate::storage::StorageClient;
use crate::tickets::lifecycle::{apply_assignment, apply_status, TicketState};
use crate::tickets::repo::{
    self, GeoLocation, MediaAnalysis, MediaEntry, NewTicketRow, TicketPriority, TicketRecord,
    TicketStatus,
};

/// Attachment cap, enforced at the request boundary.
pub const MAX_MEDIA_FILES: usize = 5;

pub struct MediaUpload {
    pub bytes: Bytes,
    pub content_type: String,
}

pub struct NewTicketInput {
    pub title: String,
    pub description: String,
    pub office_id: Option<Uuid>,
    pub workstation: Option<String>,
    pub priority: Option<TicketPriority>,
    pub location_raw: Option<String>,
}

/// Location arrives as a serialized JSON string from the form. Garbage is
/// dropped rather than failing the whole creation.
pub fn parse_location(raw: Option<&str>) -> Option<GeoLocation> {
    let raw = raw?;
    match serde_json::from_str::<GeoLocation>(raw) {
        Ok(loc) => Some(loc),
        Err(e) => {
            warn!(error = %e, "unparseable location, storing none");
            None
        }
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        _ => None,
    }
}

/// Upload every blob and caption the images. Videos are never analyzed; a
/// failed analysis becomes a degraded entry so ticket creation still
/// succeeds. Storage failures abort — a ticket must not reference blobs
/// that were never written.
pub(crate) async fn prepare_media(
    storage: &dyn StorageClient,
    analyzer: &dyn ImageAnalyzer,
    public_base_url: &str,
    ticket_id: Uuid,
    files: Vec<MediaUpload>,
) -> anyhow::Result<Vec<MediaEntry>> {
    let base = public_base_url.trim_end_matches('/');
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        let media_id = Uuid::new_v4();
        let ext = ext_from_mime(&file.content_type).unwrap_or("bin");
        let key = format!("tickets/{}/{}.{}", ticket_id, media_id, ext);

        storage
            .put_object(&key, file.bytes.clone(), &file.content_type)
            .await
            .with_context(|| format!("put_object {key}"))?;

        let analysis = if file.content_type.starts_with("image/") {
            match analyzer.analyze(&file.bytes, &file.content_type).await {
                Ok(result) => Some(MediaAnalysis::from(result)),
                Err(e) => {
                    warn!(error = %e, key = %key, "image analysis failed, storing degraded result");
                    Some(MediaAnalysis::degraded(&e.to_string()))
                }
            }
        } else {
            None
        };

        entries.push(MediaEntry {
            url: format!("{base}/{key}"),
            mime_type: file.content_type,
            analysis,
        });
    }
    Ok(entries)
}

pub async fn create_ticket(
    state: &AppState,
    actor: &User,
    input: NewTicketInput,
    files: Vec<MediaUpload>,
) -> Result<TicketRecord, ApiError> {
    can_perform(actor.id, actor.role, Action::CreateTicket, None).check("ticket")?;

    if input.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".into()));
    }
    if input.description.trim().is_empty() {
        return Err(ApiError::Validation("description is required".into()));
    }

    if let Some(office_id) = input.office_id {
        let office = offices::repo::fetch(&state.db, office_id)
            .await?
            .ok_or(ApiError::Validation("unknown office".to_string()))?;
        if let Some(ws) = input.workstation.as_deref() {
            if !office.workstations.0.iter().any(|w| w.id == ws) {
                return Err(ApiError::Validation(format!(
                    "workstation {ws} does not belong to office {}",
                    office.name
                )));
            }
        }
    }

    let location = parse_location(input.location_raw.as_deref());

    let ticket_id = Uuid::new_v4();
    let media = prepare_media(
        state.storage.as_ref(),
        state.analyzer.as_ref(),
        &state.config.storage.public_base_url,
        ticket_id,
        files,
    )
    .await?;

    repo::insert(
        &state.db,
        NewTicketRow {
            id: ticket_id,
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            created_by: actor.id,
            office_id: input.office_id,
            workstation: input.workstation,
            priority: input.priority.unwrap_or_default(),
            media,
            location,
        },
    )
    .await?;

    info!(ticket_id = %ticket_id, user_id = %actor.id, "ticket created");
    fetch_populated(state, ticket_id).await
}

pub async fn list_tickets(state: &AppState, actor: &User) -> Result<Vec<TicketRecord>, ApiError> {
    let tickets = match actor.role {
        Role::Admin | Role::Servicedesk => repo::list_all(&state.db).await?,
        Role::Standard => repo::list_for_creator(&state.db, actor.id).await?,
    };
    Ok(tickets)
}

pub async fn get_ticket(
    state: &AppState,
    actor: &User,
    ticket_id: Uuid,
) -> Result<TicketRecord, ApiError> {
    let meta = repo::access_meta(&state.db, ticket_id).await?;
    can_perform(actor.id, actor.role, Action::ViewTicket, meta.as_ref()).check("ticket")?;
    fetch_populated(state, ticket_id).await
}

pub async fn update_status(
    state: &AppState,
    actor: &User,
    ticket_id: Uuid,
    new_status: TicketStatus,
) -> Result<TicketRecord, ApiError> {
    let meta = repo::access_meta(&state.db, ticket_id).await?;
    can_perform(actor.id, actor.role, Action::UpdateStatus, meta.as_ref()).check("ticket")?;

    let ticket = fetch_populated(state, ticket_id).await?;
    let mut ticket_state = TicketState::from(&ticket);
    apply_status(
        &mut ticket_state,
        new_status,
        actor.id,
        OffsetDateTime::now_utc(),
    );
    repo::update_state(&state.db, ticket_id, &ticket_state).await?;

    info!(ticket_id = %ticket_id, status = ?new_status, user_id = %actor.id, "status updated");
    fetch_populated(state, ticket_id).await
}

pub async fn assign_ticket(
    state: &AppState,
    actor: &User,
    ticket_id: Uuid,
    assignee: Option<Uuid>,
) -> Result<TicketRecord, ApiError> {
    let meta = repo::access_meta(&state.db, ticket_id).await?;
    can_perform(actor.id, actor.role, Action::Assign, meta.as_ref()).check("ticket")?;
    let previous = meta.and_then(|m| m.assignee);

    if let Some(assignee_id) = assignee {
        let exists = User::find_by_id(&state.db, assignee_id)
            .await?
            .map(|u| u.is_active)
            .unwrap_or(false);
        if !exists {
            return Err(ApiError::Validation(
                "assignee must be an existing active user".into(),
            ));
        }
    }

    let ticket = fetch_populated(state, ticket_id).await?;
    let mut ticket_state = TicketState::from(&ticket);
    apply_assignment(&mut ticket_state, assignee);
    repo::update_state(&state.db, ticket_id, &ticket_state).await?;

    info!(ticket_id = %ticket_id, assignee = ?assignee, previous = ?previous, user_id = %actor.id, "ticket assignment updated");
    fetch_populated(state, ticket_id).await
}

/// Derive the storage key of a media entry from its public URL. Foreign URLs
/// yield `None` and are left alone.
pub(crate) fn object_key<'a>(url: &'a str, public_base_url: &str) -> Option<&'a str> {
    let base = public_base_url.trim_end_matches('/');
    let rest = url.strip_prefix(base)?.strip_prefix('/')?;
    (!rest.is_empty()).then_some(rest)
}

pub async fn delete_ticket(
    state: &AppState,
    actor: &User,
    ticket_id: Uuid,
) -> Result<(), ApiError> {
    let meta = repo::access_meta(&state.db, ticket_id).await?;
    can_perform(actor.id, actor.role, Action::DeleteTicket, meta.as_ref()).check("ticket")?;

    let ticket = fetch_populated(state, ticket_id).await?;
    if !repo::delete(&state.db, ticket_id).await? {
        return Err(ApiError::NotFound("ticket"));
    }

    // Best-effort cleanup of the stored blobs; the ticket row is already gone.
    for entry in &ticket.media.0 {
        if let Some(key) = object_key(&entry.url, &state.config.storage.public_base_url) {
            if let Err(e) = state.storage.delete_object(key).await {
                warn!(error = %e, key = %key, "failed to delete stored media");
            }
        }
    }

    info!(ticket_id = %ticket_id, user_id = %actor.id, "ticket deleted");
    Ok(())
}

/// Normalize and syntax-check share recipients. Any invalid address rejects
/// the whole request, listing every offender; nothing is dispatched.
pub fn validate_recipients(raw: &[String]) -> Result<Vec<String>, ApiError> {
    let mut valid: Vec<String> = Vec::with_capacity(raw.len());
    let mut invalid: Vec<String> = Vec::new();
    for entry in raw {
        let email = entry.trim().to_lowercase();
        if is_valid_email(&email) {
            if !valid.contains(&email) {
                valid.push(email);
            }
        } else {
            invalid.push(entry.trim().to_string());
        }
    }
    if !invalid.is_empty() {
        return Err(ApiError::InvalidEmails(invalid));
    }
    if valid.is_empty() {
        return Err(ApiError::Validation(
            "at least one recipient address is required".into(),
        ));
    }
    Ok(valid)
}

/// Union merge, preserving first-seen order. Re-sharing an address is a
/// no-op on the set.
pub fn merge_shared_with(existing: &[String], new: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for email in new {
        if !merged.iter().any(|e| e == email) {
            merged.push(email.clone());
        }
    }
    merged
}

pub fn render_share_email(
    ticket: &TicketRecord,
    shared_by: &User,
    app_url: &str,
    recipients: Vec<String>,
) -> OutgoingEmail {
    let mut details = format!(
        "<p><b>Status:</b> {}</p>\n<p><b>Priority:</b> {}</p>\n<p style=\"white-space: pre-wrap;\">{}</p>\n",
        ticket.status.as_str(),
        ticket.priority.as_str(),
        ticket.description,
    );
    if let Some(office) = &ticket.office_name {
        details.push_str(&format!("<p><b>Office:</b> {office}</p>\n"));
    }
    if let Some(workstation) = &ticket.workstation {
        details.push_str(&format!("<p><b>Workstation:</b> {workstation}</p>\n"));
    }
    if let Some(assignee) = &ticket.assignee_name {
        details.push_str(&format!("<p><b>Assigned to:</b> {assignee}</p>\n"));
    }
    if !ticket.media.0.is_empty() {
        details.push_str(&format!(
            "<p><b>Attachments:</b> {} file(s)</p>\n",
            ticket.media.0.len()
        ));
    }

    let html = format!(
        "<html><body>\n\
         <h1>Ticket shared with you</h1>\n\
         <p><b>{sharer}</b> ({sharer_email}) has shared a ticket with you:</p>\n\
         <h2>{title}</h2>\n\
         {details}\
         <p><b>Created by:</b> {creator} ({creator_email})</p>\n\
         <p><a href=\"{app_url}/tickets/{id}\">View ticket details</a></p>\n\
         <p>This is an automated message. Please do not reply.</p>\n\
         </body></html>",
        sharer = shared_by.name,
        sharer_email = shared_by.email,
        title = ticket.title,
        details = details,
        creator = ticket.creator_name,
        creator_email = ticket.creator_email,
        app_url = app_url.trim_end_matches('/'),
        id = ticket.id,
    );

    OutgoingEmail {
        to: recipients,
        subject: format!("Ticket Shared: {}", ticket.title),
        html,
    }
}

/// Share flow: validate, authorize, dispatch, and only then record the
/// recipients. A failed dispatch never grows `shared_with`.
pub async fn share_ticket(
    state: &AppState,
    actor: &User,
    ticket_id: Uuid,
    emails: Vec<String>,
) -> Result<TicketRecord, ApiError> {
    let recipients = validate_recipients(&emails)?;

    let meta = repo::access_meta(&state.db, ticket_id).await?;
    can_perform(actor.id, actor.role, Action::ShareTicket, meta.as_ref()).check("ticket")?;

    let ticket = fetch_populated(state, ticket_id).await?;
    let mail = render_share_email(
        &ticket,
        actor,
        &state.config.mailer.app_url,
        recipients.clone(),
    );

    state
        .mailer
        .send(&mail)
        .await
        .map_err(|e| ApiError::Collaborator(format!("email dispatch failed: {e}")))?;

    let merged = merge_shared_with(&ticket.shared_with, &recipients);
    repo::update_shared_with(&state.db, ticket_id, &merged).await?;

    info!(ticket_id = %ticket_id, recipients = recipients.len(), user_id = %actor.id, "ticket shared");
    fetch_populated(state, ticket_id).await
}

async fn fetch_populated(state: &AppState, ticket_id: Uuid) -> Result<TicketRecord, ApiError> {
    repo::fetch(&state.db, ticket_id)
        .await?
        .ok_or(ApiError::NotFound("ticket"))
}


#[cfg(test)]
mod recipient_tests {
    use super::*;

    #[test]
    fn normalizes_and_deduplicates() {
        let out = validate_recipients(&[
            " Amy@Example.com ".into(),
            "amy@example.com".into(),
            "bob@example.com".into(),
        ])
        .unwrap();
        assert_eq!(out, vec!["amy@example.com", "bob@example.com"]);
    }

    #[test]
    fn one_bad_address_rejects_the_whole_list() {
        let err = validate_recipients(&[
            "good@example.com".into(),
            "bad-address".into(),
            "also@bad".into(),
        ])
        .unwrap_err();
        match err {
            ApiError::InvalidEmails(bad) => {
                assert_eq!(bad, vec!["bad-address", "also@bad"]);
            }
            other => panic!("expected InvalidEmails, got {other:?}"),
        }
    }

    #[test]
    fn empty_list_is_a_validation_error() {
        assert!(matches!(
            validate_recipients(&[]),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn merge_is_idempotent_and_append_only() {
        let existing = vec!["a@example.com".to_string(), "b@example.com".to_string()];
        let merged = merge_shared_with(&existing, &["b@example.com".into(), "c@example.com".into()]);
        assert_eq!(merged, vec!["a@example.com", "b@example.com", "c@example.com"]);

        // sharing the same address again changes nothing
        let again = merge_shared_with(&merged, &["c@example.com".into()]);
        assert_eq!(again, merged);
    }
}
