use crate::helper::post_helpers::{self, PostValidationError};
use crate::models::db_operations::{change_requests_db_operations, posts_db_operations, users_db_operations, DbError};
use crate::models::{
    ChangeRequest, ChangeStatus, ChangeType, Post, PostDraft, PostPatch, ReviewAction, Role, RoleChange,
    RoleChangeAction, RoleFlags,
};
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found.")]
    NotFound(String),
    #[error("This change request has already been {0}.")]
    AlreadyReviewed(ChangeStatus),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid change payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(e: rusqlite::Error) -> Self {
        WorkflowError::Db(DbError::Rusqlite(e))
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(e: serde_json::Error) -> Self {
        WorkflowError::Db(DbError::SerdeJson(e))
    }
}

impl From<PostValidationError> for WorkflowError {
    fn from(e: PostValidationError) -> Self {
        WorkflowError::Validation(e.to_string())
    }
}

/// Typed form of `proposed_changes` for each change type.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangePayload {
    PostEdit(PostPatch),
    PostDelete,
    PostCreate(PostDraft),
    UserRoleChange(RoleChange),
}

impl ChangePayload {
    pub fn change_type(&self) -> ChangeType {
        match self {
            ChangePayload::PostEdit(_) => ChangeType::PostEdit,
            ChangePayload::PostDelete => ChangeType::PostDelete,
            ChangePayload::PostCreate(_) => ChangeType::PostCreate,
            ChangePayload::UserRoleChange(_) => ChangeType::UserRoleChange,
        }
    }

    pub fn decode(change_type: ChangeType, proposed: &Value) -> Result<Self, WorkflowError> {
        let invalid = |e: serde_json::Error| WorkflowError::InvalidPayload(format!("{}: {}", change_type.as_str(), e));
        match change_type {
            ChangeType::PostEdit => {
                let patch: PostPatch = serde_json::from_value(proposed.clone()).map_err(invalid)?;
                if patch.is_empty() {
                    return Err(WorkflowError::InvalidPayload("post_edit proposes no changes".to_string()));
                }
                Ok(ChangePayload::PostEdit(patch))
            }
            ChangeType::PostDelete => Ok(ChangePayload::PostDelete),
            ChangeType::PostCreate => Ok(ChangePayload::PostCreate(
                serde_json::from_value(proposed.clone()).map_err(invalid)?,
            )),
            ChangeType::UserRoleChange => {
                let change: RoleChange = serde_json::from_value(proposed.clone()).map_err(invalid)?;
                if change.role != Role::Admin {
                    return Err(WorkflowError::InvalidPayload(
                        "only the admin role can be granted or revoked through change requests".to_string(),
                    ));
                }
                Ok(ChangePayload::UserRoleChange(change))
            }
        }
    }

    pub fn to_value(&self) -> Result<Value, WorkflowError> {
        Ok(match self {
            ChangePayload::PostEdit(patch) => serde_json::to_value(patch)?,
            ChangePayload::PostDelete => serde_json::json!({ "action": "delete" }),
            ChangePayload::PostCreate(draft) => serde_json::to_value(draft)?,
            ChangePayload::UserRoleChange(change) => serde_json::to_value(change)?,
        })
    }
}

/// Side effects of applying a mutation that callers act on after commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedEffect {
    pub target_id: Option<String>,
    /// Set when a post moved from draft to published.
    pub published_post_id: Option<String>,
    pub settings_changed: bool,
}

#[derive(Debug)]
pub struct ReviewOutcome {
    pub request: ChangeRequest,
    pub effect: AppliedEffect,
}

/// Queues a proposed mutation for owner review. The target entity is not touched.
///
/// Only admins who are not owners submit; owners act directly.
pub fn submit_change_request(
    conn: &Connection,
    requester_id: &str,
    flags: RoleFlags,
    change_type: ChangeType,
    target_id: &str,
    original_data: Option<Value>,
    proposed_changes: Value,
    change_summary: &str,
) -> Result<String, WorkflowError> {
    if !flags.is_admin || flags.is_owner {
        return Err(WorkflowError::Forbidden(
            "Only admins submit change requests; owners apply changes directly.".to_string(),
        ));
    }
    if change_type.requires_original() != original_data.is_some() {
        return Err(WorkflowError::InvalidPayload(format!(
            "{} {} original data",
            change_type.as_str(),
            if change_type.requires_original() { "requires" } else { "must not carry" }
        )));
    }
    if target_id.trim().is_empty() {
        return Err(WorkflowError::InvalidPayload("target id is required".to_string()));
    }
    let summary = change_summary.trim();
    if summary.is_empty() {
        return Err(WorkflowError::Validation("A change summary is required.".to_string()));
    }

    let payload = ChangePayload::decode(change_type, &proposed_changes)?;
    if let ChangePayload::PostCreate(draft) = &payload {
        // Reject a draft the owner could never approve.
        post_helpers::build_post(target_id, draft, Utc::now())?;
    }

    let id = uuid::Uuid::new_v4().to_string();
    change_requests_db_operations::insert_change_request(
        conn,
        &id,
        change_type,
        target_id,
        requester_id,
        original_data.as_ref(),
        &proposed_changes,
        summary,
    )?;
    log::info!(
        "Change request {} ({}) on '{}' submitted by {}",
        id,
        change_type.as_str(),
        target_id,
        requester_id
    );
    Ok(id)
}

/// Resolves a pending request. Approval applies the payload; the status
/// update and the entity mutation commit together or not at all.
pub fn review_change_request(
    conn: &mut Connection,
    request_id: &str,
    reviewer_id: &str,
    flags: RoleFlags,
    action: ReviewAction,
    notes: Option<&str>,
) -> Result<ReviewOutcome, WorkflowError> {
    if !flags.is_owner {
        return Err(WorkflowError::Forbidden("Only the owner can review change requests.".to_string()));
    }
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let request = change_requests_db_operations::read_change_request(&tx, request_id)?
        .ok_or_else(|| WorkflowError::NotFound("Change request".to_string()))?;
    if request.status != ChangeStatus::Pending {
        return Err(WorkflowError::AlreadyReviewed(request.status));
    }

    let (status, effect) = match action {
        ReviewAction::Approve => {
            let payload = ChangePayload::decode(request.change_type, &request.proposed_changes)?;
            let effect = apply_payload(&tx, &request.target_id, request.original_data.as_ref(), &payload, reviewer_id)?;
            (ChangeStatus::Approved, effect)
        }
        ReviewAction::Reject => (ChangeStatus::Rejected, AppliedEffect::default()),
    };

    let updated = change_requests_db_operations::mark_reviewed(&tx, request_id, status, reviewer_id, Utc::now(), notes)?;
    if updated == 0 {
        return Err(WorkflowError::AlreadyReviewed(request.status));
    }
    let resolved = change_requests_db_operations::read_change_request(&tx, request_id)?
        .ok_or_else(|| WorkflowError::NotFound("Change request".to_string()))?;
    tx.commit()?;

    log::info!("Change request {} {} by {}", request_id, status, reviewer_id);
    Ok(ReviewOutcome { request: resolved, effect })
}

/// Applies a payload to its target. Shared by approvals and the owner's
/// direct writes; `original` is only present for approvals and enables
/// the stale-snapshot check.
pub(crate) fn apply_payload(
    conn: &Connection,
    target_id: &str,
    original: Option<&Value>,
    payload: &ChangePayload,
    actor_id: &str,
) -> Result<AppliedEffect, WorkflowError> {
    let now = Utc::now();
    let mut effect = AppliedEffect { target_id: Some(target_id.to_string()), ..Default::default() };

    match payload {
        ChangePayload::PostEdit(patch) => {
            let existing = load_post(conn, target_id)?;
            ensure_snapshot_current(original, &existing)?;
            let updated = post_helpers::apply_patch(&existing, patch, now)?;
            ensure_slug_free(conn, &updated)?;
            posts_db_operations::update_post(conn, &updated)?;
            posts_db_operations::record_audit(conn, target_id, "UPDATE", &updated.title, Some(actor_id))?;
            if post_helpers::became_published(Some(&existing), &updated) {
                effect.published_post_id = Some(updated.id);
            }
        }
        ChangePayload::PostDelete => {
            let existing = load_post(conn, target_id)?;
            ensure_snapshot_current(original, &existing)?;
            posts_db_operations::delete_post(conn, target_id)?;
            posts_db_operations::record_audit(conn, target_id, "DELETE", &existing.title, Some(actor_id))?;
        }
        ChangePayload::PostCreate(draft) => {
            if posts_db_operations::read_post(conn, target_id)?.is_some() {
                return Err(WorkflowError::Conflict(format!("A post with id '{}' already exists.", target_id)));
            }
            let post = post_helpers::build_post(target_id, draft, now)?;
            ensure_slug_free(conn, &post)?;
            posts_db_operations::insert_post(conn, &post)?;
            posts_db_operations::record_audit(conn, target_id, "INSERT", &post.title, Some(actor_id))?;
            if post.is_published {
                effect.published_post_id = Some(post.id);
            }
        }
        ChangePayload::UserRoleChange(change) => {
            let user_id = original
                .and_then(|o| o.get("id"))
                .and_then(Value::as_str)
                .unwrap_or(target_id);
            if users_db_operations::read_profile(conn, user_id)?.is_none() {
                return Err(WorkflowError::NotFound("User".to_string()));
            }
            match change.action {
                RoleChangeAction::AddRole => users_db_operations::grant_role(conn, user_id, change.role)?,
                RoleChangeAction::RemoveRole => users_db_operations::revoke_role(conn, user_id, change.role)?,
            };
            effect.target_id = Some(user_id.to_string());
        }
    }
    Ok(effect)
}

fn load_post(conn: &Connection, post_id: &str) -> Result<Post, WorkflowError> {
    posts_db_operations::read_post(conn, post_id)?.ok_or_else(|| WorkflowError::NotFound("Post".to_string()))
}

fn ensure_slug_free(conn: &Connection, post: &Post) -> Result<(), WorkflowError> {
    if posts_db_operations::slug_taken(conn, post.category, &post.slug, &post.id)? {
        return Err(WorkflowError::Conflict(format!(
            "Another {} post already uses the slug '{}'.",
            post.category, post.slug
        )));
    }
    Ok(())
}

/// Every field captured in the snapshot must still hold its captured value.
fn ensure_snapshot_current(original: Option<&Value>, current: &Post) -> Result<(), WorkflowError> {
    let Some(Value::Object(snapshot)) = original else {
        return Ok(());
    };
    let current = serde_json::to_value(current)?;
    for (field, expected) in snapshot {
        if let Some(actual) = current.get(field) {
            if actual != expected {
                return Err(WorkflowError::Conflict(format!(
                    "The post's '{}' changed after this request was submitted. Reject it and ask for a fresh proposal.",
                    field
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_rejects_empty_edit() {
        assert!(matches!(
            ChangePayload::decode(ChangeType::PostEdit, &json!({})),
            Err(WorkflowError::InvalidPayload(_))
        ));
        assert_eq!(
            ChangePayload::decode(ChangeType::PostEdit, &json!({"title": "New"})).unwrap(),
            ChangePayload::PostEdit(PostPatch { title: Some("New".to_string()), ..Default::default() })
        );
    }

    #[test]
    fn role_changes_only_touch_admin() {
        let payload = ChangePayload::decode(ChangeType::UserRoleChange, &json!({"action": "add_role", "role": "admin"}));
        assert!(payload.is_ok());
        let owner = ChangePayload::decode(ChangeType::UserRoleChange, &json!({"action": "add_role", "role": "owner"}));
        assert!(matches!(owner, Err(WorkflowError::InvalidPayload(_))));
    }

    #[test]
    fn payload_round_trips_through_json() {
        let payload = ChangePayload::UserRoleChange(RoleChange { action: RoleChangeAction::RemoveRole, role: Role::Admin });
        let value = payload.to_value().unwrap();
        assert_eq!(value, json!({"action": "remove_role", "role": "admin"}));
        assert_eq!(ChangePayload::decode(payload.change_type(), &value).unwrap(), payload);
    }
}
