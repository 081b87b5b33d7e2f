//! Direct-Write Gate: decides whether a privileged mutation is applied
//! immediately, deferred into the change-request queue, or refused.

use crate::helper::change_request_helpers::{self, AppliedEffect, ChangePayload, WorkflowError};
use crate::helper::post_helpers::{self, generate_slug};
use crate::helper::sanitization_helpers::strip_all_html;
use crate::models::db_operations::{comments_db_operations, posts_db_operations, site_db_operations, users_db_operations, DbError};
use crate::models::settings::{SettingError, SiteSettings};
use crate::models::{
    AboutContent, CategoryInput, PostDraft, PostPatch, Role, RoleChange, RoleChangeAction, RoleFlags, SettingUpdate,
};
use chrono::Utc;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Post,
    UserRole,
    Comment,
    ContactMessage,
    SiteSetting,
    Category,
    AboutContent,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Post,
        ResourceKind::UserRole,
        ResourceKind::Comment,
        ResourceKind::ContactMessage,
        ResourceKind::SiteSetting,
        ResourceKind::Category,
        ResourceKind::AboutContent,
    ];

    /// Gated resources need owner approval when an admin changes them.
    pub fn is_gated(self) -> bool {
        matches!(self, ResourceKind::Post | ResourceKind::UserRole)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    Direct,
    Deferred,
    Refused,
}

pub fn can_act_directly(resource: ResourceKind, flags: RoleFlags) -> bool {
    if flags.is_owner {
        return true;
    }
    flags.is_admin && !resource.is_gated()
}

pub fn write_path(resource: ResourceKind, flags: RoleFlags) -> WritePath {
    if can_act_directly(resource, flags) {
        WritePath::Direct
    } else if flags.is_admin {
        WritePath::Deferred
    } else {
        WritePath::Refused
    }
}

/// Every mutation that requires admin privileges.
#[derive(Debug, Clone)]
pub enum PrivilegedAction {
    CreatePost(PostDraft),
    EditPost { post_id: String, patch: PostPatch },
    DeletePost { post_id: String },
    SetAdminRole { user_id: String, grant: bool },
    SetCommentApproval { comment_id: String, approved: bool },
    DeleteComment { comment_id: String },
    MarkMessageRead { message_id: String },
    MarkMessageReplied { message_id: String },
    DeleteMessage { message_id: String },
    UpsertSettings(Vec<SettingUpdate>),
    CreateCategory(CategoryInput),
    UpdateCategory { category_id: String, input: CategoryInput },
    ToggleCategory { category_id: String },
    DeleteCategory { category_id: String },
    SaveAbout(AboutContent),
}

impl PrivilegedAction {
    pub fn resource(&self) -> ResourceKind {
        match self {
            PrivilegedAction::CreatePost(_)
            | PrivilegedAction::EditPost { .. }
            | PrivilegedAction::DeletePost { .. } => ResourceKind::Post,
            PrivilegedAction::SetAdminRole { .. } => ResourceKind::UserRole,
            PrivilegedAction::SetCommentApproval { .. } | PrivilegedAction::DeleteComment { .. } => ResourceKind::Comment,
            PrivilegedAction::MarkMessageRead { .. }
            | PrivilegedAction::MarkMessageReplied { .. }
            | PrivilegedAction::DeleteMessage { .. } => ResourceKind::ContactMessage,
            PrivilegedAction::UpsertSettings(_) => ResourceKind::SiteSetting,
            PrivilegedAction::CreateCategory(_)
            | PrivilegedAction::UpdateCategory { .. }
            | PrivilegedAction::ToggleCategory { .. }
            | PrivilegedAction::DeleteCategory { .. } => ResourceKind::Category,
            PrivilegedAction::SaveAbout(_) => ResourceKind::AboutContent,
        }
    }

    /// Target id and typed payload of the gated actions.
    fn into_change(self) -> Option<(String, ChangePayload)> {
        match self {
            PrivilegedAction::CreatePost(draft) => {
                Some((uuid::Uuid::new_v4().to_string(), ChangePayload::PostCreate(draft)))
            }
            PrivilegedAction::EditPost { post_id, patch } => Some((post_id, ChangePayload::PostEdit(patch))),
            PrivilegedAction::DeletePost { post_id } => Some((post_id, ChangePayload::PostDelete)),
            PrivilegedAction::SetAdminRole { user_id, grant } => Some((
                user_id,
                ChangePayload::UserRoleChange(RoleChange {
                    action: if grant { RoleChangeAction::AddRole } else { RoleChangeAction::RemoveRole },
                    role: Role::Admin,
                }),
            )),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ActionOutcome {
    Applied(AppliedEffect),
    Queued { request_id: String },
}

/// Single entry point for privileged mutations.
pub fn perform_gated_action(
    conn: &mut Connection,
    actor_id: &str,
    flags: RoleFlags,
    action: PrivilegedAction,
) -> Result<ActionOutcome, WorkflowError> {
    let resource = action.resource();
    match write_path(resource, flags) {
        WritePath::Refused => {
            log::warn!("Refused {:?} mutation by non-admin principal {}", resource, actor_id);
            Err(WorkflowError::Forbidden("Admin privileges are required.".to_string()))
        }
        WritePath::Deferred => {
            let request_id = defer(conn, actor_id, flags, action)?;
            Ok(ActionOutcome::Queued { request_id })
        }
        WritePath::Direct => apply_direct(conn, actor_id, action).map(ActionOutcome::Applied),
    }
}

fn defer(conn: &Connection, actor_id: &str, flags: RoleFlags, action: PrivilegedAction) -> Result<String, WorkflowError> {
    let (target_id, payload) = action
        .into_change()
        .ok_or_else(|| WorkflowError::Forbidden("This action cannot be queued for approval.".to_string()))?;

    let (original_data, summary) = match &payload {
        ChangePayload::PostEdit(_) | ChangePayload::PostDelete => {
            let post = posts_db_operations::read_post(conn, &target_id)?
                .ok_or_else(|| WorkflowError::NotFound("Post".to_string()))?;
            let verb = if matches!(payload, ChangePayload::PostDelete) { "Delete" } else { "Edit" };
            (Some(serde_json::to_value(&post)?), format!("{} post: {}", verb, post.title))
        }
        ChangePayload::PostCreate(draft) => {
            let post = post_helpers::build_post(&target_id, draft, Utc::now())?;
            (None, format!("Create new post: {}", post.title))
        }
        ChangePayload::UserRoleChange(change) => {
            let user = users_db_operations::read_user_summary(conn, &target_id)?
                .ok_or_else(|| WorkflowError::NotFound("User".to_string()))?;
            let new_role = match change.action {
                RoleChangeAction::AddRole => Role::Admin,
                RoleChangeAction::RemoveRole => Role::User,
            };
            let summary = format!("Change role of {} from {} to {}", user.display_name, user.role, new_role);
            (Some(serde_json::to_value(&user)?), summary)
        }
    };

    change_request_helpers::submit_change_request(
        conn,
        actor_id,
        flags,
        payload.change_type(),
        &target_id,
        original_data,
        payload.to_value()?,
        &summary,
    )
}

fn not_found_unless_changed(changed: usize, what: &str) -> Result<(), WorkflowError> {
    if changed == 0 {
        return Err(WorkflowError::NotFound(what.to_string()));
    }
    Ok(())
}

fn apply_direct(conn: &mut Connection, actor_id: &str, action: PrivilegedAction) -> Result<AppliedEffect, WorkflowError> {
    let mut effect = AppliedEffect::default();
    match action {
        PrivilegedAction::CreatePost(_)
        | PrivilegedAction::EditPost { .. }
        | PrivilegedAction::DeletePost { .. }
        | PrivilegedAction::SetAdminRole { .. } => {
            let (target_id, payload) = action
                .into_change()
                .ok_or_else(|| WorkflowError::Forbidden("Unsupported action.".to_string()))?;
            if let ChangePayload::PostEdit(patch) = &payload {
                if patch.is_empty() {
                    return Err(WorkflowError::Validation("Nothing to change.".to_string()));
                }
            }
            let tx = conn.transaction()?;
            effect = change_request_helpers::apply_payload(&tx, &target_id, None, &payload, actor_id)?;
            tx.commit()?;
        }
        PrivilegedAction::SetCommentApproval { comment_id, approved } => {
            let changed = comments_db_operations::set_comment_approval(conn, &comment_id, approved)?;
            not_found_unless_changed(changed, "Comment")?;
            effect.target_id = Some(comment_id);
        }
        PrivilegedAction::DeleteComment { comment_id } => {
            let changed = comments_db_operations::delete_comment(conn, &comment_id)?;
            not_found_unless_changed(changed, "Comment")?;
            effect.target_id = Some(comment_id);
        }
        PrivilegedAction::MarkMessageRead { message_id } => {
            let changed = site_db_operations::mark_message_read(conn, &message_id)?;
            not_found_unless_changed(changed, "Message")?;
            effect.target_id = Some(message_id);
        }
        PrivilegedAction::MarkMessageReplied { message_id } => {
            let changed = site_db_operations::mark_message_replied(conn, &message_id)?;
            not_found_unless_changed(changed, "Message")?;
            effect.target_id = Some(message_id);
        }
        PrivilegedAction::DeleteMessage { message_id } => {
            let changed = site_db_operations::delete_contact_message(conn, &message_id)?;
            not_found_unless_changed(changed, "Message")?;
            effect.target_id = Some(message_id);
        }
        PrivilegedAction::UpsertSettings(updates) => {
            if updates.is_empty() {
                return Err(WorkflowError::Validation("No settings to save.".to_string()));
            }
            for update in &updates {
                match SiteSettings::validate(&update.key, &update.value) {
                    Ok(()) | Err(SettingError::UnknownKey(_)) => {}
                    Err(e) => return Err(WorkflowError::Validation(e.to_string())),
                }
            }
            let tx = conn.transaction()?;
            for update in &updates {
                site_db_operations::upsert_setting(
                    &tx,
                    update.key.trim(),
                    &update.value,
                    update.category.as_deref(),
                    update.description.as_deref(),
                )?;
            }
            tx.commit()?;
            effect.settings_changed = true;
        }
        PrivilegedAction::CreateCategory(input) => {
            let input = clean_category(input)?;
            let id = site_db_operations::insert_category(conn, &input).map_err(category_conflict)?;
            effect.target_id = Some(id);
        }
        PrivilegedAction::UpdateCategory { category_id, input } => {
            let input = clean_category(input)?;
            let changed = site_db_operations::update_category(conn, &category_id, &input).map_err(category_conflict)?;
            not_found_unless_changed(changed, "Category")?;
            effect.target_id = Some(category_id);
        }
        PrivilegedAction::ToggleCategory { category_id } => {
            let changed = site_db_operations::toggle_category(conn, &category_id)?;
            not_found_unless_changed(changed, "Category")?;
            effect.target_id = Some(category_id);
        }
        PrivilegedAction::DeleteCategory { category_id } => {
            let changed = site_db_operations::delete_category(conn, &category_id)?;
            not_found_unless_changed(changed, "Category")?;
            effect.target_id = Some(category_id);
        }
        PrivilegedAction::SaveAbout(about) => {
            if about.title.trim().is_empty() {
                return Err(WorkflowError::Validation("The about page needs a title.".to_string()));
            }
            site_db_operations::upsert_about(conn, &about)?;
        }
    }
    log::info!("Direct write applied by {}", actor_id);
    Ok(effect)
}

fn clean_category(mut input: CategoryInput) -> Result<CategoryInput, WorkflowError> {
    input.title = strip_all_html(&input.title);
    input.slug = generate_slug(&input.slug);
    if input.title.is_empty() || input.slug.is_empty() {
        return Err(WorkflowError::Validation("A category needs a title and a slug.".to_string()));
    }
    input.tags = input
        .tags
        .iter()
        .map(|t| strip_all_html(t))
        .filter(|t| !t.is_empty())
        .collect();
    Ok(input)
}

fn category_conflict(e: DbError) -> WorkflowError {
    match e {
        DbError::Rusqlite(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            WorkflowError::Conflict("A category with this slug already exists.".to_string())
        }
        other => WorkflowError::Db(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(role: Role) -> RoleFlags {
        match role {
            Role::User => RoleFlags::default(),
            Role::Admin => RoleFlags { is_admin: true, is_owner: false },
            Role::Owner => RoleFlags { is_admin: true, is_owner: true },
        }
    }

    #[test]
    fn gate_table() {
        for resource in ResourceKind::ALL {
            assert!(can_act_directly(resource, flags(Role::Owner)), "owner on {:?}", resource);
            assert!(!can_act_directly(resource, flags(Role::User)), "user on {:?}", resource);
            assert_eq!(
                can_act_directly(resource, flags(Role::Admin)),
                !matches!(resource, ResourceKind::Post | ResourceKind::UserRole),
                "admin on {:?}",
                resource
            );
        }
    }

    #[test]
    fn write_paths_by_role() {
        assert_eq!(write_path(ResourceKind::Post, flags(Role::Admin)), WritePath::Deferred);
        assert_eq!(write_path(ResourceKind::UserRole, flags(Role::Admin)), WritePath::Deferred);
        assert_eq!(write_path(ResourceKind::Comment, flags(Role::Admin)), WritePath::Direct);
        assert_eq!(write_path(ResourceKind::Post, flags(Role::Owner)), WritePath::Direct);
        assert_eq!(write_path(ResourceKind::SiteSetting, flags(Role::User)), WritePath::Refused);
    }

    #[test]
    fn actions_map_to_resources() {
        let toggle = PrivilegedAction::SetAdminRole { user_id: "u".to_string(), grant: true };
        assert_eq!(toggle.resource(), ResourceKind::UserRole);
        let publish = PrivilegedAction::EditPost {
            post_id: "p".to_string(),
            patch: PostPatch { is_published: Some(true), ..Default::default() },
        };
        assert_eq!(publish.resource(), ResourceKind::Post);
        assert_eq!(PrivilegedAction::SaveAbout(AboutContent::default()).resource(), ResourceKind::AboutContent);
    }

    #[test]
    fn refused_actions_do_not_touch_the_database() {
        // No schema at all: a refused action must fail before any query.
        let mut conn = Connection::open_in_memory().unwrap();
        let result = perform_gated_action(
            &mut conn,
            "reader",
            flags(Role::User),
            PrivilegedAction::DeleteComment { comment_id: "c".to_string() },
        );
        assert!(matches!(result, Err(WorkflowError::Forbidden(_))));
    }
}
