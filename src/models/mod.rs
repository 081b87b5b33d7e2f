pub mod db_operations;
pub mod settings;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- Roles ---

/// Effective role of a principal. `User` is implicit (no grant row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Privilege flags derived from a principal's role grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleFlags {
    pub is_admin: bool,
    pub is_owner: bool,
}

impl RoleFlags {
    /// Owner implies admin.
    pub fn from_grants(grants: &[Role]) -> Self {
        let is_owner = grants.contains(&Role::Owner);
        let is_admin = is_owner || grants.contains(&Role::Admin);
        RoleFlags { is_admin, is_owner }
    }

    pub fn role(&self) -> Role {
        if self.is_owner {
            Role::Owner
        } else if self.is_admin {
            Role::Admin
        } else {
            Role::User
        }
    }
}

// --- Users ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub email_notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileStats {
    pub comment_count: i64,
    pub approved_comment_count: i64,
}

/// Row of the user management listing. Also the snapshot stored in
/// `original_data` of a role change request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub registered_at: DateTime<Utc>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
}

// --- Posts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostCategory {
    MentalHealth,
    CurrentAffairs,
    CreativeWriting,
    Books,
}

impl PostCategory {
    pub const ALL: [PostCategory; 4] = [
        PostCategory::MentalHealth,
        PostCategory::CurrentAffairs,
        PostCategory::CreativeWriting,
        PostCategory::Books,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostCategory::MentalHealth => "mental-health",
            PostCategory::CurrentAffairs => "current-affairs",
            PostCategory::CreativeWriting => "creative-writing",
            PostCategory::Books => "books",
        }
    }

    /// Human-facing label used in feeds, emails and analytics.
    pub fn label(&self) -> &'static str {
        match self {
            PostCategory::MentalHealth => "Mind Matters",
            PostCategory::CurrentAffairs => "News & Views",
            PostCategory::CreativeWriting => "Bleeding Ink",
            PostCategory::Books => "Reading Reflections",
        }
    }
}

impl fmt::Display for PostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown post category '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub category: PostCategory,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub pdf_url: Option<String>,
    pub cover_url: Option<String>,
    pub read_time_min: u32,
    pub is_published: bool,
    pub uploaded_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Payload of a post creation, direct or proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub category: PostCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

/// Partial post update. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<PostCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        *self == PostPatch::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub post_id: String,
    pub action: String,
    pub post_title: Option<String>,
    pub changed_by: Option<String>,
    pub changed_by_name: Option<String>,
    pub changed_at: DateTime<Utc>,
}

// --- Comments ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub user_id: Option<String>,
    pub display_name: String,
    pub message: String,
    pub is_approved: bool,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub message: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

// --- Contact messages ---

#[derive(Debug, Clone, Serialize)]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub is_read: bool,
    pub is_replied: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

// --- Categories ---

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub color: String,
    pub icon: String,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub color: String,
    pub icon: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_true() -> bool {
    true
}

// --- About page ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub linkedin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboutContent {
    pub title: String,
    pub subtitle: String,
    pub bio: String,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(default)]
    pub cover_image_url: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default)]
    pub fun_facts: Vec<String>,
    #[serde(default)]
    pub favorite_quote: String,
    #[serde(default)]
    pub quote_author: String,
}

impl Default for AboutContent {
    fn default() -> Self {
        AboutContent {
            title: "Meet Niyati".to_string(),
            subtitle: "The voice behind the words".to_string(),
            bio: "Writer, reader and seeker of honest conversations about the mind, the world and the stories we tell ourselves.".to_string(),
            profile_image_url: String::new(),
            cover_image_url: String::new(),
            interests: vec![
                "Mental Health Advocacy".to_string(),
                "Creative Writing".to_string(),
                "Current Affairs".to_string(),
                "Books".to_string(),
            ],
            social_links: SocialLinks::default(),
            fun_facts: Vec::new(),
            favorite_quote: "The unexamined life is not worth living.".to_string(),
            quote_author: "Socrates".to_string(),
        }
    }
}

// --- Site settings ---

/// Raw settings row as stored and served by `/api/settings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettingRow {
    pub key: String,
    pub value: serde_json::Value,
    pub category: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingUpdate {
    pub key: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// --- Change requests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    PostEdit,
    PostDelete,
    PostCreate,
    UserRoleChange,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::PostEdit => "post_edit",
            ChangeType::PostDelete => "post_delete",
            ChangeType::PostCreate => "post_create",
            ChangeType::UserRoleChange => "user_role_change",
        }
    }

    /// `original_data` is a snapshot of the target, absent only for creations.
    pub fn requires_original(&self) -> bool {
        !matches!(self, ChangeType::PostCreate)
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post_edit" => Ok(ChangeType::PostEdit),
            "post_delete" => Ok(ChangeType::PostDelete),
            "post_create" => Ok(ChangeType::PostCreate),
            "user_role_change" => Ok(ChangeType::UserRoleChange),
            other => Err(format!("Unknown change type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Approved,
    Rejected,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Approved => "approved",
            ChangeStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangeStatus::Pending),
            "approved" => Ok(ChangeStatus::Approved),
            "rejected" => Ok(ChangeStatus::Rejected),
            other => Err(format!("Unknown change status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeRequest {
    pub id: String,
    pub change_type: ChangeType,
    pub target_id: String,
    pub requested_by: String,
    pub requester_name: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub status: ChangeStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub original_data: Option<serde_json::Value>,
    pub proposed_changes: serde_json::Value,
    pub change_summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleChangeAction {
    AddRole,
    RemoveRole,
}

/// `proposed_changes` of a `user_role_change` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleChange {
    pub action: RoleChangeAction,
    pub role: Role,
}

// --- Notifications & analytics ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub total_subscribers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStat {
    pub category: PostCategory,
    pub label: &'static str,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyStat {
    pub month: String,
    pub posts: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub total_posts: i64,
    pub published_posts: i64,
    pub total_comments: i64,
    pub approved_comments: i64,
    pub total_users: i64,
    pub category_stats: Vec<CategoryStat>,
    pub monthly_stats: Vec<MonthlyStat>,
}
