use crate::helper::password_helpers::is_valid_email;
use crate::helper::sanitization_helpers::{clean_optional, strip_all_html};
use crate::models::{Comment, ContactMessage, NewComment, NewContactMessage};
use chrono::{DateTime, Utc};

pub const ANONYMOUS_COMMENTER: &str = "Anonymous";
const MAX_COMMENT_CHARS: usize = 2000;
const MAX_CONTACT_CHARS: usize = 5000;

/// Who is writing a comment: a signed-in user or an anonymous visitor.
pub enum Commenter<'a> {
    User { user_id: &'a str, display_name: &'a str },
    Anonymous,
}

/// Builds a new comment row. Signed-in commenters keep their profile name;
/// anonymous comments never carry a user id, whatever name was supplied.
pub fn build_comment(
    id: &str,
    post_id: &str,
    commenter: Commenter<'_>,
    input: &NewComment,
    require_approval: bool,
    now: DateTime<Utc>,
) -> Result<Comment, String> {
    let message = strip_all_html(&input.message);
    if message.is_empty() {
        return Err("Comment cannot be empty.".to_string());
    }
    if message.chars().count() > MAX_COMMENT_CHARS {
        return Err(format!("Comment cannot exceed {} characters.", MAX_COMMENT_CHARS));
    }

    let (user_id, display_name, is_anonymous) = match commenter {
        Commenter::User { user_id, display_name } => (Some(user_id.to_string()), display_name.to_string(), false),
        Commenter::Anonymous => (
            None,
            clean_optional(input.display_name.as_deref()).unwrap_or_else(|| ANONYMOUS_COMMENTER.to_string()),
            true,
        ),
    };

    Ok(Comment {
        id: id.to_string(),
        post_id: post_id.to_string(),
        parent_id: clean_optional(input.parent_id.as_deref()),
        user_id,
        display_name,
        message,
        is_approved: !require_approval,
        is_anonymous,
        created_at: now,
        updated_at: now,
    })
}

pub fn build_contact_message(id: &str, input: &NewContactMessage, now: DateTime<Utc>) -> Result<ContactMessage, String> {
    let name = strip_all_html(&input.name);
    let email = input.email.trim().to_lowercase();
    let message = strip_all_html(&input.message);

    if name.is_empty() || message.is_empty() {
        return Err("Name and message are required.".to_string());
    }
    if !is_valid_email(&email) {
        return Err("Please enter a valid email address.".to_string());
    }
    if message.chars().count() > MAX_CONTACT_CHARS {
        return Err(format!("Message cannot exceed {} characters.", MAX_CONTACT_CHARS));
    }

    Ok(ContactMessage {
        id: id.to_string(),
        name,
        email,
        message,
        is_read: false,
        is_replied: false,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: Option<&str>) -> NewComment {
        NewComment {
            message: "Lovely piece".to_string(),
            display_name: name.map(str::to_string),
            parent_id: None,
        }
    }

    #[test]
    fn anonymous_comments_never_carry_a_user() {
        for name in [None, Some("Niyati"), Some("   ")] {
            let c = build_comment("c", "p", Commenter::Anonymous, &input(name), true, Utc::now()).unwrap();
            assert!(c.user_id.is_none());
            assert!(c.is_anonymous);
        }
        let named = build_comment("c", "p", Commenter::Anonymous, &input(Some("Riya")), true, Utc::now()).unwrap();
        assert_eq!(named.display_name, "Riya");
        let unnamed = build_comment("c", "p", Commenter::Anonymous, &input(None), true, Utc::now()).unwrap();
        assert_eq!(unnamed.display_name, ANONYMOUS_COMMENTER);
    }

    #[test]
    fn signed_in_comments_use_profile_name() {
        let commenter = Commenter::User { user_id: "u1", display_name: "Profile Name" };
        let c = build_comment("c", "p", commenter, &input(Some("Spoofed")), false, Utc::now()).unwrap();
        assert_eq!(c.user_id.as_deref(), Some("u1"));
        assert_eq!(c.display_name, "Profile Name");
        assert!(!c.is_anonymous);
        assert!(c.is_approved);
    }

    #[test]
    fn approval_default_follows_setting() {
        let c = build_comment("c", "p", Commenter::Anonymous, &input(None), true, Utc::now()).unwrap();
        assert!(!c.is_approved);
    }

    #[test]
    fn empty_comment_is_rejected() {
        let blank = NewComment { message: "<b></b>  ".to_string(), display_name: None, parent_id: None };
        assert!(build_comment("c", "p", Commenter::Anonymous, &blank, true, Utc::now()).is_err());
    }

    #[test]
    fn contact_message_requires_valid_email() {
        let bad = NewContactMessage { name: "A".into(), email: "nope".into(), message: "Hi".into() };
        assert!(build_contact_message("m", &bad, Utc::now()).is_err());
        let good = NewContactMessage { name: "A".into(), email: " A@Example.com ".into(), message: "Hi".into() };
        assert_eq!(build_contact_message("m", &good, Utc::now()).unwrap().email, "a@example.com");
    }
}
