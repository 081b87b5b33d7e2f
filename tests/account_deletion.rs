mod common;

use chrono::Utc;
use common::TestDb;
use unfiltered_backend::helper::comment_helpers::{build_comment, Commenter};
use unfiltered_backend::helper::role_helpers;
use unfiltered_backend::models::db_operations::{comments_db_operations, users_db_operations, DbError};
use unfiltered_backend::models::{NewComment, PostCategory, Role};

fn comment_as(db: &TestDb, post_id: &str, user_id: &str, name: &str, message: &str, id: &str) {
    let input = NewComment { message: message.to_string(), display_name: None, parent_id: None };
    let comment = build_comment(
        id,
        post_id,
        Commenter::User { user_id, display_name: name },
        &input,
        false,
        Utc::now(),
    )
    .unwrap();
    comments_db_operations::insert_comment(&db.conn(), &comment).unwrap();
}

#[test]
fn deleting_an_account_anonymizes_its_comments() {
    let db = TestDb::new();
    let riya = db.user("riya@example.com", "Riya", &[Role::Admin]);
    let sam = db.user("sam@example.com", "Sam", &[]);
    let post = db.post("On Grief", PostCategory::MentalHealth, true);

    comment_as(&db, &post.id, &riya, "Riya", "This helped me a lot.", "c-riya");
    comment_as(&db, &post.id, &sam, "Sam", "Same here.", "c-sam");

    let mut conn = db.conn();
    assert!(users_db_operations::delete_user_account(&mut conn, &riya).unwrap());

    let kept = comments_db_operations::read_comment(&conn, "c-riya").unwrap().unwrap();
    assert_eq!(kept.display_name, users_db_operations::ANONYMIZED_DISPLAY_NAME);
    assert_eq!(kept.display_name, "Anonymous User");
    assert!(kept.user_id.is_none());
    assert!(kept.is_anonymous);
    assert_eq!(kept.message, "This helped me a lot.");

    let untouched = comments_db_operations::read_comment(&conn, "c-sam").unwrap().unwrap();
    assert_eq!(untouched.user_id.as_deref(), Some(sam.as_str()));
    assert_eq!(untouched.display_name, "Sam");

    assert!(users_db_operations::read_profile(&conn, &riya).unwrap().is_none());
    assert!(users_db_operations::read_privileged_roles(&conn, &riya).unwrap().is_empty());
    assert!(!role_helpers::resolve_role_flags(&conn, Some(&riya)).is_admin);
    assert!(users_db_operations::verify_credentials(&conn, "riya@example.com", "Sup3r$ecret").unwrap().is_none());
}

#[test]
fn deleting_an_unknown_account_reports_nothing_removed() {
    let db = TestDb::new();
    let mut conn = db.conn();
    assert!(!users_db_operations::delete_user_account(&mut conn, "no-such-user").unwrap());
}

#[test]
fn a_deleted_email_can_register_again() {
    let db = TestDb::new();
    let first = db.user("again@example.com", "First", &[]);
    {
        let mut conn = db.conn();
        users_db_operations::delete_user_account(&mut conn, &first).unwrap();
        assert!(!users_db_operations::email_exists(&conn, "again@example.com").unwrap());
    }
    let second = db.user("again@example.com", "Second", &[]);
    assert_ne!(first, second);
}

#[test]
fn an_owner_account_cannot_be_deleted() {
    let db = TestDb::new();
    let owner = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let post = db.post("Letters", PostCategory::CreativeWriting, true);
    comment_as(&db, &post.id, &owner, "Niyati", "Thank you for reading.", "c-owner");

    let mut conn = db.conn();
    let refused = users_db_operations::delete_user_account(&mut conn, &owner);
    assert!(matches!(refused, Err(DbError::OwnerAccount)));

    // Nothing from the refused attempt sticks.
    assert!(users_db_operations::read_profile(&conn, &owner).unwrap().is_some());
    assert_eq!(users_db_operations::read_owner_emails(&conn).unwrap(), vec!["owner@example.com".to_string()]);
    assert!(role_helpers::resolve_role_flags(&conn, Some(&owner)).is_owner);
    let comment = comments_db_operations::read_comment(&conn, "c-owner").unwrap().unwrap();
    assert_eq!(comment.user_id.as_deref(), Some(owner.as_str()));
    assert_eq!(comment.display_name, "Niyati");
}
