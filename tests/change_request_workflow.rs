mod common;

use common::{admin, owner, TestDb};
use serde_json::json;
use unfiltered_backend::helper::change_request_helpers::{self, WorkflowError};
use unfiltered_backend::helper::gate_helpers::{perform_gated_action, ActionOutcome, PrivilegedAction};
use unfiltered_backend::helper::role_helpers;
use unfiltered_backend::models::db_operations::{change_requests_db_operations, posts_db_operations, users_db_operations};
use unfiltered_backend::models::{ChangeStatus, ChangeType, PostCategory, PostPatch, ReviewAction, Role};

fn queued_id(outcome: ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Queued { request_id } => request_id,
        other => panic!("expected a queued change, got {:?}", other),
    }
}

#[test]
fn admin_post_edit_is_queued_then_applied_on_approval() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let post = db.post("Old", PostCategory::MentalHealth, false);

    let mut conn = db.conn();
    let action = PrivilegedAction::EditPost {
        post_id: post.id.clone(),
        patch: PostPatch { title: Some("New".to_string()), ..Default::default() },
    };
    let request_id = queued_id(perform_gated_action(&mut conn, &admin_id, admin(), action).unwrap());

    let pending = change_requests_db_operations::read_change_request(&conn, &request_id).unwrap().unwrap();
    assert_eq!(pending.status, ChangeStatus::Pending);
    assert_eq!(pending.change_type, ChangeType::PostEdit);
    assert_eq!(pending.requested_by, admin_id);
    assert_eq!(pending.requester_name.as_deref(), Some("Ada"));
    assert!(pending.reviewed_by.is_none() && pending.reviewed_at.is_none());
    assert_eq!(pending.change_summary, "Edit post: Old");
    assert_eq!(pending.original_data.as_ref().unwrap()["title"], json!("Old"));
    assert_eq!(pending.proposed_changes, json!({ "title": "New" }));

    // Untouched until reviewed.
    assert_eq!(posts_db_operations::read_post(&conn, &post.id).unwrap().unwrap().title, "Old");

    let outcome = change_request_helpers::review_change_request(
        &mut conn,
        &request_id,
        &owner_id,
        owner(),
        ReviewAction::Approve,
        Some("looks good"),
    )
    .unwrap();

    assert_eq!(outcome.request.status, ChangeStatus::Approved);
    assert_eq!(outcome.request.reviewed_by.as_deref(), Some(owner_id.as_str()));
    assert!(outcome.request.reviewed_at.is_some());
    assert_eq!(outcome.request.review_notes.as_deref(), Some("looks good"));
    assert_eq!(posts_db_operations::read_post(&conn, &post.id).unwrap().unwrap().title, "New");
}

#[test]
fn rejection_leaves_the_post_unchanged() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let post = db.post("Keep me", PostCategory::Books, true);

    let mut conn = db.conn();
    let request_id = queued_id(
        perform_gated_action(&mut conn, &admin_id, admin(), PrivilegedAction::DeletePost { post_id: post.id.clone() })
            .unwrap(),
    );
    let outcome = change_request_helpers::review_change_request(
        &mut conn,
        &request_id,
        &owner_id,
        owner(),
        ReviewAction::Reject,
        None,
    )
    .unwrap();

    assert_eq!(outcome.request.status, ChangeStatus::Rejected);
    assert!(outcome.request.review_notes.is_none());
    assert!(posts_db_operations::read_post(&conn, &post.id).unwrap().is_some());
}

#[test]
fn a_resolved_request_cannot_be_reviewed_again() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let post = db.post("Once", PostCategory::CreativeWriting, false);

    let mut conn = db.conn();
    let request_id = queued_id(
        perform_gated_action(&mut conn, &admin_id, admin(), PrivilegedAction::DeletePost { post_id: post.id.clone() })
            .unwrap(),
    );
    change_request_helpers::review_change_request(&mut conn, &request_id, &owner_id, owner(), ReviewAction::Reject, None)
        .unwrap();

    let second =
        change_request_helpers::review_change_request(&mut conn, &request_id, &owner_id, owner(), ReviewAction::Approve, None);
    assert!(matches!(second, Err(WorkflowError::AlreadyReviewed(ChangeStatus::Rejected))));
    // The rejected delete must not have been applied by the second call.
    assert!(posts_db_operations::read_post(&conn, &post.id).unwrap().is_some());
    let stored = change_requests_db_operations::read_change_request(&conn, &request_id).unwrap().unwrap();
    assert_eq!(stored.status, ChangeStatus::Rejected);
}

#[test]
fn only_owners_review_and_only_admins_submit() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let post = db.post("Guarded", PostCategory::CurrentAffairs, false);

    let mut conn = db.conn();
    let request_id = queued_id(
        perform_gated_action(&mut conn, &admin_id, admin(), PrivilegedAction::DeletePost { post_id: post.id.clone() })
            .unwrap(),
    );
    let by_admin =
        change_request_helpers::review_change_request(&mut conn, &request_id, &admin_id, admin(), ReviewAction::Approve, None);
    assert!(matches!(by_admin, Err(WorkflowError::Forbidden(_))));

    let by_owner = change_request_helpers::submit_change_request(
        &conn,
        &owner_id,
        owner(),
        ChangeType::PostDelete,
        &post.id,
        Some(json!({ "id": post.id })),
        json!({ "action": "delete" }),
        "Delete post: Guarded",
    );
    assert!(matches!(by_owner, Err(WorkflowError::Forbidden(_))));
}

#[test]
fn owner_writes_apply_directly() {
    let db = TestDb::new();
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let post = db.post("Draft", PostCategory::MentalHealth, false);

    let mut conn = db.conn();
    let action = PrivilegedAction::EditPost {
        post_id: post.id.clone(),
        patch: PostPatch { is_published: Some(true), ..Default::default() },
    };
    match perform_gated_action(&mut conn, &owner_id, owner(), action).unwrap() {
        ActionOutcome::Applied(effect) => assert_eq!(effect.published_post_id.as_deref(), Some(post.id.as_str())),
        other => panic!("expected a direct write, got {:?}", other),
    }
    let stored = posts_db_operations::read_post(&conn, &post.id).unwrap().unwrap();
    assert!(stored.is_published);
    assert!(stored.published_at.is_some());
    assert!(change_requests_db_operations::read_change_requests(&conn, None).unwrap().is_empty());
}

#[test]
fn stale_snapshot_blocks_approval() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let post = db.post("Original", PostCategory::Books, false);

    let mut conn = db.conn();
    let first = queued_id(
        perform_gated_action(
            &mut conn,
            &admin_id,
            admin(),
            PrivilegedAction::EditPost {
                post_id: post.id.clone(),
                patch: PostPatch { title: Some("First".to_string()), ..Default::default() },
            },
        )
        .unwrap(),
    );
    let second = queued_id(
        perform_gated_action(
            &mut conn,
            &admin_id,
            admin(),
            PrivilegedAction::EditPost {
                post_id: post.id.clone(),
                patch: PostPatch { title: Some("Second".to_string()), ..Default::default() },
            },
        )
        .unwrap(),
    );

    change_request_helpers::review_change_request(&mut conn, &first, &owner_id, owner(), ReviewAction::Approve, None)
        .unwrap();
    let stale =
        change_request_helpers::review_change_request(&mut conn, &second, &owner_id, owner(), ReviewAction::Approve, None);
    assert!(matches!(stale, Err(WorkflowError::Conflict(_))));

    let still_pending = change_requests_db_operations::read_change_request(&conn, &second).unwrap().unwrap();
    assert_eq!(still_pending.status, ChangeStatus::Pending);
    assert_eq!(posts_db_operations::read_post(&conn, &post.id).unwrap().unwrap().title, "First");
}

#[test]
fn role_change_request_grants_admin_on_approval() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let reader_id = db.user("reader@example.com", "Riya", &[]);

    let mut conn = db.conn();
    let request_id = queued_id(
        perform_gated_action(
            &mut conn,
            &admin_id,
            admin(),
            PrivilegedAction::SetAdminRole { user_id: reader_id.clone(), grant: true },
        )
        .unwrap(),
    );
    let pending = change_requests_db_operations::read_change_request(&conn, &request_id).unwrap().unwrap();
    assert_eq!(pending.change_type, ChangeType::UserRoleChange);
    assert_eq!(pending.change_summary, "Change role of Riya from user to admin");
    assert!(!role_helpers::resolve_role_flags(&conn, Some(&reader_id)).is_admin);

    change_request_helpers::review_change_request(&mut conn, &request_id, &owner_id, owner(), ReviewAction::Approve, None)
        .unwrap();
    let flags = role_helpers::resolve_role_flags(&conn, Some(&reader_id));
    assert!(flags.is_admin);
    assert!(!flags.is_owner);
}

#[test]
fn role_change_request_removes_admin_on_approval() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let helper_id = db.user("helper@example.com", "Meera", &[Role::Admin]);

    let mut conn = db.conn();
    let request_id = queued_id(
        perform_gated_action(
            &mut conn,
            &admin_id,
            admin(),
            PrivilegedAction::SetAdminRole { user_id: helper_id.clone(), grant: false },
        )
        .unwrap(),
    );
    let pending = change_requests_db_operations::read_change_request(&conn, &request_id).unwrap().unwrap();
    assert_eq!(pending.change_type, ChangeType::UserRoleChange);
    assert_eq!(pending.proposed_changes, json!({ "action": "remove_role", "role": "admin" }));
    assert!(users_db_operations::read_privileged_roles(&conn, &helper_id).unwrap().contains(&Role::Admin));

    change_request_helpers::review_change_request(&mut conn, &request_id, &owner_id, owner(), ReviewAction::Approve, None)
        .unwrap();
    assert!(!users_db_operations::read_privileged_roles(&conn, &helper_id).unwrap().contains(&Role::Admin));
    assert!(!role_helpers::resolve_role_flags(&conn, Some(&helper_id)).is_admin);
}

#[test]
fn post_delete_request_removes_the_post_on_approval() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);
    let post = db.post("Goodbye", PostCategory::CreativeWriting, true);

    let mut conn = db.conn();
    let request_id = queued_id(
        perform_gated_action(&mut conn, &admin_id, admin(), PrivilegedAction::DeletePost { post_id: post.id.clone() })
            .unwrap(),
    );
    assert!(posts_db_operations::read_post(&conn, &post.id).unwrap().is_some());

    let outcome = change_request_helpers::review_change_request(
        &mut conn,
        &request_id,
        &owner_id,
        owner(),
        ReviewAction::Approve,
        None,
    )
    .unwrap();
    assert_eq!(outcome.request.status, ChangeStatus::Approved);
    assert_eq!(outcome.request.change_type, ChangeType::PostDelete);
    assert!(posts_db_operations::read_post(&conn, &post.id).unwrap().is_none());
}

#[test]
fn post_create_request_inserts_under_the_pregenerated_id() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let owner_id = db.user("owner@example.com", "Niyati", &[Role::Owner]);

    let mut conn = db.conn();
    let draft = serde_json::from_value(json!({
        "title": "Hello, World! It's Me",
        "category": "creative-writing",
        "content": "A first poem.",
        "is_published": true
    }))
    .unwrap();
    let request_id =
        queued_id(perform_gated_action(&mut conn, &admin_id, admin(), PrivilegedAction::CreatePost(draft)).unwrap());
    let pending = change_requests_db_operations::read_change_request(&conn, &request_id).unwrap().unwrap();
    assert!(pending.original_data.is_none());
    assert!(posts_db_operations::read_post(&conn, &pending.target_id).unwrap().is_none());

    let outcome =
        change_request_helpers::review_change_request(&mut conn, &request_id, &owner_id, owner(), ReviewAction::Approve, None)
            .unwrap();
    assert_eq!(outcome.effect.published_post_id.as_deref(), Some(pending.target_id.as_str()));

    let created = posts_db_operations::read_post(&conn, &pending.target_id).unwrap().unwrap();
    assert_eq!(created.slug, "hello-world-its-me");
    assert!(created.is_published);
    let audit = posts_db_operations::read_audit_log(&conn, 10).unwrap();
    assert_eq!(audit[0].action, "INSERT");
    assert_eq!(audit[0].changed_by_name.as_deref(), Some("Niyati"));
}

#[test]
fn admins_moderate_comments_directly() {
    let db = TestDb::new();
    let admin_id = db.user("admin@example.com", "Ada", &[Role::Admin]);
    let reader_id = db.user("reader@example.com", "Riya", &[]);

    let mut conn = db.conn();
    let refused = perform_gated_action(
        &mut conn,
        &reader_id,
        Default::default(),
        PrivilegedAction::DeleteComment { comment_id: "missing".to_string() },
    );
    assert!(matches!(refused, Err(WorkflowError::Forbidden(_))));

    let direct = perform_gated_action(
        &mut conn,
        &admin_id,
        admin(),
        PrivilegedAction::DeleteComment { comment_id: "missing".to_string() },
    );
    // Direct path reached the database and found nothing to delete.
    assert!(matches!(direct, Err(WorkflowError::NotFound(_))));
}
