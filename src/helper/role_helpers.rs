use crate::models::db_operations::users_db_operations;
use crate::models::RoleFlags;
use rusqlite::Connection;

/// Resolves the privilege flags of a principal from its role grants.
///
/// Fails closed: no principal, or any lookup failure, yields no privileges.
/// Lookup failures are logged, never surfaced to the caller.
pub fn resolve_role_flags(conn: &Connection, principal: Option<&str>) -> RoleFlags {
    let Some(user_id) = principal else {
        return RoleFlags::default();
    };
    match users_db_operations::read_privileged_roles(conn, user_id) {
        Ok(grants) => RoleFlags::from_grants(&grants),
        Err(e) => {
            log::error!("Role lookup failed for principal '{}': {}. Treating as unprivileged.", user_id, e);
            RoleFlags::default()
        }
    }
}

pub fn is_owner(conn: &Connection, user_id: &str) -> bool {
    resolve_role_flags(conn, Some(user_id)).is_owner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_principal_has_no_privileges() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(resolve_role_flags(&conn, None), RoleFlags::default());
    }

    #[test]
    fn lookup_failure_fails_closed() {
        // No schema: the role query errors out.
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(resolve_role_flags(&conn, Some("someone")), RoleFlags::default());
        assert!(!is_owner(&conn, "someone"));
    }

    #[test]
    fn grants_are_read_from_user_roles() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE user_roles (user_id TEXT NOT NULL, role TEXT NOT NULL, created_at TEXT);
             INSERT INTO user_roles (user_id, role) VALUES ('boss', 'owner'), ('helper', 'admin');",
        )
        .unwrap();
        assert_eq!(resolve_role_flags(&conn, Some("boss")), RoleFlags { is_admin: true, is_owner: true });
        assert_eq!(resolve_role_flags(&conn, Some("helper")), RoleFlags { is_admin: true, is_owner: false });
        assert_eq!(resolve_role_flags(&conn, Some("reader")), RoleFlags::default());
    }
}
