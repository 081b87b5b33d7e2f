use crate::helper::role_helpers;
use crate::models::db_operations::users_db_operations;
use crate::models::RoleFlags;
use crate::DbPool;
use actix_session::{Session, SessionExt};
use actix_web::{dev, web, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready};

/// Session key holding the signed-in user's id.
pub const SESSION_USER_KEY: &str = "user_id";

/// A signed-in user. Role flags are resolved from `user_roles` on every
/// request, so grant changes take effect without signing in again.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedPrincipal {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    #[serde(flatten)]
    pub flags: RoleFlags,
}

impl AuthenticatedPrincipal {
    fn load(req: &HttpRequest) -> Result<Option<Self>, actix_web::Error> {
        let session = req.get_session();
        let Some(user_id) = session_user_id(&session) else {
            return Ok(None);
        };

        let pool = req.app_data::<web::Data<DbPool>>().ok_or_else(|| {
            log::error!("Database pool is not registered as app data.");
            actix_web::error::ErrorInternalServerError("Server misconfiguration.")
        })?;
        let conn = pool.get().map_err(|e| {
            log::error!("Failed to get DB connection for session lookup: {}", e);
            actix_web::error::ErrorServiceUnavailable("Database unavailable.")
        })?;

        let profile = users_db_operations::read_profile(&conn, &user_id).map_err(|e| {
            log::error!("Failed to load profile for session user '{}': {}", user_id, e);
            actix_web::error::ErrorInternalServerError("Failed to load session.")
        })?;

        match profile {
            Some(profile) => Ok(Some(AuthenticatedPrincipal {
                flags: role_helpers::resolve_role_flags(&conn, Some(&user_id)),
                user_id,
                email: profile.email,
                display_name: profile.display_name,
            })),
            None => {
                // The account was deleted while the cookie was still alive.
                session.purge();
                Ok(None)
            }
        }
    }
}

pub fn session_user_id(session: &Session) -> Option<String> {
    session.get::<String>(SESSION_USER_KEY).unwrap_or(None)
}

impl FromRequest for AuthenticatedPrincipal {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(match AuthenticatedPrincipal::load(req) {
            Ok(Some(principal)) => Ok(principal),
            Ok(None) => Err(actix_web::error::ErrorUnauthorized("Not signed in.")),
            Err(e) => Err(e),
        })
    }
}

/// Optional variant for endpoints open to anonymous visitors.
pub struct MaybePrincipal(pub Option<AuthenticatedPrincipal>);

impl FromRequest for MaybePrincipal {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(AuthenticatedPrincipal::load(req).map(MaybePrincipal))
    }
}
