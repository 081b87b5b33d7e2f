pub mod analytics_helpers;
pub mod change_request_helpers;
pub mod comment_helpers;
pub mod feed_helpers;
pub mod gate_helpers;
pub mod media_helpers;
pub mod notification_helpers;
pub mod password_helpers;
pub mod post_helpers;
pub mod realtime_helpers;
pub mod role_helpers;
pub mod sanitization_helpers;
pub mod settings_helpers;
