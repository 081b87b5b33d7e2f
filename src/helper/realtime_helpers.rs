use crate::models::settings::SiteSettings;
use crate::models::Comment;
use actix_web::web::Bytes;
use futures_util::Stream;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

/// Row-level change published to live subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RowChange {
    CommentVisible { comment: Comment },
    CommentHidden { post_id: String, comment_id: String },
}

impl RowChange {
    pub fn post_id(&self) -> &str {
        match self {
            RowChange::CommentVisible { comment } => &comment.post_id,
            RowChange::CommentHidden { post_id, .. } => post_id,
        }
    }
}

pub struct RealtimeHub {
    tx: broadcast::Sender<RowChange>,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        RealtimeHub { tx }
    }

    pub fn publish(&self, change: RowChange) {
        // Sending only fails when nobody is listening.
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RowChange> {
        self.tx.subscribe()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        RealtimeHub::new(128)
    }
}

/// Formats a serializable payload as one Server-Sent Event.
pub fn sse_frame<T: Serialize>(event: &str, payload: &T) -> Option<Bytes> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(Bytes::from(format!("event: {}\ndata: {}\n\n", event, json))),
        Err(e) => {
            log::error!("Failed to serialize realtime event: {}", e);
            None
        }
    }
}

/// SSE stream of changes affecting one post's comments. Lagged receivers skip ahead.
pub fn comment_event_stream(
    rx: broadcast::Receiver<RowChange>,
    post_id: String,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(change) if change.post_id() == post_id => sse_frame("comment", &change).map(Ok),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Comment stream subscriber lagged: {}", e);
            None
        }
    })
}

/// SSE stream of settings snapshots, one frame per refresh.
pub fn settings_event_stream(
    rx: broadcast::Receiver<Arc<SiteSettings>>,
) -> impl Stream<Item = Result<Bytes, actix_web::Error>> {
    BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(settings) => sse_frame("settings", settings.as_ref()).map(Ok),
        Err(e) => {
            log::warn!("Settings stream subscriber lagged: {}", e);
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(post_id: &str) -> Comment {
        Comment {
            id: "c1".to_string(),
            post_id: post_id.to_string(),
            parent_id: None,
            user_id: None,
            display_name: "Anonymous".to_string(),
            message: "hi".to_string(),
            is_approved: true,
            is_anonymous: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn subscribers_receive_published_changes() {
        let hub = RealtimeHub::default();
        let mut rx = hub.subscribe();
        hub.publish(RowChange::CommentVisible { comment: comment("p1") });
        let received = rx.try_recv().unwrap();
        assert_eq!(received.post_id(), "p1");
    }

    #[test]
    fn frames_are_tagged_with_event_kind() {
        let frame = sse_frame("comment", &RowChange::CommentHidden { post_id: "p1".into(), comment_id: "c1".into() }).unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with("event: comment\ndata: {\"event\":\"comment_hidden\""));
        assert!(text.ends_with("\n\n"));
    }
}
