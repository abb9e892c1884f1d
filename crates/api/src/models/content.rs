//! Admin content types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use garden_core::{ContentId, ContentKind, UserId};

/// A stored admin content document (season tip, quiz question, ...).
///
/// The body is opaque JSON; its shape belongs to the clients that render it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: ContentId,
    pub kind: ContentKind,
    pub body: serde_json::Value,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
