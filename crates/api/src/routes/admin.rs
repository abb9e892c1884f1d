//! Admin content and analytics handlers.
//!
//! Content documents are opaque JSON objects stored per [`ContentKind`].
//! Access is enforced by the admin gate on the whole router group.

use axum::{
    extract::State,
    routing::{MethodRouter, get},
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;

use garden_core::ContentKind;

use super::AppJson;
use crate::error::Result;
use crate::middleware::Identity;
use crate::models::ContentItem;
use crate::state::AppState;

/// Kinds listed in the analytics overview.
const CONTENT_KINDS: [ContentKind; 5] = [
    ContentKind::SeasonTip,
    ContentKind::CalendarTask,
    ContentKind::QuizQuestion,
    ContentKind::Broadcast,
    ContentKind::BlogArticle,
];

/// A list of content documents.
#[derive(Debug, Serialize)]
pub struct ContentList {
    pub items: Vec<ContentItem>,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub total_users: i64,
    pub total_referrals: i64,
    pub active_referrals: i64,
    /// Document count per content kind.
    pub content: Map<String, Value>,
}

/// GET lists and POST creates documents of one kind.
pub fn collection(kind: ContentKind) -> MethodRouter<AppState> {
    get(move |state: State<AppState>| list(state, kind)).post(
        move |state: State<AppState>, identity: Identity, body: AppJson<Map<String, Value>>| {
            create(state, identity, body, kind)
        },
    )
}

#[instrument(skip_all, fields(kind = %kind))]
async fn list(State(state): State<AppState>, kind: ContentKind) -> Result<AppJson<ContentList>> {
    let items = state.store().content().list(kind).await?;
    Ok(AppJson(ContentList { items }))
}

#[instrument(skip_all, fields(kind = %kind))]
async fn create(
    State(state): State<AppState>,
    Identity(admin): Identity,
    AppJson(body): AppJson<Map<String, Value>>,
    kind: ContentKind,
) -> Result<AppJson<ContentItem>> {
    let item = state
        .store()
        .content()
        .insert(kind, Value::Object(body), admin.id)
        .await?;

    tracing::info!(content_id = %item.id, admin_id = %admin.id, "Content created");
    Ok(AppJson(item))
}

/// POST /api/v1/admin/messages/broadcast
///
/// Records a broadcast message. Delivery is handled outside this service.
///
/// # Errors
///
/// `400` if the body is not a JSON object.
pub async fn broadcast(
    state: State<AppState>,
    identity: Identity,
    body: AppJson<Map<String, Value>>,
) -> Result<AppJson<ContentItem>> {
    create(state, identity, body, ContentKind::Broadcast).await
}

/// GET /api/v1/admin/analytics/overview
///
/// # Errors
///
/// `500` if the store cannot be read.
#[instrument(skip_all)]
pub async fn analytics_overview(State(state): State<AppState>) -> Result<AppJson<AnalyticsOverview>> {
    let store = state.store();
    let total_users = store.users().count().await?;
    let (total_referrals, active_referrals) = store.referrals().counts().await?;

    let mut content = Map::new();
    for kind in CONTENT_KINDS {
        let count = store.content().count(kind).await?;
        content.insert(kind.to_string(), Value::from(count));
    }

    Ok(AppJson(AnalyticsOverview {
        total_users,
        total_referrals,
        active_referrals,
        content,
    }))
}
