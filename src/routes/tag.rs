use std::collections::HashMap;
use tracing::instrument;
use warp::Rejection;
use warp::reply::Response;

use crate::store::Store;
use crate::types::{account::Session, listing::TagTab};
use crate::views::{TabLink, TagsPage, render};

#[instrument(skip(store))]
pub async fn get_tags(
    params: HashMap<String, String>,
    session: Option<Session>,
    store: Store,
) -> Result<Response, Rejection> {
    let tab = TagTab::from_param(params.get("tab").map(String::as_str));
    let query = params
        .get("q")
        .map(|q| q.trim().to_string())
        .unwrap_or_default();
    let filter = Some(query.as_str()).filter(|q| !q.is_empty());

    let tags = store.get_tags(tab, filter, None).await?;

    Ok(render(&TagsPage {
        session,
        tabs: TabLink::bar(&TagTab::ALL, tab, TagTab::as_str, "/tags"),
        query,
        tags,
    })?)
}
