use std::collections::HashMap;
use tracing::instrument;
use warp::Rejection;
use warp::reply::Response;

use handle_errors::Error;

use crate::store::Store;
use crate::types::{account::Session, listing::ProfileTab};
use crate::views::{ProfilePage, TabLink, render};

#[instrument(skip(store))]
pub async fn profile(
    username: String,
    params: HashMap<String, String>,
    session: Option<Session>,
    store: Store,
) -> Result<Response, Rejection> {
    let account = store
        .get_account_by_username(&username)
        .await?
        .ok_or(Error::NotFound("User"))?;
    let tab = ProfileTab::from_param(params.get("tab").map(String::as_str));
    let items = store.get_activity(account.id, tab).await?;

    Ok(render(&ProfilePage {
        is_owner: session.as_ref().map(|s| s.account_id) == Some(account.id),
        session,
        tabs: TabLink::bar(
            &ProfileTab::ALL,
            tab,
            ProfileTab::as_str,
            &format!("/users/{}", account.username),
        ),
        username: account.username,
        joined: account.created_on,
        items,
    })?)
}
