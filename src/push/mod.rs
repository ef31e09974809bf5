//! Best-effort push dispatch. Nudge payloads are relayed to every stored
//! subscription endpoint; a send failure is logged and dropped, except
//! that endpoints reporting 404/410 are pruned from the store.

use sqlx::{Pool, Sqlite};
use std::sync::OnceLock;

use crate::database::db::queries;

static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn client() -> &'static reqwest::Client {
    CLIENT.get_or_init(reqwest::Client::new)
}

/// Send a nudge body to all of the user's subscriptions. Errors out only
/// when the subscription list itself cannot be read; individual sends are
/// best-effort.
pub async fn send_to_user(pool: &Pool<Sqlite>, user_id: i64, body: &str) -> Result<(), sqlx::Error> {
    let subs = queries::get_subscriptions(pool, user_id).await?;
    if subs.is_empty() {
        return Ok(());
    }

    let payload = serde_json::json!({
        "type": "nudge",
        "title": "MindSpend",
        "body": body,
    });

    for sub in subs {
        match client().post(&sub.endpoint).json(&payload).send().await {
            Ok(resp)
                if resp.status() == reqwest::StatusCode::GONE
                    || resp.status() == reqwest::StatusCode::NOT_FOUND =>
            {
                // endpoint permanently gone, drop the subscription
                if let Err(e) = queries::remove_subscription(pool, user_id, &sub.endpoint).await {
                    tracing::warn!(user_id, endpoint = %sub.endpoint, error = %e,
                        "failed to prune dead push subscription");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(user_id, endpoint = %sub.endpoint, error = %e, "push send failed");
            }
        }
    }
    Ok(())
}
