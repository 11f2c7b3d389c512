//! Collection operations: credential probe, bulk timeline fetch, and the
//! live stream loop.

use std::future::Future;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{StatusApi, TwitterApiClient};
use crate::config::{StreamRetry, TwitterConfig};
use crate::error::{Error, Result};
use crate::model::Tweet;

/// Largest page the v1.1 timeline endpoints return per call.
pub const PAGE_SIZE: usize = 200;

/// Fetches and reshapes tweets through a [`StatusApi`] capability.
///
/// All operations issue their network calls sequentially; there is no
/// fan-out across pages or users.
pub struct Collector<C: StatusApi> {
    api: C,
}

impl Collector<TwitterApiClient> {
    /// Build a collector backed by the real REST client.
    pub fn new(config: &TwitterConfig) -> Result<Self> {
        Ok(Self::with_api(TwitterApiClient::new(config)?))
    }
}

impl<C: StatusApi> Collector<C> {
    /// Build a collector over any API capability.
    pub fn with_api(api: C) -> Self {
        Self { api }
    }

    /// Probe the stored credentials.
    ///
    /// Any failure, network or otherwise, reads as "not authenticated"
    /// rather than an error; a rejected credential is an expected outcome.
    pub async fn verify_authentication(&self) -> bool {
        match self.api.verify_credentials().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "credential check failed");
                false
            }
        }
    }

    /// Fetch up to `count` tweets from the authenticated user's home
    /// timeline, newest first.
    pub async fn get_recent(&self, count: usize) -> Result<Vec<Tweet>> {
        let api = &self.api;
        let raw = collect_paginated(count, |count, max_id| api.home_timeline(count, max_id)).await?;
        parse_tweets(&raw)
    }

    /// Fetch up to `count_per_user` tweets from each user's timeline,
    /// concatenated in input order.
    ///
    /// A failed page fetch for any user fails the whole call; there is no
    /// per-user containment.
    pub async fn get_historical(
        &self,
        count_per_user: usize,
        users: &[String],
    ) -> Result<Vec<Tweet>> {
        let api = &self.api;
        let mut raw = Vec::new();
        for screen_name in users {
            let name = screen_name.as_str();
            let pages = collect_paginated(count_per_user, |count, max_id| {
                api.user_timeline(name, count, max_id)
            })
            .await?;
            debug!(user = name, tweets = pages.len(), "collected user timeline");
            raw.extend(pages);
        }
        parse_tweets(&raw)
    }

    /// Follow the live stream of tweets by the given users, invoking
    /// `on_tweet` synchronously for each one, in delivery order.
    ///
    /// Transport failures tear the connection down and reopen it after the
    /// policy's fixed delay, indefinitely; this call only returns when a
    /// non-transport error occurs. Stopping it otherwise means dropping
    /// the owning task.
    pub async fn stream<F>(
        &self,
        users: &[String],
        retry: &StreamRetry,
        mut on_tweet: F,
    ) -> Result<()>
    where
        F: FnMut(Tweet),
    {
        let profiles = self.api.lookup_users(users).await?;
        let follow = profiles
            .iter()
            .map(|profile| {
                profile
                    .get("id")
                    .and_then(Value::as_u64)
                    .ok_or(Error::MissingField("id"))
            })
            .collect::<Result<Vec<u64>>>()?;
        info!(users = users.len(), "opening filtered stream");

        loop {
            let mut stream = match self.api.filter_stream(&follow).await {
                Ok(stream) => stream,
                Err(e) if retry.should_retry(&e) => {
                    warn!(error = %e, delay_secs = retry.delay.as_secs(), "stream connect failed");
                    tokio::time::sleep(retry.delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            'read: while let Some(item) = stream.next().await {
                match item {
                    Ok(raw) => on_tweet(Tweet::from_json(&raw)?),
                    Err(e) if retry.should_retry(&e) => {
                        warn!(error = %e, delay_secs = retry.delay.as_secs(), "stream dropped");
                        tokio::time::sleep(retry.delay).await;
                        break 'read;
                    }
                    Err(e) => return Err(e),
                }
            }

            info!("stream ended, reconnecting");
        }
    }
}

/// Page through a timeline fetch until `requested` items are collected or
/// a page comes back empty.
///
/// Each page asks for `min(PAGE_SIZE, remaining)` items; the cursor for
/// the next page is the oldest returned id minus one (older tweets have
/// smaller ids). Pages are assumed non-overlapping; nothing deduplicates.
pub(crate) async fn collect_paginated<F, Fut>(requested: usize, mut fetch_page: F) -> Result<Vec<Value>>
where
    F: FnMut(usize, Option<u64>) -> Fut,
    Fut: Future<Output = Result<Vec<Value>>>,
{
    let mut remaining = requested;
    let mut max_id: Option<u64> = None;
    let mut collected = Vec::new();

    while remaining > 0 {
        let page = fetch_page(remaining.min(PAGE_SIZE), max_id).await?;
        if page.is_empty() {
            break;
        }

        let oldest = page
            .last()
            .and_then(|tweet| tweet.get("id"))
            .and_then(Value::as_u64)
            .ok_or(Error::MissingField("id"))?;
        max_id = Some(oldest - 1);

        remaining = remaining.saturating_sub(page.len());
        collected.extend(page);
    }

    Ok(collected)
}

/// Deserialize raw timeline items through the model layer.
fn parse_tweets(raw: &[Value]) -> Result<Vec<Tweet>> {
    raw.iter().map(Tweet::from_json).collect()
}
