//! Presentation helpers: human-readable rendering and tabular export.
//!
//! Pure functions over [`Tweet`]; no I/O happens here.

use serde::Serialize;

use crate::model::Tweet;

/// Render a tweet as a short multi-line notice.
///
/// Exactly one of four shapes applies, checked in order: a plain retweet,
/// a retweet of a quote, a direct quote, or a plain tweet.
#[must_use]
pub fn render_human(tweet: &Tweet) -> String {
    match (&tweet.retweeted_status, &tweet.quoted_status) {
        (Some(rt), _) => match rt.quoted_status.as_deref() {
            None => format!(
                "A new retweet\nsender: {}\nretweet from: {}\ntext: {}",
                tweet.user.screen_name, rt.user.screen_name, rt.full_text
            ),
            Some(quoted) => format!(
                "A new retweet\nsender: {}\nretweet from: {}\nquoted from: {}\ntext: {}\norigin text: {}",
                tweet.user.screen_name,
                rt.user.screen_name,
                quoted.user.screen_name,
                rt.full_text,
                quoted.full_text
            ),
        },
        (None, Some(quoted)) => format!(
            "A new quoted tweet\nsender: {}\nquoted from: {}\nquote text: {}\norigin text: {}",
            tweet.user.screen_name, quoted.user.screen_name, tweet.full_text, quoted.full_text
        ),
        (None, None) => format!(
            "A new tweet\nsender: {}\ntext: {}",
            tweet.user.screen_name, tweet.full_text
        ),
    }
}

/// Find the quoted tweet a tweet ultimately refers to.
///
/// A retweet inherits its quote relationship from the original, so the
/// retweet chain is followed first. Returns `(None, None)` when no quote
/// exists at any level.
#[must_use]
pub fn resolve_quote_chain(tweet: &Tweet) -> (Option<&str>, Option<&str>) {
    if let Some(rt) = &tweet.retweeted_status {
        return resolve_quote_chain(rt);
    }
    match &tweet.quoted_status {
        Some(quoted) => (
            Some(quoted.user.screen_name.as_str()),
            Some(quoted.full_text.as_str()),
        ),
        None => (None, None),
    }
}

/// Column names of [`TweetTable`], in order.
pub const COLUMNS: [&str; 8] = [
    "create time",
    "sender",
    "text",
    "is_retweet",
    "retweet_sender",
    "is_quote",
    "quoted_tweet_sender",
    "quoted_tweet_text",
];

/// One exported row per tweet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub create_time: String,
    pub sender: String,
    pub text: String,
    pub is_retweet: bool,
    pub retweet_sender: Option<String>,
    /// `Some(true)` when a quote exists anywhere in the chain, otherwise
    /// absent (never `Some(false)`).
    pub is_quote: Option<bool>,
    pub quoted_tweet_sender: Option<String>,
    pub quoted_tweet_text: Option<String>,
}

/// A flat, export-ready view of a batch of tweets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetTable {
    pub rows: Vec<TableRow>,
}

/// Flatten tweets into one row each, with the retweet/quote columns
/// derived through [`resolve_quote_chain`].
#[must_use]
pub fn to_table(tweets: &[Tweet]) -> TweetTable {
    let rows = tweets
        .iter()
        .map(|tweet| {
            let (quoted_sender, quoted_text) = resolve_quote_chain(tweet);
            TableRow {
                create_time: tweet.created_at.clone(),
                sender: tweet.user.screen_name.clone(),
                text: tweet.full_text.clone(),
                is_retweet: tweet.retweeted_status.is_some(),
                retweet_sender: tweet
                    .retweeted_status
                    .as_ref()
                    .map(|rt| rt.user.screen_name.clone()),
                is_quote: quoted_sender.map(|_| true),
                quoted_tweet_sender: quoted_sender.map(str::to_owned),
                quoted_tweet_text: quoted_text.map(str::to_owned),
            }
        })
        .collect();

    TweetTable { rows }
}
