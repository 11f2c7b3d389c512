//! Typed tweet models and their deserialization from raw v1.1 payloads.
//!
//! The platform delivers tweets as loosely-structured JSON whose shape
//! varies between REST and streaming delivery (notably around truncation
//! and the `full_text` / `extended_tweet` split). Each model here is built
//! in a single pass from a `serde_json::Value` and is immutable afterwards.
//!
//! Required vs. optional keys follow the documented v1.1 object model:
//! identity, counters, and flag fields are required; nullable profile and
//! viewer-context fields are optional and deserialize to `None` when the
//! key is absent or null. A missing required key fails the whole call with
//! [`Error::MissingField`].

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

fn req<'a>(data: &'a Value, key: &'static str) -> Result<&'a Value> {
    match data.get(key) {
        Some(v) if !v.is_null() => Ok(v),
        _ => Err(Error::MissingField(key)),
    }
}

fn req_str(data: &Value, key: &'static str) -> Result<String> {
    req(data, key)?
        .as_str()
        .map(str::to_owned)
        .ok_or(Error::MissingField(key))
}

fn req_u64(data: &Value, key: &'static str) -> Result<u64> {
    req(data, key)?.as_u64().ok_or(Error::MissingField(key))
}

fn req_bool(data: &Value, key: &'static str) -> Result<bool> {
    req(data, key)?.as_bool().ok_or(Error::MissingField(key))
}

fn opt_str(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn opt_u64(data: &Value, key: &str) -> Option<u64> {
    data.get(key).and_then(Value::as_u64)
}

fn opt_bool(data: &Value, key: &str) -> Option<bool> {
    data.get(key).and_then(Value::as_bool)
}

/// Decode a two-element `indices` array into a half-open `(start, end)` pair.
fn offsets(data: &Value) -> Result<(u32, u32)> {
    let indices = req(data, "indices")?
        .as_array()
        .ok_or(Error::MissingField("indices"))?;
    match indices.as_slice() {
        [start, end] => {
            let start = start.as_u64().ok_or(Error::MissingField("indices"))?;
            let end = end.as_u64().ok_or(Error::MissingField("indices"))?;
            Ok((start as u32, end as u32))
        }
        _ => Err(Error::MissingField("indices")),
    }
}

/// Identity and profile metadata of a tweet's author.
///
/// One instance per tweet; authors are not deduplicated across tweets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub id: u64,
    /// Display name, not necessarily a person's name.
    pub name: String,
    /// Handle. Unique, but subject to change by the user.
    pub screen_name: String,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub protected: bool,
    pub verified: bool,
    pub followers_count: u64,
    pub friends_count: u64,
    pub listed_count: u64,
    pub favourites_count: u64,
    pub statuses_count: u64,
    /// Account creation time in the platform's own format,
    /// e.g. `Mon Nov 29 21:18:15 +0000 2010`.
    pub created_at: String,
    pub profile_banner_url: Option<String>,
    pub profile_image_url_https: String,
    pub default_profile: bool,
    pub default_profile_image: bool,
    /// Two-letter country codes the content is withheld in. The key is
    /// required; an empty list means not withheld anywhere.
    pub withheld_in_countries: Vec<String>,
}

impl Author {
    pub fn from_json(data: &Value) -> Result<Self> {
        let withheld = req(data, "withheld_in_countries")?;
        let withheld_in_countries = withheld
            .as_array()
            .ok_or(Error::MissingField("withheld_in_countries"))?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect();

        Ok(Self {
            id: req_u64(data, "id")?,
            name: req_str(data, "name")?,
            screen_name: req_str(data, "screen_name")?,
            location: opt_str(data, "location"),
            url: opt_str(data, "url"),
            description: opt_str(data, "description"),
            protected: req_bool(data, "protected")?,
            verified: req_bool(data, "verified")?,
            followers_count: req_u64(data, "followers_count")?,
            friends_count: req_u64(data, "friends_count")?,
            listed_count: req_u64(data, "listed_count")?,
            favourites_count: req_u64(data, "favourites_count")?,
            statuses_count: req_u64(data, "statuses_count")?,
            created_at: req_str(data, "created_at")?,
            profile_banner_url: opt_str(data, "profile_banner_url"),
            profile_image_url_https: req_str(data, "profile_image_url_https")?,
            default_profile: req_bool(data, "default_profile")?,
            default_profile_image: req_bool(data, "default_profile_image")?,
            withheld_in_countries,
        })
    }
}

/// Inline link annotation over the tweet text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub start: u32,
    pub end: u32,
    /// Wrapped t.co URL, as embedded in the raw text.
    pub url: String,
    pub display_url: String,
    pub expanded_url: String,
}

impl Link {
    pub fn from_json(data: &Value) -> Result<Self> {
        let (start, end) = offsets(data)?;
        Ok(Self {
            start,
            end,
            url: req_str(data, "url")?,
            display_url: req_str(data, "display_url")?,
            expanded_url: req_str(data, "expanded_url")?,
        })
    }
}

/// Inline hashtag annotation; `text` omits the leading `#`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hashtag {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl Hashtag {
    pub fn from_json(data: &Value) -> Result<Self> {
        let (start, end) = offsets(data)?;
        Ok(Self {
            start,
            end,
            text: req_str(data, "text")?,
        })
    }
}

/// Inline user-mention annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mention {
    pub start: u32,
    pub end: u32,
    pub id: u64,
    pub name: String,
    pub screen_name: String,
}

impl Mention {
    pub fn from_json(data: &Value) -> Result<Self> {
        let (start, end) = offsets(data)?;
        Ok(Self {
            start,
            end,
            id: req_u64(data, "id")?,
            name: req_str(data, "name")?,
            screen_name: req_str(data, "screen_name")?,
        })
    }
}

/// Inline cashtag ($symbol) annotation; `text` omits the leading `$`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cashtag {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl Cashtag {
    pub fn from_json(data: &Value) -> Result<Self> {
        let (start, end) = offsets(data)?;
        Ok(Self {
            start,
            end,
            text: req_str(data, "text")?,
        })
    }
}

/// All inline annotations of one tweet, grouped by kind.
///
/// Each kind defaults to empty when its array is absent from the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entities {
    pub links: Vec<Link>,
    pub hashtags: Vec<Hashtag>,
    pub mentions: Vec<Mention>,
    pub cashtags: Vec<Cashtag>,
}

impl Entities {
    pub fn from_json(data: &Value) -> Result<Self> {
        fn kind<T>(
            data: &Value,
            key: &str,
            parse: impl Fn(&Value) -> Result<T>,
        ) -> Result<Vec<T>> {
            match data.get(key).and_then(Value::as_array) {
                Some(items) => items.iter().map(parse).collect(),
                None => Ok(Vec::new()),
            }
        }

        Ok(Self {
            links: kind(data, "urls", Link::from_json)?,
            hashtags: kind(data, "hashtags", Hashtag::from_json)?,
            mentions: kind(data, "user_mentions", Mention::from_json)?,
            cashtags: kind(data, "symbols", Cashtag::from_json)?,
        })
    }
}

/// A single tweet, with its author and any quoted or retweeted tweet
/// embedded by direct ownership.
///
/// The platform guarantees finite nesting (a tweet never contains itself),
/// so plain `Option<Box<Tweet>>` suffices for the self-referential fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tweet {
    pub created_at: String,
    pub id: u64,
    /// Resolved text. Always populated, see [`Tweet::from_json`].
    pub full_text: String,
    /// Posting client, as an HTML-formatted string.
    pub source: String,
    pub in_reply_to_status_id: Option<u64>,
    pub in_reply_to_user_id: Option<u64>,
    pub in_reply_to_screen_name: Option<String>,
    pub user: Author,
    /// Raw geoJSON point, when the tweet carries one.
    pub coordinates: Option<Value>,
    /// Raw place record, when the tweet is associated with one.
    pub place: Option<Value>,
    pub is_quote_status: bool,
    pub quoted_status_id: Option<u64>,
    pub quoted_status: Option<Box<Tweet>>,
    pub retweet_count: u64,
    pub favorite_count: u64,
    pub entities: Entities,
    pub favorited: Option<bool>,
    pub retweeted: Option<bool>,
    pub possibly_sensitive: Option<bool>,
    pub lang: Option<String>,
    pub retweeted_status: Option<Box<Tweet>>,
}

impl Tweet {
    /// Build a tweet from a raw payload.
    ///
    /// Recurses into `quoted_status` and `retweeted_status` when present;
    /// their absence means "no such relation", not an error.
    pub fn from_json(data: &Value) -> Result<Self> {
        Ok(Self {
            full_text: resolve_full_text(data)?,
            created_at: req_str(data, "created_at")?,
            id: req_u64(data, "id")?,
            source: req_str(data, "source")?,
            in_reply_to_status_id: opt_u64(data, "in_reply_to_status_id"),
            in_reply_to_user_id: opt_u64(data, "in_reply_to_user_id"),
            in_reply_to_screen_name: opt_str(data, "in_reply_to_screen_name"),
            user: Author::from_json(req(data, "user")?)?,
            coordinates: opt_value(data, "coordinates"),
            place: opt_value(data, "place"),
            is_quote_status: req_bool(data, "is_quote_status")?,
            quoted_status_id: opt_u64(data, "quoted_status_id"),
            quoted_status: nested(data, "quoted_status")?,
            retweet_count: req_u64(data, "retweet_count")?,
            favorite_count: req_u64(data, "favorite_count")?,
            entities: Entities::from_json(req(data, "entities")?)?,
            favorited: opt_bool(data, "favorited"),
            retweeted: opt_bool(data, "retweeted"),
            possibly_sensitive: opt_bool(data, "possibly_sensitive"),
            lang: opt_str(data, "lang"),
            retweeted_status: nested(data, "retweeted_status")?,
        })
    }
}

fn opt_value(data: &Value, key: &str) -> Option<Value> {
    match data.get(key) {
        Some(v) if !v.is_null() => Some(v.clone()),
        _ => None,
    }
}

fn nested(data: &Value, key: &'static str) -> Result<Option<Box<Tweet>>> {
    match data.get(key) {
        Some(v) if !v.is_null() => Ok(Some(Box::new(Tweet::from_json(v)?))),
        _ => Ok(None),
    }
}

/// Resolve the tweet text, in priority order: explicit `full_text`; the
/// `extended_tweet` record of a truncated payload; the `extended_tweet`
/// record of an embedded retweet; the short `text` field.
fn resolve_full_text(data: &Value) -> Result<String> {
    if let Some(text) = data.get("full_text").and_then(Value::as_str) {
        return Ok(text.to_owned());
    }

    let truncated = data
        .get("truncated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if truncated {
        if let Some(extended) = data.get("extended_tweet") {
            return req_str(extended, "full_text");
        }
    }

    if let Some(extended) = data
        .get("retweeted_status")
        .and_then(|rt| rt.get("extended_tweet"))
    {
        return req_str(extended, "full_text");
    }

    req_str(data, "text")
}
