//! Twitter v1.1 timeline collector.
//!
//! Fetches and normalizes tweet data: verifies credentials, pages through
//! historical timelines, follows the live filtered stream, and turns the
//! platform's loosely-structured JSON payloads into a typed, navigable
//! object graph.
//!
//! Transport, OAuth signing, and stream framing sit behind the
//! [`StatusApi`] capability; the rest of the crate is a pure data-shaping
//! layer. There is no persistence and no internal parallelism: collection
//! calls run sequentially, and [`Collector::stream`] blocks its task until
//! a non-transport error occurs.
//!
//! ```no_run
//! use birdwatch::{Collector, StreamRetry, TwitterConfig};
//!
//! # async fn demo() -> birdwatch::Result<()> {
//! let config = TwitterConfig {
//!     consumer_key: "...".into(),
//!     consumer_secret: "...".into(),
//!     access_token: "...".into(),
//!     access_token_secret: "...".into(),
//!     ..Default::default()
//! };
//! let collector = Collector::new(&config)?;
//!
//! if collector.verify_authentication().await {
//!     for tweet in collector.get_historical(500, &["BTCTN".into()]).await? {
//!         println!("{}", birdwatch::render_human(&tweet));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod collector;
mod config;
mod error;
mod model;
mod oauth;
mod render;
mod stream;

pub use client::{StatusApi, TwitterApiClient};
pub use collector::{Collector, PAGE_SIZE};
pub use config::{RetryConfig, StreamRetry, TwitterConfig};
pub use error::{Error, Result};
pub use model::{Author, Cashtag, Entities, Hashtag, Link, Mention, Tweet};
pub use render::{render_human, resolve_quote_chain, to_table, TableRow, TweetTable, COLUMNS};
pub use stream::StatusStream;
