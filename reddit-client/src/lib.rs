//! Reddit access for MarketSnipe: single post lookups and the paced,
//! cached proxy queue.

pub mod api;
pub mod cache;
pub mod request_queue;
pub mod urls;


pub use api::{extract_post, RedditJsonClient, RedditPostData};
pub use cache::ResponseCache;
pub use request_queue::{Pacing, RequestQueue};
pub use urls::{absolute_permalink, json_url, json_url_simple, validate_reddit_url};
