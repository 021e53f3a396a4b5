//! Client for Yellowcake's streaming extraction API.

pub mod client;
pub mod sse;

pub use client::{
    to_old_reddit, ByteStream, ExtractOutcome, ExtractRequest, YellowcakeClient,
    DEFAULT_POST_PROMPT, REDDIT_FEED_URL,
};
pub use sse::{error_frame, SseEvent, SseParser, StreamMessage};
