pub mod client;
pub mod fires;
pub mod hotspots;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use client::{FeedError, FeedFetcher, HttpFeedClient};
