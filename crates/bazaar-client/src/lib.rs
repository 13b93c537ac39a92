//! Polling client for the bazaar messaging API.
//!
//! There is no push transport: freshness comes from fixed-interval pollers
//! that are cancelled when the view that owns them goes away.

pub mod client;
pub mod inbox;
pub mod poller;

pub use client::{ApiClient, ClientError};
pub use poller::{PollHandle, PollState};
