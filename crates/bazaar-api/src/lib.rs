//! Messaging and notification core of the marketplace: conversation
//! directory, message ledger, notification fan-out and inbox, plus the
//! identity gate and HTTP handlers in front of them.

pub mod auth;
pub mod conversations;
pub mod error;
pub mod fanout;
pub mod listings;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod routes;
mod store;

#[cfg(test)]
pub(crate) mod testing;
