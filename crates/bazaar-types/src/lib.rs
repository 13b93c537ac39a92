//! Wire types shared by the bazaar server and its polling client.

pub mod api;
pub mod notifications;
