//! Helpdesk Server Core
//!
//! Keyset pagination for the list endpoints and the partner webhook relay.

pub mod config;
pub mod pagination;
pub mod webhooks;
