pub mod client;
pub mod core;
pub mod docs;
pub mod helpdesk;
pub mod main_module;
pub mod search;
pub mod settings;
#[cfg(feature = "social")]
pub mod social;
pub mod tickets;
pub mod triage;
