//! Process wiring: bootstrap, router assembly and health probes.

mod bootstrap;
mod health;
mod server;

pub use bootstrap::*;
pub use health::*;
pub use server::*;
