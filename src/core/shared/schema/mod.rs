// Core (Always available)
pub mod core;
pub use self::core::*;

pub mod helpdesk;
pub use self::helpdesk::*;

pub mod ticket_tables;
pub use self::ticket_tables::*;

pub mod docs;
pub use self::docs::*;

pub mod settings;
pub use self::settings::*;

#[cfg(feature = "social")]
pub mod social;
#[cfg(feature = "social")]
pub use self::social::*;
