pub mod debounce;
pub mod schema;
pub mod state;
pub mod utils;

pub use schema::*;
pub use utils::DbPool;
