//! Per-visitor like/dislike state with local-first persistence and best-effort
//! server sync.

pub mod bootstrap;
pub mod state;
pub mod store;
pub mod sync;

pub use bootstrap::*;
pub use state::*;
pub use store::*;
pub use sync::*;
