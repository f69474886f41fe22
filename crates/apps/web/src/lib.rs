//! Browser front end of the spot map: mounts a clustered map of spots into a
//! page container and wires selection, detail views and votes.
//!
//! Everything outside the `wasm32` modules runs natively, so the flows in
//! [`context`] are tested against recording surfaces and scripted transports.

pub mod config;
pub mod context;

#[cfg(target_arch = "wasm32")]
mod bridge;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod http;
#[cfg(target_arch = "wasm32")]
mod logging;
#[cfg(target_arch = "wasm32")]
mod mount;

pub use config::*;
pub use context::*;
#[cfg(target_arch = "wasm32")]
pub use mount::{SpotMap, mount};
