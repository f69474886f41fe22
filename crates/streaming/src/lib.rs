//! Spot data pipeline: listing wire format, response cache, last-request-wins
//! fetching and batched GeoJSON feature construction.

pub mod cache;
pub mod features;
pub mod protocol;
pub mod request;
pub mod source;
pub mod transport;

pub use cache::*;
pub use features::*;
pub use protocol::*;
pub use request::*;
pub use source::*;
pub use transport::*;
