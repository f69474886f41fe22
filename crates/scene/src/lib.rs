//! The map-surface seam and everything drawn through it: layer specs, the
//! clustered spot renderer, click routing and selection.

pub mod layers;
pub mod picking;
pub mod recording;
pub mod renderer;
pub mod selection;
pub mod surface;

pub use layers::*;
pub use picking::*;
pub use recording::*;
pub use renderer::*;
pub use selection::*;
pub use surface::*;
