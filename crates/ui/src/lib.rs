//! Presentation state for the selected spot: selection controller, responsive
//! layout and bottom sheet, detail view, carousel, collapsible description.

pub mod carousel;
pub mod controller;
pub mod counter;
pub mod description;
pub mod detail;
pub mod html;
pub mod layout;
pub mod presenter;

pub use carousel::*;
pub use controller::*;
pub use counter::*;
pub use description::*;
pub use detail::*;
pub use html::*;
pub use layout::*;
pub use presenter::*;
