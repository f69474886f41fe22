pub mod budget;
pub mod generation;

pub use budget::*;
pub use generation::*;
