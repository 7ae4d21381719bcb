pub mod export;
pub mod models;

pub use export::*;
pub use models::*;
