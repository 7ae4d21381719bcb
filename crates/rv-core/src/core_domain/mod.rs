mod attribute;
mod canonical;
mod error;
mod ports;
mod types;

pub use attribute::*;
pub use canonical::*;
pub use error::*;
pub use ports::*;
pub use types::*;
