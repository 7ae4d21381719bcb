pub mod bootstrap;
pub mod config;
pub mod context;
pub mod detect;
pub mod generic;
pub mod import;
pub mod langsmith;
pub mod logging;
pub mod lookup;
pub mod messages;
pub mod otel;
pub mod registry;
pub mod tree;

pub use detect::{detect_format, DetectedFormat};
pub use import::{DetectionReport, ImportFailure, ImportResult, Importer, UnitLocation};
pub use registry::AdapterRegistry;
