pub mod archive;
pub mod cache;
pub mod core;
pub mod portal;
pub mod utils;
pub mod workflow;

// Re-exports
pub use cache::ReportPayload;
pub use crate::core::config::WorkflowConfig;
pub use portal::documents::{Document, ReportKind};
