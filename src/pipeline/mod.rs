//! Pipeline entry points
//!
//! [`Engine`] runs single remix and analysis requests; [`analyze_files`]
//! fans tempo analysis out over a thread pool.

pub mod batch;
pub mod engine;

pub use batch::{analyze_files, AnalysisRecord};
pub use engine::{sum_parts, Engine, Remix};
