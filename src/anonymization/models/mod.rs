//! Data models shared by the detection and rewrite stages

pub mod results;
pub mod span;

pub use results::{
    Analysis, AnonymizedText, EntityStatistics, ProcessResult, Replacement, RewriteWarning,
};
pub use span::{DetectionMethod, EntityType, Span};
