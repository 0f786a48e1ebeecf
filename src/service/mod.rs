pub mod combiner;
pub mod exporter;
pub mod pipeline;
pub mod reconciler;

pub use pipeline::{PipelineOutput, PipelineRun, ReportPipeline};
