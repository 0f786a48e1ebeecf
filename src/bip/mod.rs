pub mod client;
pub mod fetcher;

pub use client::{BipClient, DocumentData, OutputDescriptor, ReportService};
pub use fetcher::ArtifactFetcher;
