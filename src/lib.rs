pub mod api;
pub mod bip;
pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use bip::{ArtifactFetcher, BipClient, ReportService};
pub use config::AppConfig;
pub use service::ReportPipeline;
