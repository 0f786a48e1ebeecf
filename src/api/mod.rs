pub mod handlers;

pub use handlers::{download_report, health_check, run_report};
