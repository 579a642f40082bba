// Webhook Gateway Library
// Exposes modules for the binary and for integration tests

pub mod config;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use config::{Config, ConfigError};
pub use http::{router, AppState};
pub use metrics::Metrics;
pub use pipeline::{ProcessError, WebhookPipeline};
