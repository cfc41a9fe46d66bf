pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod exercise;
pub mod pipeline;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::{Config, Settings};
pub use error::{IngestError, InputError, ProviderError, StoreError};
pub use exercise::{Exercise, ExerciseCatalog, JsonFileSource, RecordSource};
pub use pipeline::{assemble, IngestReport, Pipeline};
pub use store::{IndexSpec, IndexStats, Metric, QueryMatch, VectorEntry, VectorStore};

/// Installs the fmt subscriber on stderr. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
