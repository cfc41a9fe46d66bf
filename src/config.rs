//! Process configuration, built once at startup and passed explicitly to the clients.
//!
//! Every flag can also be supplied through the environment. Binaries call
//! `dotenv::dotenv()` before parsing so a local `.env` file works too.

use std::time::Duration;

use clap::Args;

use crate::chat::DEFAULT_CHAT_MODEL;
use crate::embedding::{DEFAULT_DIMENSION, DEFAULT_MODEL};
use crate::store::{IndexSpec, Metric};

/// Default OpenAI-compatible API base.
const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Default Pinecone control plane.
const DEFAULT_PINECONE_CONTROL: &str = "https://api.pinecone.io";

/// Pinecone REST API version sent with every request.
const DEFAULT_PINECONE_API_VERSION: &str = "2024-07";

/// Settings for the embedding provider.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Chat model used to answer questions over search results.
    pub chat_model: String,
    pub dimension: usize,
    pub timeout: Duration,
}

/// Settings for the vector store.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    pub control_url: String,
    pub api_version: String,
    pub timeout: Duration,
    /// How many times to poll a freshly created index before giving up.
    pub ready_attempts: usize,
    pub ready_interval: Duration,
}

/// Everything a run needs, resolved once.
#[derive(Debug, Clone)]
pub struct Config {
    pub embedding: OpenAiConfig,
    pub store: PineconeConfig,
    pub index: IndexSpec,
    pub namespace: String,
}

/// Flags shared by every binary.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// OpenAI API key used for embedding calls
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Base URL for the OpenAI-compatible API
    #[arg(long, env = "FITNESS_OPENAI_BASE", default_value = DEFAULT_OPENAI_BASE)]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(long, env = "FITNESS_OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    /// Chat model used by `search --answer`
    #[arg(long, env = "FITNESS_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    /// Dimension of the vectors produced by the model and stored in the index
    #[arg(long, env = "FITNESS_DIMENSION", default_value_t = DEFAULT_DIMENSION)]
    pub dimension: usize,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "FITNESS_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    pub openai_timeout_secs: u64,

    /// Pinecone API key (not needed with --dry-run)
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true)]
    pub pinecone_api_key: Option<String>,

    /// Pinecone control plane URL
    #[arg(long, env = "FITNESS_PINECONE_CONTROL", default_value = DEFAULT_PINECONE_CONTROL)]
    pub pinecone_control_url: String,

    /// Pinecone REST API version header
    #[arg(long, env = "FITNESS_PINECONE_API_VERSION", default_value = DEFAULT_PINECONE_API_VERSION)]
    pub pinecone_api_version: String,

    /// Max seconds to wait for each vector store request
    #[arg(long, env = "FITNESS_PINECONE_TIMEOUT_SECS", default_value_t = 30)]
    pub pinecone_timeout_secs: u64,

    /// Index (collection) name
    #[arg(long, env = "FITNESS_INDEX", default_value = "fitness")]
    pub index: String,

    /// Namespace (partition) inside the index
    #[arg(long, env = "FITNESS_NAMESPACE", default_value = "ns1")]
    pub namespace: String,

    /// Similarity metric used when creating the index
    #[arg(long, env = "FITNESS_METRIC", value_enum, default_value_t = Metric::Cosine)]
    pub metric: Metric,

    /// Cloud hosting the serverless index
    #[arg(long, env = "FITNESS_CLOUD", default_value = "aws")]
    pub cloud: String,

    /// Region hosting the serverless index
    #[arg(long, env = "FITNESS_REGION", default_value = "us-east-1")]
    pub region: String,
}

impl Settings {
    /// Converts the parsed flags into a [`Config`].
    pub fn into_config(self) -> Config {
        Config {
            embedding: OpenAiConfig {
                api_key: self.openai_api_key,
                base_url: self.openai_base_url,
                model: self.openai_model,
                chat_model: self.chat_model,
                dimension: self.dimension,
                timeout: Duration::from_secs(self.openai_timeout_secs.max(1)),
            },
            store: PineconeConfig {
                api_key: self.pinecone_api_key.unwrap_or_default(),
                control_url: self.pinecone_control_url,
                api_version: self.pinecone_api_version,
                timeout: Duration::from_secs(self.pinecone_timeout_secs.max(1)),
                ready_attempts: 30,
                ready_interval: Duration::from_secs(2),
            },
            index: IndexSpec {
                name: self.index,
                dimension: self.dimension,
                metric: self.metric,
                cloud: self.cloud,
                region: self.region,
            },
            namespace: self.namespace,
        }
    }
}
