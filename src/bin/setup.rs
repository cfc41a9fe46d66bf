use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fitness_index::embedding::openai::OpenAiEmbedder;
use fitness_index::embedding::Embedder;
use fitness_index::store::{memory::MemoryStore, pinecone::PineconeStore};
use fitness_index::{Config, JsonFileSource, Pipeline, RecordSource, Settings, VectorStore};

#[derive(Parser, Debug)]
#[command(
    name = "fitness-setup",
    about = "Embed the exercise catalog and upsert it into the vector index"
)]
struct SetupCli {
    #[command(flatten)]
    settings: Settings,

    /// JSON file with a top-level `fitness` array of exercises
    #[arg(long, env = "FITNESS_INPUT", default_value = "fitness.json")]
    input: PathBuf,

    /// Create the index before writing (an existing index is left as is)
    #[arg(long, default_value_t = false)]
    create_index: bool,

    /// Fail instead of letting the last record win when exercise names repeat
    #[arg(long, default_value_t = false)]
    reject_duplicates: bool,

    /// Write to an in-memory index instead of Pinecone
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    fitness_index::init_tracing();

    let cli = SetupCli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: SetupCli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.settings.into_config();

    let source = JsonFileSource::new(&cli.input, cli.reject_duplicates);
    let embedder = OpenAiEmbedder::new(&config.embedding)?;

    if cli.dry_run {
        tracing::info!("Dry run, writing to an in-memory index");
        let store = MemoryStore::new(&config.index.name);
        ingest(&config, &source, &embedder, &store, true).await
    } else {
        let store = PineconeStore::new(&config.store, &config.index.name)?;
        ingest(&config, &source, &embedder, &store, cli.create_index).await
    }
}

async fn ingest<R: RecordSource, E: Embedder, S: VectorStore>(
    config: &Config,
    source: &R,
    embedder: &E,
    store: &S,
    create_index: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if create_index {
        store.create_index(&config.index).await?;
    }

    let exercises = source.load().await?;

    let report = Pipeline::new(embedder, store, &config.namespace)
        .run(&exercises)
        .await?;

    tracing::info!(
        records = report.records,
        namespace = %report.namespace,
        "Ingestion finished"
    );
    println!("Upserted count: {}", report.upserted_count);

    let stats = store.describe_stats().await?;
    println!("{}", stats);

    Ok(())
}

#[cfg(test)]
mod tests {
    use fitness_index::ProviderError;

    use super::*;

    struct FixedEmbedder;

    impl Embedder for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn test_dry_run_creates_index_once() {
        let cli = SetupCli::try_parse_from([
            "fitness-setup",
            "--openai-api-key",
            "sk-test",
            "--dimension",
            "3",
            "--dry-run",
        ])
        .unwrap();
        assert!(cli.dry_run);
        let config = cli.settings.into_config();

        let source = JsonFileSource::new(
            concat!(env!("CARGO_MANIFEST_DIR"), "/fitness.json"),
            false,
        );
        let store = MemoryStore::new(&config.index.name);
        ingest(&config, &source, &FixedEmbedder, &store, true)
            .await
            .unwrap();

        assert_eq!(store.entries("ns1").len(), 3);
        assert_eq!(store.upsert_calls(), 1);
        let stats = store.describe_stats().await.unwrap();
        assert_eq!(stats.dimension, 3);
    }
}
