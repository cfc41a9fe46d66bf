use std::process::ExitCode;

use clap::Parser;
use fitness_index::chat::OpenAiChat;
use fitness_index::embedding::openai::OpenAiEmbedder;
use fitness_index::embedding::Embedder;
use fitness_index::exercise::INSTRUCTIONS_KEY;
use fitness_index::store::pinecone::PineconeStore;
use fitness_index::{QueryMatch, Settings, VectorStore};
use itertools::Itertools;

#[derive(Parser, Debug)]
#[command(
    name = "fitness-search",
    about = "Find the exercises closest to a free-text query"
)]
struct SearchCli {
    #[command(flatten)]
    settings: Settings,

    /// What the user is looking for, e.g. "chest workout without equipment"
    query: String,

    /// Number of matches to return
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Ask the chat model to answer the query from the matches
    #[arg(long, default_value_t = false)]
    answer: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    fitness_index::init_tracing();

    let cli = SearchCli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: SearchCli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.settings.into_config();
    let embedder = OpenAiEmbedder::new(&config.embedding)?;
    let store = PineconeStore::new(&config.store, &config.index.name)?;

    let query = cli.query.trim();
    tracing::info!(query = %query, "Generating embedding vector for search query");
    let embedding = embedder.embed(query).await?;

    let matches = store
        .query(&embedding, cli.top_k.max(1), &config.namespace)
        .await?;
    tracing::info!("Found {} matches", matches.len());

    if matches.is_empty() {
        println!("No matching exercises in namespace {}", config.namespace);
        return Ok(());
    }

    if cli.answer {
        let chat = OpenAiChat::new(&config.embedding)?;
        let answer = chat.answer(query, &matches).await?;
        println!("{}\n\nSources:\n\n{}", answer, sources(&matches));
        return Ok(());
    }

    for (rank, hit) in matches.iter().enumerate() {
        println!("{}", render_match(rank + 1, hit));
    }

    Ok(())
}

fn sources(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .map(|hit| format!("- {}\n", hit.id))
        .unique()
        .collect::<String>()
}

fn render_match(rank: usize, hit: &QueryMatch) -> String {
    format!(
        "{}. {} (score {:.3})\n   Type of activity: {}\n   Equipment: {}\n   Body part: {}\n   Muscle groups: {}\n   Instructions: {}\n",
        rank,
        hit.id,
        hit.score,
        field(hit, "type_of_activity"),
        field(hit, "type_of_equipment"),
        field(hit, "body_part"),
        field(hit, "muscle_groups_activated"),
        field(hit, INSTRUCTIONS_KEY),
    )
}

fn field<'a>(hit: &'a QueryMatch, key: &str) -> &'a str {
    hit.metadata.get(key).map(String::as_str).unwrap_or("-")
}
