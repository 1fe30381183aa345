use anyhow::Context;
use minirag::{OpenAIConfig, RagConfig, RagPipeline};
use minirag_server::server::{ServerConfig, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let rag_config = RagConfig::from_env().context("invalid RAG configuration")?;
    let pipeline = RagPipeline::openai(rag_config, OpenAIConfig::from_env())
        .context("failed to set up OpenAI clients")?;

    run_server(ServerConfig::from_env()?, pipeline).await
}
