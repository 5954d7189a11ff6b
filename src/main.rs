use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;

use docqa::cli::{next_chat_input, ChatInput, Cli, Commands, ConfigAction};
use docqa::config::Config;
use docqa::embedding::{FastEmbedProvider, PassageIndex};
use docqa::error::{DocQaError, Result};
use docqa::ingest::{chunk_documents, load_documents, split_by_tokens, TokenSplitter};
use docqa::llm::build_client;
use docqa::retrieval::{
    AnswerResult, CrossEncoderScorer, PipelineError, PipelineOrchestrator, PipelineSettings,
};

/// Characters of each source passage shown under an answer
const PREVIEW_CHARS: usize = 100;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ask {
            question,
            docs,
            top_n,
            variants,
            json,
        } => {
            let mut config = load_config(cli.config)?;
            config.override_retrieval(top_n, variants)?;
            runtime()?.block_on(cmd_ask(config, &docs, &question, json))?;
        }
        Commands::Chat { docs } => {
            let config = load_config(cli.config)?;
            runtime()?.block_on(cmd_chat(config, &docs))?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "docqa=debug" } else { "docqa=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| DocQaError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })
}

/// Load documents, build the index and wire the pipeline
///
/// Every model and client is created exactly once here and shared.
async fn build_pipeline(config: &Config, docs: &[PathBuf]) -> Result<PipelineOrchestrator> {
    let documents = load_documents(docs)?;
    let mut passages = chunk_documents(&documents, &config.chunking);

    let provider = Arc::new(
        FastEmbedProvider::new(&config.embedding.model).map_err(|e| anyhow::anyhow!(e))?,
    );

    if config.chunking.tokens_per_chunk > 0 {
        let tokenizer = provider.tokenizer().map_err(|e| anyhow::anyhow!(e))?;
        let splitter = TokenSplitter::new(Arc::new(tokenizer), config.chunking.tokens_per_chunk);
        passages = split_by_tokens(passages, &splitter)?;
    }

    let index = PassageIndex::new(
        provider,
        &config.indexing,
        config.embedding.batch_size,
        passages.len(),
    )
    .map_err(|e| DocQaError::InvalidConfigValue {
        path: "indexing.vector_dim".to_string(),
        message: e.to_string(),
    })?;

    let report = index.add_passages(passages).await;
    eprintln!(
        "✓ Indexed {} passages from {} documents ({}ms)",
        report.indexed,
        documents.len(),
        report.duration_ms
    );
    if report.failed > 0 {
        eprintln!("⚠ {} passages could not be indexed", report.failed);
    }

    let scorer = Arc::new(
        CrossEncoderScorer::new(&config.retrieval.reranker_model)
            .map_err(|e| anyhow::anyhow!(e))?,
    );
    let generator = build_client(&config.llm).map_err(|e| anyhow::anyhow!(e))?;

    Ok(PipelineOrchestrator::new(
        Arc::new(index),
        generator,
        scorer,
        PipelineSettings::from(&config.retrieval),
    ))
}

/// Answer one question, cancelling it on Ctrl-C
async fn answer_interruptible(
    pipeline: &PipelineOrchestrator,
    question: &str,
) -> std::result::Result<AnswerResult, PipelineError> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = pipeline.answer_with_cancel(question, &cancel).await;
    watcher.abort();
    result
}

async fn cmd_ask(config: Config, docs: &[PathBuf], question: &str, json: bool) -> Result<()> {
    let pipeline = build_pipeline(&config, docs).await?;
    let result = answer_interruptible(&pipeline, question).await?;

    if json {
        let output = serde_json::to_string_pretty(&result.to_response()).map_err(|e| {
            DocQaError::Json {
                source: e,
                context: "Failed to serialize answer".to_string(),
            }
        })?;
        println!("{}", output);
    } else {
        print_answer(&result);
    }

    Ok(())
}

async fn cmd_chat(config: Config, docs: &[PathBuf]) -> Result<()> {
    let pipeline = build_pipeline(&config, docs).await?;
    let mut transcript: Vec<(String, AnswerResult)> = Vec::new();

    println!(
        "Ask a question related to the documents (\"exit\" or Ctrl-C to quit, \"history\" to review)"
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        // Ctrl-C at the prompt ends the session; during an answer it only
        // cancels that answer
        let input = next_chat_input(&mut lines, tokio::signal::ctrl_c())
            .await
            .map_err(|e| DocQaError::Io {
                source: e,
                context: "Failed to read from stdin".to_string(),
            })?;
        let line = match input {
            ChatInput::Line(line) => line,
            ChatInput::Eof => break,
            ChatInput::Interrupted => {
                println!();
                break;
            }
        };

        let question = line.trim();
        match question {
            "" => continue,
            "exit" | "quit" => break,
            "history" => {
                for (i, (question, result)) in transcript.iter().enumerate() {
                    println!("\n[{}] Q: {}\n    A: {}", i + 1, question, result.answer);
                }
                continue;
            }
            _ => {}
        }

        match answer_interruptible(&pipeline, question).await {
            Ok(result) => {
                print_answer(&result);
                transcript.push((question.to_string(), result));
            }
            Err(e) => {
                // keep the session alive; the user can rephrase or retry
                eprintln!("✗ {}", e);
            }
        }
    }

    Ok(())
}

fn print_answer(result: &AnswerResult) {
    println!("\n{}\n", result.answer);
    println!("Source Documents");
    println!("================");
    for (i, passage) in result.sources.iter().enumerate() {
        println!("\nDocument {}:", i + 1);
        println!(
            "  Source: {}  Locator: {}",
            passage.source_id().unwrap_or("(unknown)"),
            passage.locator().unwrap_or("-")
        );
        println!("  Content: {}", passage.preview(PREVIEW_CHARS));
    }
    println!();
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| DocQaError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    Config::load_or_default(&path)
}
