//! per-ankh CLI: question answering over knowledge graphs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use per_ankh::config::AnkhConfig;
use per_ankh::error::EvalError;
use per_ankh::eval::{self, EvalOptions};
use per_ankh::graph::{EmbeddedStore, QueryExecutor, SparqlEndpoint};
use per_ankh::llm::HttpCompletionClient;
use per_ankh::pipeline::Pipeline;
use per_ankh::question::Question;

#[derive(Parser)]
#[command(name = "ankh", version, about = "Question answering over knowledge graphs")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/per-ankh/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use an embedded graph store at this directory instead of an endpoint.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// SPARQL endpoint URL, overriding the config.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Completion API base URL, overriding the config.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a natural-language question against the graph.
    Ask {
        /// The question text.
        question: String,

        /// Entity label mentioned in the question (repeatable).
        #[arg(long = "entity")]
        entities: Vec<String>,

        /// Knowledge-graph identifier for an entity (repeatable, pairs with --entity).
        #[arg(long = "entity-id")]
        entity_ids: Vec<String>,

        /// Print the resolved SPARQL query before the answer.
        #[arg(long)]
        show_query: bool,
    },

    /// Execute a SPARQL query directly and print the results.
    Query {
        /// The query text.
        sparql: String,
    },

    /// Score generated queries against a labeled dataset.
    Eval {
        /// Path to a JSON dataset file.
        #[arg(long)]
        dataset: PathBuf,

        /// Score only the first N examples.
        #[arg(long)]
        limit: Option<usize>,

        /// Generate queries through the pipeline instead of scoring
        /// candidates recorded in the dataset.
        #[arg(long)]
        generate: bool,

        /// Write the full report as CSV to this path.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the full report as JSON to this path.
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Manage configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file to the standard location.
    Init,
    /// Print the effective configuration as TOML.
    Show,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AnkhConfig::load_or_default(cli.config.as_deref())?;
    if let Some(url) = &cli.base_url {
        config.llm.base_url = url.clone();
    }

    match cli.command {
        Commands::Ask {
            question,
            entities,
            entity_ids,
            show_query,
        } => {
            let executor = build_executor(cli.store.as_deref(), cli.endpoint.as_deref(), &config)?;
            let pipeline = build_pipeline(executor, &config)?;

            let question = Question::new(&question)
                .with_entities(entities)
                .with_entity_ids(entity_ids);

            let grounded = pipeline.answer_question(&question)?;

            if show_query {
                let attempts = grounded.attempts;
                println!(
                    "SPARQL query (resolved after {attempts} execution{}):",
                    if attempts == 1 { "" } else { "s" }
                );
                println!("{}", grounded.query);
                println!();
            }
            println!("{}", grounded.answer);
        }

        Commands::Query { sparql } => {
            let executor = build_executor(cli.store.as_deref(), cli.endpoint.as_deref(), &config)?;
            let rows = executor.execute(&sparql)?;
            if rows.is_empty() {
                println!("(no results)");
            } else {
                println!("{}", rows.render());
            }
        }

        Commands::Eval {
            dataset,
            limit,
            generate,
            csv,
            json,
        } => {
            let examples = eval::load_dataset(&dataset)?;
            let executor = build_executor(cli.store.as_deref(), cli.endpoint.as_deref(), &config)?;
            let options = EvalOptions { limit };

            let report = if generate {
                let pipeline = build_pipeline(executor.clone(), &config)?;
                eval::run_generated(executor.as_ref(), &pipeline, &examples, options)?
            } else {
                eval::run_recorded(executor.as_ref(), &examples, options)
            };

            print!("{report}");

            if let Some(path) = csv {
                write_report(&path, &report.to_csv())?;
                println!("wrote {}", path.display());
            }
            if let Some(path) = json {
                let pretty = serde_json::to_string_pretty(&report.to_json()).into_diagnostic()?;
                write_report(&path, &pretty)?;
                println!("wrote {}", path.display());
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Init => {
                let path = AnkhConfig::default_path()?;
                if path.exists() {
                    miette::bail!("config already exists at {}", path.display());
                }
                AnkhConfig::default().save(&path)?;
                println!("Wrote default config to {}", path.display());
            }
            ConfigAction::Show => {
                let toml = toml::to_string_pretty(&config).into_diagnostic()?;
                print!("{toml}");
            }
        },
    }

    Ok(())
}

/// Pick the graph backend: an embedded store if `--store` was given,
/// otherwise the configured SPARQL endpoint.
fn build_executor(
    store: Option<&Path>,
    endpoint_override: Option<&str>,
    config: &AnkhConfig,
) -> Result<Arc<dyn QueryExecutor>> {
    if let Some(dir) = store {
        return Ok(Arc::new(EmbeddedStore::open(dir)?));
    }
    let mut endpoint = config.endpoint_config()?;
    if let Some(url) = endpoint_override {
        endpoint.url = url.to_string();
    }
    Ok(Arc::new(SparqlEndpoint::new(endpoint)))
}

fn build_pipeline(executor: Arc<dyn QueryExecutor>, config: &AnkhConfig) -> Result<Pipeline> {
    let client = Arc::new(HttpCompletionClient::new(config.llm_config())?);
    Ok(Pipeline::new(executor, client)
        .with_prompts(config.prompt_set())
        .with_options(config.pipeline_options()))
}

fn write_report(path: &Path, content: &str) -> std::result::Result<(), EvalError> {
    std::fs::write(path, content).map_err(|source| EvalError::Write {
        path: path.display().to_string(),
        source,
    })
}
