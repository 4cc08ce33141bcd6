mod doctor;
mod output;
mod query;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::builder::FalseyValueParser;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pageflow_agent::{Collaborators, Pipeline, PipelineOptions, RunOutcome};
use pageflow_core::config::AppConfig;
use pageflow_core::types::{Document, Product, RawInput};

use output::RunStore;
use query::FaqResponder;

/// Exit status of a run that hit the revision cap without approval.
const EXIT_UNRESOLVED: i32 = 2;

#[derive(Parser)]
#[command(name = "pageflow", version, about = "Graph-driven product page generator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "pageflow.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Index generated content for semantic retrieval (`run`, `ask`)
    #[arg(
        long,
        global = true,
        env = "PAGEFLOW_ENABLE_RETRIEVAL",
        value_parser = FalseyValueParser::new()
    )]
    enable_retrieval: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write the documents (default)
    Run {
        /// Product JSON file (defaults to the built-in sample product)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Run without writing outputs
        #[arg(long)]
        dry_run: bool,
    },
    /// Print FAQ items from the latest run
    Show {
        /// Number of items to print
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },
    /// Answer a question from the latest FAQ (interactive without a question)
    Ask {
        #[arg(trailing_var_arg = true)]
        question: Vec<String>,
    },
    /// Show current configuration
    Config,
    /// Run configuration health checks
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.debug { "pageflow=debug,warn" } else { "pageflow=info,warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "pageflow", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.apply_env();
    if cli.enable_retrieval {
        config.enable_retrieval();
    }

    match cli.command {
        None => run(&config, None, false),
        Some(Commands::Run { input, dry_run }) => run(&config, input.as_deref(), dry_run),
        Some(Commands::Show { count }) => show(&config, count),
        Some(Commands::Ask { question }) => ask(&config, &question.join(" ")),
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Doctor) => doctor(&config),
        Some(Commands::Completions { .. }) => Ok(()),
    }
}

fn run(config: &AppConfig, input: Option<&Path>, dry_run: bool) -> anyhow::Result<()> {
    let raw = match input {
        Some(path) => load_input(path)?,
        None => {
            info!("No input file given, using the built-in sample product");
            sample_input()
        }
    };

    let collaborators = Collaborators {
        refiner: pageflow_llm::create_refiner(config.refinement.as_ref()),
        retriever: pageflow_memory::create_retriever(config.retrieval.as_ref()),
    };
    let pipeline = Pipeline::new(PipelineOptions::from_config(config), collaborators)
        .context("building pipeline graph")?;
    let run = pipeline.run(&raw).context("pipeline run failed")?;

    match run.outcome {
        RunOutcome::Approved => {}
        RunOutcome::Unresolved {
            ref critique,
            revisions,
        } => {
            eprintln!("Run {} unresolved after {} revisions", run.meta.run_id, revisions);
            eprintln!("Final critique: {}", critique);
            std::process::exit(EXIT_UNRESOLVED);
        }
    }

    let documents = run
        .documents
        .as_ref()
        .context("approved run produced no documents")?;

    let outputs = if dry_run {
        info!(run_id = %run.meta.run_id, "Dry run, outputs not written");
        Vec::new()
    } else {
        let store = RunStore::new(config.output_dir());
        store
            .write_run(&run.meta, documents)
            .with_context(|| format!("writing outputs to {}", store.dir().display()))?
    };

    let summary = serde_json::json!({
        "run_id": run.meta.run_id,
        "timestamp": run.meta.timestamp_rfc3339(),
        "path": run.path,
        "outputs": outputs.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn doctor(config: &AppConfig) -> anyhow::Result<()> {
    println!("pageflow Doctor");
    println!("===============");
    let issues = doctor::run_doctor(config);
    if issues > 0 {
        anyhow::bail!("doctor found {} issue(s)", issues);
    }
    Ok(())
}

fn load_input(path: &Path) -> anyhow::Result<RawInput> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading input {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON object", path.display()))
}

fn sample_input() -> RawInput {
    let mut raw = RawInput::new();
    for (key, value) in [
        ("Product Name", "GlowBoost Vitamin C Serum"),
        ("Concentration", "10% Vitamin C"),
        ("Skin Type", "Oily, Combination"),
        ("Key Ingredients", "Vitamin C, Hyaluronic Acid"),
        ("Benefits", "Brightening, Fades dark spots"),
        ("How to Use", "Apply 2-3 drops in the morning before sunscreen"),
        ("Side Effects", "Mild tingling for sensitive skin"),
        ("Price", "₹699"),
    ] {
        raw.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }
    raw
}

fn latest_store(config: &AppConfig) -> anyhow::Result<(RunStore, pageflow_core::types::RunId)> {
    let store = RunStore::new(config.output_dir());
    let latest = store
        .latest()
        .with_context(|| format!("reading latest run pointer in {}", store.dir().display()))?
        .with_context(|| {
            format!(
                "No latest run in {}. Run `pageflow run` first.",
                store.dir().display()
            )
        })?;
    Ok((store, latest.run_id))
}

fn show(config: &AppConfig, count: usize) -> anyhow::Result<()> {
    let (store, run_id) = latest_store(config)?;
    let faq = store
        .load_document("faq", &run_id)
        .with_context(|| format!("loading FAQ for run {}", run_id))?;
    let items = faq.faq.unwrap_or_default();

    println!("{} (run {})", faq.title, run_id);
    println!("Total QA items: {}", items.len());
    for (i, item) in items.iter().take(count).enumerate() {
        println!();
        println!("{}. [{}] {}", i + 1, item.category, item.question);
        println!("   {}", item.answer);
    }
    Ok(())
}

fn ask(config: &AppConfig, question: &str) -> anyhow::Result<()> {
    let (store, run_id) = latest_store(config)?;
    let faq = store
        .load_document("faq", &run_id)
        .with_context(|| format!("loading FAQ for run {}", run_id))?;

    // Refinement only needs the product name and price. The comparison page
    // records both verbatim, unlike the templated page titles.
    let product = match store.load_document("comparison_page", &run_id) {
        Ok(page) => product_context(&page),
        Err(e) => {
            warn!(error = %e, "Comparison page missing");
            None
        }
    }
    .unwrap_or_else(|| {
        warn!("No product record for run, refining without product name");
        product_stub(String::new(), faq.meta.price_inr)
    });

    let responder = FaqResponder::new(faq.faq.clone().unwrap_or_default(), product)
        .with_retriever(pageflow_memory::create_retriever(config.retrieval.as_ref()))
        .with_refiner(pageflow_llm::create_refiner(config.refinement.as_ref()));

    let question = question.trim();
    if !question.is_empty() {
        match responder.answer(question) {
            Some(answer) => println!("{}", answer.text),
            None => println!("No good answer found in FAQ. You can try rephrasing the question."),
        }
        return Ok(());
    }

    println!(
        "Loaded FAQ: {} ({} items). Ask a question (type 'exit' to quit).",
        faq.title,
        responder.len()
    );
    let stdin = io::stdin();
    query::prompt_loop(&responder, stdin.lock(), io::stdout())?;
    Ok(())
}

/// Product name and price as recorded on a comparison page.
fn product_context(comparison_page: &Document) -> Option<Product> {
    let compared = &comparison_page.comparison.as_ref()?.product_a;
    Some(product_stub(compared.name.clone(), compared.price))
}

fn product_stub(name: String, price_inr: Option<f64>) -> Product {
    Product {
        name,
        concentration: None,
        skin_type: vec![],
        key_ingredients: vec![],
        benefits: vec![],
        how_to_use: String::new(),
        side_effects: None,
        price_inr,
    }
}
