use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use jay_ocr_core::{
    build_prompt, create_inference_client, create_pdf_backend, progress_channel, OcrMode,
    PromptOptions, Settings, SizingOptions,
};
use jay_ocr_server::jobs::{dispatcher, store::TaskStore};
use jay_ocr_storage::LocalStorage;
use std::path::PathBuf;
use std::sync::Arc;

/// Grounded PDF/image OCR — run a single PDF through the pipeline, or serve
/// the HTTP API backed by the durable task store.
#[derive(Parser)]
#[command(name = "jay-ocr", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single PDF through the pipeline and write markdown/JSON/zip output.
    Process(ProcessArgs),
    /// Start the HTTP API and task dispatcher.
    Serve(ServeArgs),
}

#[derive(Parser)]
struct ProcessArgs {
    /// Path to the PDF file to process
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for result.md / raw.json / result.zip
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// OCR mode
    #[arg(
        short,
        long,
        default_value = "markdown",
        value_parser = [
            "plain_ocr", "markdown", "tables_csv", "tables_md", "kv_json", "figure_chart",
            "find_ref", "layout_map", "pii_redact", "multilingual", "describe", "freeform",
        ],
    )]
    mode: String,

    /// Force grounding markup on even for modes that don't require it
    #[arg(long)]
    grounding: bool,

    /// Reference term for find_ref mode
    #[arg(long)]
    find_term: Option<String>,

    /// JSON schema for kv_json mode
    #[arg(long)]
    schema: Option<String>,

    /// Free-form instruction for freeform mode
    #[arg(long)]
    prompt: Option<String>,

    /// Rendering DPI (zoom = dpi / 72)
    #[arg(long)]
    dpi: Option<f32>,

    /// Max pages processed concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Base tile size passed to the model
    #[arg(long)]
    base_size: Option<u32>,

    /// Crop tile size passed to the model
    #[arg(long)]
    image_size: Option<u32>,

    /// Disable dynamic crop mode
    #[arg(long)]
    no_crop: bool,
}

#[derive(Parser)]
struct ServeArgs {
    /// Bind address, overrides API_HOST/API_PORT
    #[arg(long)]
    bind: Option<String>,

    /// Storage root for uploads/outputs/sqlite, overrides STORAGE_DIR
    #[arg(long)]
    storage_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => run_process(args).await,
        Commands::Serve(args) => run_serve(args).await,
    }
}

fn parse_mode(s: &str) -> OcrMode {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .expect("clap value_parser already restricted this to a known mode")
}

async fn run_process(args: ProcessArgs) -> Result<()> {
    let settings = Settings::from_env();
    let mode = parse_mode(&args.mode);

    let opts = PromptOptions {
        grounding: Some(args.grounding),
        include_caption: false,
        find_term: args.find_term,
        schema: args.schema,
        prompt: args.prompt,
    };
    let prompt = build_prompt(mode, &opts);

    let sizing = SizingOptions {
        base_size: args.base_size.unwrap_or(settings.base_size),
        image_size: args.image_size.unwrap_or(settings.image_size),
        crop_mode: !args.no_crop && settings.crop_mode,
        test_compress: false,
    };
    let dpi = args.dpi.unwrap_or(settings.pdf_render_dpi);
    let concurrency = args.concurrency.unwrap_or(settings.pdf_max_concurrency);

    tokio::fs::create_dir_all(&args.output)
        .await
        .context("creating output directory")?;

    let client = create_inference_client(&settings);
    let backend = create_pdf_backend(&settings, client);

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} pages ({msg})")
            .unwrap()
            .progress_chars("█▉▊▋▌▍▎▏ "),
    );

    let (progress_tx, mut progress_rx) = progress_channel();
    let bar_for_progress = bar.clone();
    let progress_task = tokio::spawn(async move {
        while let Some(snapshot) = progress_rx.recv().await {
            if snapshot.total > 0 {
                bar_for_progress.set_length(snapshot.total as u64);
            }
            bar_for_progress.set_position(snapshot.current as u64);
            bar_for_progress.set_message(snapshot.message);
        }
    });

    let result = backend
        .process(&args.input, &args.output, prompt, sizing, dpi, concurrency, progress_tx)
        .await;
    let _ = progress_task.await;

    let result = result?;
    bar.finish_with_message(format!("{} pages", result.total_pages));

    println!();
    println!("Markdown: {}", args.output.join(&result.markdown_file).display());
    println!("Raw JSON: {}", args.output.join(&result.raw_json_file).display());
    println!("Archive:  {}", args.output.join(&result.archive_file).display());

    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut settings = Settings::from_env();
    if let Some(storage_dir) = args.storage_dir {
        settings.storage_dir = storage_dir;
    }
    let bind = args.bind.unwrap_or_else(|| format!("{}:{}", settings.api_host, settings.api_port));

    tokio::fs::create_dir_all(&settings.storage_dir)
        .await
        .context("creating storage directory")?;
    let db_path = settings.storage_dir.join("ocr.db");
    let store = TaskStore::open(&db_path).context("opening task store")?;

    let client = create_inference_client(&settings);
    let backend = create_pdf_backend(&settings, client.clone());

    let (task_sender, task_receiver) = tokio::sync::mpsc::unbounded_channel();
    let settings = Arc::new(settings);

    let storage: Arc<dyn jay_ocr_storage::StorageBackend> = Arc::new(LocalStorage::new(
        settings.storage_dir.clone(),
        format!("http://{}:{}", settings.api_host, settings.api_port),
    ));

    let state = jay_ocr_server::AppState::new(
        store.clone(),
        task_sender,
        backend.clone(),
        client,
        settings.clone(),
        storage,
    );
    let app = jay_ocr_server::create_app(state);

    tokio::spawn(dispatcher::run(
        task_receiver,
        store,
        backend,
        settings.storage_dir.clone(),
        settings.pdf_prompt.clone(),
        SizingOptions::from_settings(&settings),
        settings.pdf_render_dpi,
        settings.pdf_max_concurrency,
    ));

    let listener = tokio::net::TcpListener::bind(&bind).await.context("binding listener")?;
    println!();
    println!("jay-ocr serving on http://{bind}");
    println!("storage: {}", settings.storage_dir.display());
    println!();

    axum::serve(listener, app).await?;
    Ok(())
}
