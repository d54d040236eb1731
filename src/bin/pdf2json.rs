//! CLI binary for edgequake-extract.
//!
//! A thin shim over the library crate: flags map to `ExtractionConfig`,
//! records live in a directory-backed store under `--data-dir`, and results
//! are printed as JSON.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_extract::edit::{apply_edit, apply_removal, edit_cell, parse_dot_path, revalidate};
use edgequake_extract::export::default_export_filename;
use edgequake_extract::pipeline::input::{expand_inputs, import_document};
use edgequake_extract::pipeline::render::pdf_info;
use edgequake_extract::schema::builder::{parse_schema_to_fields, Field, FieldNode};
use edgequake_extract::{
    export_rows, generate_columns_from_schema, validate, BatchProcessor, BatchProgress,
    BatchProgressCallback, CancelToken, DocumentStatus, ExportOptions, ExtractionConfig,
    ExtractionContext, JsonSchema, PdfiumConverter, Prompt, PromptUpdate, Stores,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the batch, one log line per finished document.
struct CliProgressCallback {
    bar: ProgressBar,
    flagged: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} documents  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        bar.set_prefix("Extracting");
        Arc::new(Self {
            bar,
            flagged: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_document_start(&self, _index: usize, _total: usize, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_document_complete(&self, name: &str, validation_errors: usize) {
        if validation_errors == 0 {
            self.bar.println(format!("  {} {}", green("✓"), name));
        } else {
            self.flagged.fetch_add(1, Ordering::SeqCst);
            self.bar.println(format!(
                "  {} {}  {}",
                yellow("⚠"),
                name,
                dim(&format!("{validation_errors} validation error(s)"))
            ));
        }
        self.bar.inc(1);
    }

    fn on_document_error(&self, name: &str, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {}  {}", red("✗"), name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, progress: &BatchProgress) {
        self.bar.finish_and_clear();
        let mark = if progress.failed == 0 { green("✔") } else { red("✘") };
        eprintln!(
            "{} {}/{} documents completed  ({} failed, {} need review)",
            mark,
            bold(&progress.completed.to_string()),
            progress.total,
            progress.failed,
            self.flagged.load(Ordering::SeqCst),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Import files, a folder, or a URL
  pdf2json import invoices/ https://example.com/receipt.png

  # Create a prompt from a JSON Schema file
  pdf2json prompt create --name Invoices --schema invoice.schema.json

  # Run every pending document through the prompt
  pdf2json process --prompt <PROMPT_ID>

  # Correct a value, then export
  pdf2json edit <DOCUMENT_ID> vendor.name "ACME Corp"
  pdf2json export --format csv -o invoices.csv

  # Check a schema and preview its table columns (no API key needed)
  pdf2json validate-schema invoice.schema.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDF2JSON_DATA_DIR       Where documents, prompts and results are stored
"#;

/// Extract structured JSON from PDFs and images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2json",
    version,
    about = "Extract structured JSON from PDFs and images using Vision LLMs",
    long_about = "Extract structured data from PDF documents and images into JSON that follows \
a user-defined JSON Schema. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding documents, prompts and results.
    #[arg(long, global = true, env = "PDF2JSON_DATA_DIR", default_value = ".pdf2json")]
    data_dir: PathBuf,

    #[command(flatten)]
    llm: LlmArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2JSON_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2JSON_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM model ID (e.g. gpt-4o, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Maximum extraction calls in any 60-second window.
    #[arg(long, global = true, env = "PDF2JSON_RATE_LIMIT", default_value_t = 10)]
    rate_limit: u32,

    /// Max LLM output tokens per document.
    #[arg(long, global = true, env = "PDF2JSON_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "PDF2JSON_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Longest rendered page edge in pixels.
    #[arg(long, global = true, env = "PDF2JSON_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Render at most this many pages per PDF.
    #[arg(long, global = true, env = "PDF2JSON_MAX_PAGES")]
    max_pages: Option<usize>,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "PDF2JSON_PASSWORD")]
    password: Option<String>,

    /// Per-document LLM call timeout in seconds.
    #[arg(long, global = true, env = "PDF2JSON_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "PDF2JSON_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Largest accepted import in MB.
    #[arg(long, global = true, env = "PDF2JSON_MAX_FILE_SIZE", default_value_t = 50)]
    max_file_size: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import PDFs and images (files, directories or URLs) as pending documents.
    Import {
        #[arg(required = true)]
        inputs: Vec<String>,
    },
    /// List documents and their status.
    Documents {
        /// Only show documents with this status (pending, processing, completed, error).
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a document and its result.
    Delete { document_id: String },
    /// Manage extraction prompts.
    #[command(subcommand)]
    Prompt(PromptCommand),
    /// Extract every pending, selected document with a prompt.
    Process {
        /// Active prompt id.
        #[arg(long, env = "PDF2JSON_PROMPT")]
        prompt: Option<String>,
        /// Put failed documents back in the queue first.
        #[arg(long)]
        retry_failed: bool,
    },
    /// Print extracted results as JSON.
    Results {
        /// A single document; all results when omitted.
        document_id: Option<String>,
        /// Show the raw model output instead of the edited data.
        #[arg(long)]
        raw: bool,
    },
    /// Change one value of a result. The raw model output is kept.
    Edit {
        document_id: String,
        /// Dot-path such as `vendor.name` or `line_items.0.qty`.
        path: String,
        /// New value as text; numbers and booleans keep their type.
        value: Option<String>,
        /// Treat VALUE as a JSON literal.
        #[arg(long)]
        json: bool,
        /// Remove the value at PATH instead.
        #[arg(long, conflicts_with = "value")]
        remove: bool,
        /// Re-check the edited data against this prompt's schema.
        #[arg(long)]
        revalidate: Option<String>,
    },
    /// Export completed results as CSV or JSON rows.
    Export {
        /// Output file; defaults to a timestamped name in the current directory.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Ignore user edits.
        #[arg(long)]
        raw: bool,
        /// Leave out document name and dates.
        #[arg(long)]
        no_document_info: bool,
    },
    /// Check a JSON Schema file and show the columns it produces.
    ValidateSchema {
        schema: PathBuf,
        /// Also validate this JSON data file against the schema.
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Print PDF metadata (no API key needed).
    Inspect { input: PathBuf },
}

#[derive(Subcommand, Debug)]
enum PromptCommand {
    /// Create a prompt from a schema file.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        schema: PathBuf,
        /// Text file with extraction instructions; a generic prompt otherwise.
        #[arg(long)]
        system_prompt: Option<PathBuf>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update name, instructions or schema of a prompt.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        schema: Option<PathBuf>,
        #[arg(long)]
        system_prompt: Option<PathBuf>,
    },
    /// List prompts, optionally filtered by name.
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Show a prompt with its field tree.
    Show { id: String },
    /// Show the table columns derived from a prompt's schema.
    Columns { id: String },
    /// Delete a prompt.
    Delete { id: String },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ExportFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during `process`.
    let show_progress = !cli.quiet && !cli.no_progress && matches!(cli.command, Command::Process { .. });
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let stores = Stores::open_dir(&cli.data_dir);

    match cli.command {
        Command::Import { ref inputs } => {
            let config = build_config(&cli.llm, None)?;
            for input in expand_inputs(inputs) {
                match import_document(&input, &config).await {
                    Ok(doc) => {
                        stores.documents.put(&doc).await.context("Failed to store document")?;
                        println!("{}  {}", doc.id, doc.name);
                    }
                    Err(e) => eprintln!("{} {}: {}", red("✗"), input, e),
                }
            }
        }

        Command::Documents { ref status } => {
            let docs = match status {
                Some(s) => stores.documents.get_all_by_index("status", s).await?,
                None => stores.documents.get_all().await?,
            };
            for doc in docs {
                let status = match doc.status {
                    DocumentStatus::Completed => green(doc.status.as_str()),
                    DocumentStatus::Error => red(doc.status.as_str()),
                    _ => doc.status.as_str().to_string(),
                };
                println!("{}  {:<10}  {}", doc.id, status, doc.name);
                if let Some(ref err) = doc.error {
                    println!("    {}", dim(err));
                }
            }
        }

        Command::Delete { ref document_id } => {
            stores.document(document_id).await?;
            stores.delete_document(document_id).await?;
            eprintln!("{} deleted {}", green("✔"), document_id);
        }

        Command::Prompt(ref cmd) => run_prompt_command(cmd, &stores).await?,

        Command::Process {
            ref prompt,
            retry_failed,
        } => {
            let progress_cb: Option<Arc<dyn BatchProgressCallback>> = if show_progress {
                Some(CliProgressCallback::new())
            } else {
                None
            };
            let config = build_config(&cli.llm, progress_cb)?;
            let converter = Arc::new(PdfiumConverter::new(&config));
            let context = ExtractionContext::init(config).context("Failed to initialise LLM provider")?;
            let batch = BatchProcessor::new(context, stores.clone(), converter);

            if retry_failed {
                let moved = requeue_failed(&stores).await?;
                if moved > 0 {
                    eprintln!("{} {} failed document(s) back in the queue", dim("↻"), moved);
                }
            }

            let cancel = CancelToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("{} stopping after the current document…", yellow("⚠"));
                    on_ctrl_c.cancel();
                }
            });

            let summary = batch
                .process_pending(prompt.as_deref(), &cancel)
                .await
                .context("Batch processing failed")?;
            if !cli.quiet && !show_progress {
                eprintln!(
                    "{} completed, {} failed of {}",
                    summary.completed, summary.failed, summary.total
                );
            }
        }

        Command::Results {
            ref document_id,
            raw,
        } => {
            let results = match document_id {
                Some(id) => vec![stores.result(id).await?],
                None => stores.results.get_all().await?,
            };
            let view: Vec<serde_json::Value> = results
                .iter()
                .map(|r| {
                    let data = if raw { &r.data } else { r.effective_data() };
                    serde_json::json!({
                        "documentId": r.document_id,
                        "edited": r.is_edited(),
                        "data": data,
                        "validationErrors": r.validation_errors,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&view).context("Failed to serialise results")?);
        }

        Command::Edit {
            ref document_id,
            ref path,
            ref value,
            json,
            remove,
            revalidate: ref revalidate_with,
        } => {
            let result = stores.result(document_id).await?;
            let segments = parse_dot_path(path);
            let mut updated = if remove {
                apply_removal(&result, &segments)?
            } else {
                let Some(text) = value else {
                    bail!("a VALUE is required unless --remove is given");
                };
                if json {
                    let literal: serde_json::Value =
                        serde_json::from_str(text).context("VALUE is not valid JSON")?;
                    apply_edit(&result, &segments, literal)?
                } else {
                    edit_cell(&result, path, text)?
                }
            };
            if let Some(prompt_id) = revalidate_with {
                let prompt = stores.prompt(prompt_id).await?;
                updated = revalidate(&updated, &prompt.json_schema);
            }
            stores.results.put(&updated).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(updated.effective_data()).context("Failed to serialise result")?
            );
        }

        Command::Export {
            ref output,
            format,
            raw,
            no_document_info,
        } => {
            let documents = stores.documents.get_all().await?;
            let results = stores.results.get_all().await?;
            let table = export_rows(
                &documents,
                &results,
                ExportOptions {
                    include_document_info: !no_document_info,
                    use_edited_data: !raw,
                },
            )?;
            let (text, ext) = match format {
                ExportFormat::Csv => (table.to_csv(), "csv"),
                ExportFormat::Json => (
                    serde_json::to_string_pretty(&table.rows).context("Failed to serialise export")?,
                    "json",
                ),
            };
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_export_filename(chrono::Utc::now(), ext)));
            write_atomic(&path, text.as_bytes()).await?;
            if !cli.quiet {
                eprintln!(
                    "{} {} row(s)  →  {}",
                    green("✔"),
                    table.rows.len(),
                    bold(&path.display().to_string())
                );
            }
        }

        Command::ValidateSchema { ref schema, ref data } => {
            let schema = read_schema(schema).await?;
            println!("{} schema is valid", green("✔"));
            for col in generate_columns_from_schema(&schema) {
                println!("  {:<32} {:<8} {}", col.key, format!("{:?}", col.column_type), col.label);
            }
            if let Some(data_path) = data {
                let text = tokio::fs::read_to_string(data_path)
                    .await
                    .with_context(|| format!("Failed to read {}", data_path.display()))?;
                let value: serde_json::Value = serde_json::from_str(&text).context("Data is not valid JSON")?;
                let report = validate(&value, &schema);
                if report.valid {
                    println!("{} data matches the schema", green("✔"));
                } else {
                    for err in &report.errors {
                        let at = if err.instance_path.is_empty() { "/" } else { &err.instance_path };
                        println!("  {} {}  {}", red("✗"), at, err.message);
                    }
                    bail!("{} validation error(s)", report.errors.len());
                }
            }
        }

        Command::Inspect { ref input } => {
            let bytes = tokio::fs::read(input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let info = pdf_info(bytes, cli.llm.password.clone())
                .await
                .context("Failed to inspect PDF")?;
            println!("File:    {}", input.display());
            if let Some(ref t) = info.title {
                println!("Title:   {}", t);
            }
            if let Some(ref a) = info.author {
                println!("Author:  {}", a);
            }
            println!("Pages:   {}", info.num_pages);
        }
    }

    Ok(())
}

async fn run_prompt_command(cmd: &PromptCommand, stores: &Stores) -> Result<()> {
    match cmd {
        PromptCommand::Create {
            name,
            schema,
            system_prompt,
            description,
        } => {
            let schema = read_schema(schema).await?;
            let instructions = match system_prompt {
                Some(p) => read_text(p).await?,
                None => edgequake_extract::prompts::DEFAULT_SYSTEM_PROMPT.to_string(),
            };
            let prompt = Prompt::new(name.clone(), description.clone(), instructions, schema);
            stores.prompts.put(&prompt).await?;
            println!("{}  {}", prompt.id, prompt.name);
        }

        PromptCommand::Update {
            id,
            name,
            schema,
            system_prompt,
        } => {
            let mut prompt = stores.prompt(id).await?;
            let json_schema = match schema {
                Some(p) => Some(read_schema(p).await?),
                None => None,
            };
            let system_prompt = match system_prompt {
                Some(p) => Some(read_text(p).await?),
                None => None,
            };
            prompt.update(PromptUpdate {
                name: name.clone(),
                system_prompt,
                json_schema,
                ..Default::default()
            });
            stores.prompts.put(&prompt).await?;
            println!("{}  {}", prompt.id, prompt.name);
        }

        PromptCommand::List { search } => {
            let prompts = match search {
                Some(q) => stores.search_prompts(q).await?,
                None => stores.prompts.get_all().await?,
            };
            for p in prompts {
                println!(
                    "{}  {:<24}  {}",
                    p.id,
                    p.name,
                    dim(&format!("{} column(s)", p.ui_config.columns.len()))
                );
            }
        }

        PromptCommand::Show { id } => {
            let prompt = stores.prompt(id).await?;
            println!("{}", bold(&prompt.name));
            if let Some(ref d) = prompt.description {
                println!("{}", dim(d));
            }
            println!("\n{}\n", prompt.system_prompt);
            print_fields(&parse_schema_to_fields(&prompt.json_schema), 0);
        }

        PromptCommand::Columns { id } => {
            let prompt = stores.prompt(id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&prompt.ui_config).context("Failed to serialise columns")?
            );
        }

        PromptCommand::Delete { id } => {
            stores.prompt(id).await?;
            stores.prompts.delete(id).await?;
            eprintln!("{} deleted {}", green("✔"), id);
        }
    }
    Ok(())
}

fn print_fields(fields: &[Field], depth: usize) {
    for field in fields {
        let required = if field.required { "*" } else { "" };
        println!(
            "{}{}{} {}",
            "  ".repeat(depth),
            field.name,
            required,
            dim(field.property.kind.as_str())
        );
        match &field.node {
            FieldNode::Object { children } => print_fields(children, depth + 1),
            FieldNode::Array { item_fields } => print_fields(item_fields, depth + 1),
            FieldNode::Leaf => {}
        }
    }
}

fn build_config(
    args: &LlmArgs,
    progress_callback: Option<Arc<dyn BatchProgressCallback>>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .requests_per_minute(args.rate_limit)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_rendered_pixels(args.max_pixels)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout)
        .max_file_size_mb(args.max_file_size);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(n) = args.max_pages {
        builder = builder.max_pages(n);
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress_callback {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn read_schema(path: &Path) -> Result<JsonSchema> {
    let text = read_text(path).await?;
    JsonSchema::from_json_str(&text).with_context(|| format!("Invalid schema in {}", path.display()))
}

/// `--retry-failed`: move every failed document back to pending with its
/// error cleared. Cached page images are kept.
async fn requeue_failed(stores: &Stores) -> Result<usize> {
    let failed = stores
        .documents
        .get_all_by_index("status", DocumentStatus::Error.as_str())
        .await?;
    for mut doc in failed.iter().cloned() {
        doc.status = DocumentStatus::Pending;
        doc.error = None;
        stores.documents.put(&doc).await?;
    }
    Ok(failed.len())
}

/// Write to a temp file, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
