use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use textvar_engine::{
    load_mode_or_default, EngineConfig, MemoryHost, PreferenceStore, TextVarEngine,
    DEFAULT_COLLECTION_NAME,
};
use textvar_protocol::{
    request_schema_json, serialize_json, NamingMode, ProgressUpdate, Request,
};

mod config;
mod prefs;
mod report;

pub use prefs::{default_prefs_path, FilePreferenceStore};

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

/// JSON on stdout when `json`, otherwise the rendered text.
fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        print_stdout(&serialize_json(value)?)
    } else {
        print_stdout(text().trim_end())
    }
}

#[derive(Parser)]
#[command(name = "textvar")]
#[command(about = "Turn static design text into reusable string variables", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,

    /// Engine config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preferences file (default: <config dir>/textvar/preferences.json)
    #[arg(long, global = true)]
    prefs: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview eligible text layers grouped by content
    Scan(ScanArgs),

    /// Create or reuse variables and bind every eligible text layer
    Process(ProcessArgs),

    /// Find, clear or reveal bindings to variables that no longer resolve
    #[command(subcommand)]
    Ghosts(GhostCommands),

    /// Show or change the naming mode
    #[command(subcommand)]
    Mode(ModeCommands),

    /// List or create variable collections
    #[command(subcommand)]
    Collections(CollectionCommands),

    /// Execute a JSON request against a document
    Command(CommandArgs),

    /// Print the JSON schema of requests accepted by `command`
    Schema,
}

impl Commands {
    fn json_output(&self) -> bool {
        match self {
            Commands::Scan(args) => args.json,
            Commands::Process(args) => args.json,
            Commands::Ghosts(GhostCommands::Scan { json, .. })
            | Commands::Ghosts(GhostCommands::Clear { json, .. }) => *json,
            Commands::Ghosts(GhostCommands::Reveal { .. }) => false,
            Commands::Mode(ModeCommands::Get { json }) => *json,
            Commands::Mode(ModeCommands::Set { .. }) => false,
            Commands::Collections(CollectionCommands::List { json, .. })
            | Commands::Collections(CollectionCommands::Create { json, .. }) => *json,
            Commands::Command(_) | Commands::Schema => true,
        }
    }
}

#[derive(Args)]
struct ScanArgs {
    /// Document snapshot (JSON)
    document: PathBuf,

    /// Restrict to these node ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<String>,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ProcessArgs {
    /// Document snapshot (JSON)
    document: PathBuf,

    /// Restrict to these node ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    nodes: Vec<String>,

    /// Target collection id; a new collection is created when omitted
    #[arg(long)]
    collection: Option<String>,

    /// Base name for the new collection
    #[arg(long, default_value = DEFAULT_COLLECTION_NAME, conflicts_with = "collection")]
    collection_name: String,

    /// Write the updated document back to disk
    #[arg(long)]
    write: bool,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum GhostCommands {
    /// List bindings whose variable no longer resolves
    Scan {
        document: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Remove dangling bindings from the given nodes
    Clear {
        document: PathBuf,
        #[arg(long, value_delimiter = ',', required = true)]
        nodes: Vec<String>,
        #[arg(long)]
        write: bool,
        #[arg(long)]
        json: bool,
    },
    /// Select a node in the host
    Reveal { document: PathBuf, node_id: String },
}

#[derive(Subcommand)]
enum ModeCommands {
    Get {
        #[arg(long)]
        json: bool,
    },
    /// simple | hierarchical
    Set { mode: NamingMode },
}

#[derive(Subcommand)]
enum CollectionCommands {
    List {
        document: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Create a collection; a numeric suffix is added if the name is taken
    Create {
        document: PathBuf,
        #[arg(default_value = DEFAULT_COLLECTION_NAME)]
        name: String,
        #[arg(long)]
        write: bool,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct CommandArgs {
    /// Document snapshot (JSON)
    document: PathBuf,

    /// Inline JSON request (mutually exclusive with --file)
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,

    /// Path to file containing the JSON request
    #[arg(long)]
    file: Option<PathBuf>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,

    /// Write the document back unless the request failed
    #[arg(long)]
    write: bool,

    /// Emit progress updates as JSON lines on stderr
    #[arg(long)]
    progress: bool,
}

struct AppContext {
    config: EngineConfig,
    prefs: Arc<FilePreferenceStore>,
}

/// A loaded document and an engine bound to it.
struct Session {
    path: PathBuf,
    host: Arc<MemoryHost>,
    engine: TextVarEngine,
}

impl Session {
    fn open(path: &Path, ctx: &AppContext) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read document {}", path.display()))?;
        let host = Arc::new(
            MemoryHost::from_json_str(&raw)
                .with_context(|| format!("Invalid document {}", path.display()))?,
        );
        let engine = TextVarEngine::new(
            host.clone(),
            host.clone(),
            ctx.prefs.clone(),
            ctx.config.clone(),
        )?;
        Ok(Self {
            path: path.to_path_buf(),
            host,
            engine,
        })
    }

    fn finish(&self, write: bool) -> Result<()> {
        if !write {
            return Ok(());
        }
        let body = self.host.to_json_pretty()?;
        fs::write(&self.path, body)
            .with_context(|| format!("Failed to write document {}", self.path.display()))?;
        log::info!("Wrote {}", self.path.display());
        Ok(())
    }
}

fn node_filter(nodes: &[String]) -> Option<&[String]> {
    (!nodes.is_empty()).then_some(nodes)
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing
    if cli.command.json_output() {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = config::load_engine_config(cli.config.as_deref())?;
    let prefs_path = cli.prefs.clone().unwrap_or_else(default_prefs_path);
    let ctx = AppContext {
        config,
        prefs: Arc::new(FilePreferenceStore::new(prefs_path)),
    };

    match cli.command {
        Commands::Scan(args) => run_scan(args, &ctx).await?,
        Commands::Process(args) => run_process(args, &ctx).await?,
        Commands::Ghosts(cmd) => run_ghosts(cmd, &ctx).await?,
        Commands::Mode(cmd) => run_mode(cmd, &ctx).await?,
        Commands::Collections(cmd) => run_collections(cmd, &ctx).await?,
        Commands::Command(args) => run_command(args, &ctx).await?,
        Commands::Schema => print_stdout(&request_schema_json()?)?,
    }

    Ok(())
}

async fn run_scan(args: ScanArgs, ctx: &AppContext) -> Result<()> {
    let session = Session::open(&args.document, ctx)?;
    let scan = session
        .engine
        .scan_and_group(node_filter(&args.nodes))
        .await?;
    emit(args.json, &scan.to_response(), || report::render_scan(&scan))
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template("[{bar:32}] {pos:>3}% {msg}")
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

async fn run_process(args: ProcessArgs, ctx: &AppContext) -> Result<()> {
    let session = Session::open(&args.document, ctx)?;
    let collection_id = match args.collection {
        Some(id) => id,
        None => {
            let created = session
                .engine
                .create_collection(&args.collection_name)
                .await?;
            log::info!("Using new collection {} ({})", created.name, created.id);
            created.id
        }
    };

    let bar = progress_bar(args.json);
    let sink = |update: ProgressUpdate| {
        bar.set_position(u64::from(update.percent));
        bar.set_message(format!("{}/{} groups", update.processed, update.total));
    };

    let run = session
        .engine
        .process_batch(&collection_id, node_filter(&args.nodes), &sink);
    tokio::pin!(run);
    let stats = loop {
        tokio::select! {
            result = &mut run => break result,
            _ = tokio::signal::ctrl_c() => {
                log::warn!("Interrupt received; stopping at the next chunk boundary");
                session.engine.request_cancel();
            }
        }
    };
    bar.finish_and_clear();
    let stats = stats?;

    session.finish(args.write)?;
    emit(args.json, &stats, || report::render_stats(&stats))
}

async fn run_ghosts(cmd: GhostCommands, ctx: &AppContext) -> Result<()> {
    match cmd {
        GhostCommands::Scan { document, json } => {
            let session = Session::open(&document, ctx)?;
            let ghosts = session.engine.scan_ghosts().await?;
            emit(json, &ghosts, || report::render_ghosts(&ghosts))
        }
        GhostCommands::Clear {
            document,
            nodes,
            write,
            json,
        } => {
            let session = Session::open(&document, ctx)?;
            let result = session.engine.clear_ghosts(&nodes).await;
            session.finish(write)?;
            emit(json, &result, || report::render_clear(&result))
        }
        GhostCommands::Reveal { document, node_id } => {
            let session = Session::open(&document, ctx)?;
            session.engine.reveal_node(&node_id).await?;
            print_stdout(&format!("Revealed {node_id}"))
        }
    }
}

async fn run_mode(cmd: ModeCommands, ctx: &AppContext) -> Result<()> {
    match cmd {
        ModeCommands::Get { json } => {
            let mode = load_mode_or_default(ctx.prefs.as_ref()).await;
            emit(json, &serde_json::json!({ "mode": mode }), || {
                mode.to_string()
            })
        }
        ModeCommands::Set { mode } => {
            ctx.prefs.save_naming_mode(mode).await.with_context(|| {
                format!("Failed to save preferences to {}", ctx.prefs.path().display())
            })?;
            print_stdout(&format!("Naming mode set to {mode}"))
        }
    }
}

async fn run_collections(cmd: CollectionCommands, ctx: &AppContext) -> Result<()> {
    match cmd {
        CollectionCommands::List { document, json } => {
            let session = Session::open(&document, ctx)?;
            let collections = session.engine.list_collections().await?;
            emit(json, &collections, || {
                report::render_collections(&collections)
            })
        }
        CollectionCommands::Create {
            document,
            name,
            write,
            json,
        } => {
            let session = Session::open(&document, ctx)?;
            let collection = session.engine.create_collection(&name).await?;
            session.finish(write)?;
            emit(json, &collection, || {
                format!("Created {} ({})", collection.name, collection.id)
            })
        }
    }
}

async fn run_command(args: CommandArgs, ctx: &AppContext) -> Result<()> {
    let raw = read_payload(&args)?;
    let request: Request =
        serde_json::from_str(&raw).context("Invalid JSON passed to --json/--file")?;
    let session = Session::open(&args.document, ctx)?;

    let show_progress = args.progress;
    let sink = move |update: ProgressUpdate| {
        if !show_progress {
            return;
        }
        match serde_json::to_string(&update) {
            Ok(line) => eprintln!("{line}"),
            Err(err) => log::debug!("Dropping progress update: {err}"),
        }
    };
    let response = session.engine.handle(request, &sink).await;

    if !response.is_error() {
        session.finish(args.write)?;
    }
    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serialize_json(&response)?
    };
    print_stdout(&output)?;

    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_payload(args: &CommandArgs) -> Result<String> {
    if let Some(raw) = &args.json {
        return Ok(raw.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read JSON from stdin")?;

    if buffer.trim().is_empty() {
        anyhow::bail!("Request is empty. Provide --json, --file, or pipe JSON via stdin.");
    }

    Ok(buffer)
}
