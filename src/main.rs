// src/main.rs
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use inclusion_import::{
    config::Config,
    entity::{Beneficiary, ImportEntity, Visit},
    import::ImportSession,
    notify::{LogNotifier, Notifier},
    remote::{
        DateRange, HttpImportApi, ImportApi, LookupKind, PmsImportRequest, PollOutcome,
        RemoteImporter,
    },
    store::LocalStore,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "inclusion-import")]
#[command(about = "Bulk-import beneficiaries and visits from CSV, and drive PMS imports")]
struct Cli {
    /// YAML config file (default: ./inclusion-import.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import beneficiaries from CSV files
    Beneficiaries(FileArgs),
    /// Import CIC visits from CSV files
    Visits(FileArgs),
    /// Start a PMS import and follow it to the end
    PmsImport(PmsArgs),
    /// Ask the server to cancel a PMS import job
    PmsCancel { job_id: String },
    /// List districts, interventions or implementing-partners
    Lookups { kind: LookupKind },
}

#[derive(Args)]
struct FileArgs {
    /// CSV files or glob patterns
    #[arg(required = true)]
    files: Vec<String>,

    /// Parse and preview only; nothing is stored
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct PmsArgs {
    #[arg(long)]
    page_size: Option<u32>,
    #[arg(long)]
    district_id: Option<i64>,
    #[arg(long)]
    intervention_id: Option<i64>,
    #[arg(long)]
    implementing_partner_id: Option<i64>,
    #[arg(long)]
    updated_after: Option<NaiveDate>,
    #[arg(long)]
    created_after: Option<NaiveDate>,
    #[arg(long)]
    updated_from: Option<NaiveDate>,
    #[arg(long)]
    updated_to: Option<NaiveDate>,
    #[arg(long)]
    created_from: Option<NaiveDate>,
    #[arg(long)]
    created_to: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let default_level = if cli.verbose { "debug" } else { "info" };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    // ─── 2) load config ──────────────────────────────────────────────
    let cfg = Config::load(cli.config.as_deref())?;

    // ─── 3) dispatch ─────────────────────────────────────────────────
    match cli.command {
        Command::Beneficiaries(args) => import_files::<Beneficiary>(&cfg, &args).await,
        Command::Visits(args) => import_files::<Visit>(&cfg, &args).await,
        Command::PmsImport(args) => pms_import(&cfg, &args).await,
        Command::PmsCancel { job_id } => {
            let api = http_api(&cfg)?;
            api.cancel(&job_id).await?;
            info!(job = %job_id, "cancel requested");
            Ok(())
        }
        Command::Lookups { kind } => {
            let api = http_api(&cfg)?;
            for entry in api.lookups(kind).await? {
                println!("{}\t{}", entry.id, entry.name);
            }
            Ok(())
        }
    }
}

fn http_api(cfg: &Config) -> Result<HttpImportApi> {
    HttpImportApi::new(
        &cfg.api_base_url,
        cfg.api_token.clone(),
        cfg.request_timeout(),
    )
}

/// Expand glob patterns; plain paths pass through untouched.
fn expand_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            files.push(PathBuf::from(pattern));
            continue;
        }
        let before = files.len();
        for entry in glob::glob(pattern).with_context(|| format!("bad glob {}", pattern))? {
            files.push(entry?);
        }
        if files.len() == before {
            warn!(%pattern, "glob matched no files");
        }
    }
    if files.is_empty() {
        bail!("no input files");
    }
    Ok(files)
}

async fn import_files<E: ImportEntity>(cfg: &Config, args: &FileArgs) -> Result<()> {
    let files = expand_files(&args.files)?;
    let store = if args.dry_run {
        LocalStore::in_memory()
    } else {
        LocalStore::open(&cfg.store_path)?
    };
    let notifier = LogNotifier;
    let label = E::schema().label;

    let mut session = ImportSession::<E>::new();
    let mut rejected = 0usize;
    for path in &files {
        let rows = match session.select_file(path).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(file = %path.display(), "{}", e);
                rejected += 1;
                continue;
            }
        };

        if args.dry_run {
            print_preview(&session, path, rows);
            session.reset();
        } else {
            session.import(&store, &notifier)?;
        }
    }

    if !args.dry_run {
        store.save()?;
        info!(
            total = store.count::<E>(),
            path = %cfg.store_path.display(),
            "{} saved",
            label
        );
    }
    if rejected > 0 {
        bail!("{} of {} files rejected", rejected, files.len());
    }
    Ok(())
}

fn print_preview<E: ImportEntity>(session: &ImportSession<E>, path: &Path, rows: usize) {
    let schema = E::schema();
    let columns: Vec<&str> = schema
        .required
        .iter()
        .chain(schema.optional)
        .copied()
        .collect();

    println!("{}: {} {}", path.display(), rows, schema.label);
    println!("  {}", columns.join(" | "));
    for row in session.preview() {
        let cells: Vec<&str> = columns.iter().map(|c| row.get(c)).collect();
        println!("  {}", cells.join(" | "));
    }
    if rows > session.preview().len() {
        println!("  … {} more", rows - session.preview().len());
    }
}

fn pms_request(cfg: &Config, args: &PmsArgs) -> Result<PmsImportRequest> {
    let mut req = PmsImportRequest::new(args.page_size.unwrap_or(cfg.page_size));
    req.district_id = args.district_id;
    req.intervention_id = args.intervention_id;
    req.implementing_partner_id = args.implementing_partner_id;
    req.updated_after = args.updated_after;
    req.created_after = args.created_after;
    req.updated_between = DateRange::from_parts("updated range", args.updated_from, args.updated_to)?;
    req.created_between = DateRange::from_parts("created range", args.created_from, args.created_to)?;
    Ok(req)
}

enum Finish {
    Outcome(PollOutcome),
    Abandoned,
}

async fn pms_import(cfg: &Config, args: &PmsArgs) -> Result<()> {
    let req = pms_request(cfg, args)?;
    let api: Arc<dyn ImportApi> = Arc::new(http_api(cfg)?);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let mut importer = RemoteImporter::new(api, notifier, cfg.poll_interval());

    let job_id = importer.submit(&req).await?;
    println!("job {}", job_id);

    // first ctrl-c asks for a cancel, the second stops watching
    let mut cancel_sent = false;
    let finish = loop {
        tokio::select! {
            outcome = importer.wait() => break Finish::Outcome(outcome),
            res = signal::ctrl_c() => {
                res.context("listening for ctrl-c")?;
                if cancel_sent {
                    break Finish::Abandoned;
                }
                cancel_sent = true;
                warn!(job = %job_id, "interrupt: requesting cancel, ctrl-c again to stop waiting");
                let _ = importer.cancel(&job_id);
            }
        }
    };

    match finish {
        Finish::Abandoned => {
            importer.stop();
            warn!(job = %job_id, "stopped waiting; the job may still be running");
            Ok(())
        }
        Finish::Outcome(PollOutcome::Completed(job)) => {
            println!(
                "completed: {} created, {} updated, {} errors",
                job.created_records.unwrap_or(0),
                job.updated_records.unwrap_or(0),
                job.error_count.unwrap_or(0)
            );
            Ok(())
        }
        Finish::Outcome(PollOutcome::Canceled(_)) => {
            println!("canceled");
            Ok(())
        }
        Finish::Outcome(PollOutcome::Failed(job)) => bail!(
            "import job {} failed: {}",
            job_id,
            job.error_message.as_deref().unwrap_or("unknown error")
        ),
        Finish::Outcome(PollOutcome::PollError(msg)) => bail!("lost track of job {}: {}", job_id, msg),
        Finish::Outcome(PollOutcome::Stopped) => bail!("polling of job {} stopped", job_id),
    }
}
