use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vp_agent::AgentConfig;
use vp_agent::offline::Submission;
use vp_core::Valet;
use vp_core::reconciliation::reconcile;
use vp_core::types::{ReconciliationResult, ReportKind, ShiftReport, SquareDailySummary};
use vp_db::store::DbStore;
use vp_events::bus::EventBus;

const EVENT_BUS_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "vp", about = "Valet operations: help requests, reports and alerts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST server with the push fan-out and removal sweeper.
    Serve {
        #[arg(long, env = "VP_DB_PATH", default_value = ".valet/valet.db")]
        db_path: String,
        #[arg(long, env = "VP_BIND", default_value = "127.0.0.1")]
        bind: IpAddr,
        #[arg(long, env = "VP_PORT", default_value_t = 4820)]
        port: u16,
        #[arg(long, env = "VP_PUSH_TTL_SECS", default_value_t = 60)]
        push_ttl_secs: u64,
    },
    /// Run the device agent for one location.
    Agent {
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Submit a report, queueing it locally when the server is unreachable.
    Submit {
        #[arg(value_enum)]
        kind: KindArg,
        /// JSON file holding the report body.
        file: PathBuf,
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Print the OpenAPI document.
    Openapi,
    /// Repair double-encoded report payloads and dead-letter the rest.
    Repair {
        #[arg(long, env = "VP_DB_PATH", default_value = ".valet/valet.db")]
        db_path: String,
    },
    /// Compare a Square daily summary with a shift report.
    Reconcile { square: PathBuf, shift: PathBuf },
}

#[derive(clap::Args)]
struct AgentArgs {
    #[arg(long, env = "VP_SERVER_URL", default_value = "http://127.0.0.1:4820")]
    server_url: String,
    #[arg(long, env = "VP_LOCATION")]
    location: String,
    #[arg(long, env = "VP_DATA_DIR", default_value = ".valet/agent")]
    data_dir: PathBuf,
    #[arg(long, env = "VP_SOUND_COMMAND")]
    sound_command: Option<String>,
    #[arg(long, env = "VP_NOTIFY_COMMAND")]
    notify_command: Option<String>,
    #[arg(long, env = "VP_PUSH_LISTEN")]
    push_listen: Option<SocketAddr>,
    #[arg(long, env = "VP_PUSH_ENDPOINT")]
    push_endpoint: Option<String>,
}

impl AgentArgs {
    fn into_config(self) -> AgentConfig {
        let mut config = AgentConfig::new(self.server_url, self.location);
        config.data_dir = self.data_dir;
        config.sound_command = self.sound_command;
        config.notify_command = self.notify_command;
        config.push_listen = self.push_listen;
        config.push_endpoint = self.push_endpoint;
        config
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Shift,
    Incident,
    Tax,
}

impl From<KindArg> for ReportKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Shift => ReportKind::ShiftReport,
            KindArg::Incident => ReportKind::IncidentReport,
            KindArg::Tax => ReportKind::TaxPayment,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Serve {
            db_path,
            bind,
            port,
            push_ttl_secs,
        } => serve(db_path, SocketAddr::new(bind, port), push_ttl_secs).await,
        Command::Agent { agent } => vp_agent::run(agent.into_config())
            .await
            .map_err(|err| err.to_string()),
        Command::Submit { kind, file, agent } => submit(kind.into(), &file, agent).await,
        Command::Openapi => {
            println!("{}", vp_serve::openapi::generate_spec());
            Ok(())
        }
        Command::Repair { db_path } => repair(&db_path),
        Command::Reconcile { square, shift } => reconcile_files(&square, &shift),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{} {message}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn serve(db_path: String, addr: SocketAddr, push_ttl_secs: u64) -> Result<(), String> {
    vp_serve::openapi::ensure_initialized();
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    if let Err(err) = cleanup_idempotency(&db_path) {
        tracing::warn!(error = %err, "idempotency cleanup failed");
    }
    let state = vp_serve::AppState::new(
        db_path,
        EventBus::new(EVENT_BUS_CAPACITY),
        Duration::from_secs(push_ttl_secs),
    );
    let sender = vp_serve::push::HttpPushSender::new().map_err(|err| err.to_string())?;
    let fan_out = vp_serve::push::spawn(state.clone(), sender);
    let sweep_state = state.clone();
    let sweeper = tokio::spawn(async move { vp_serve::removal::run(sweep_state).await });
    let result = vp_serve::serve(state, addr)
        .await
        .map_err(|err| err.to_string());
    fan_out.abort();
    sweeper.abort();
    result
}

fn cleanup_idempotency(path: &str) -> Result<usize, String> {
    let conn = vp_db::schema::open_and_migrate(path).map_err(|err| err.to_string())?;
    let store = vp_db::idempotency::IdempotencyStore::new(&conn);
    store.cleanup(chrono::Utc::now())
}

async fn submit(kind: ReportKind, file: &Path, agent: AgentArgs) -> Result<(), String> {
    let payload: serde_json::Value = read_json(file)?;
    let config = agent.into_config();
    match vp_agent::submit_report(&config, kind, payload)
        .await
        .map_err(|err| err.to_string())?
    {
        Submission::Sent(report) => println!("{} {kind} stored as {}", "sent".green(), report.id),
        Submission::Queued(id) => println!(
            "{} server unreachable, {kind} queued as {id}",
            "queued".yellow()
        ),
    }
    Ok(())
}

fn repair(db_path: &str) -> Result<(), String> {
    let conn = vp_db::schema::open_and_migrate(db_path).map_err(|err| err.to_string())?;
    let valet = Valet::new(DbStore::new(conn), EventBus::new(EVENT_BUS_CAPACITY));
    let summary = valet.reports().repair().map_err(|err| err.to_string())?;
    println!(
        "scanned {}  unchanged {}  repaired {}  dead-lettered {}",
        summary.scanned,
        summary.unchanged,
        summary.repaired.green(),
        summary.dead_lettered.red()
    );
    Ok(())
}

fn reconcile_files(square: &Path, shift: &Path) -> Result<(), String> {
    let square: SquareDailySummary = read_json(square)?;
    let shift: ShiftReport = read_json(shift)?;
    print_reconciliation(&reconcile(&square, &shift));
    Ok(())
}

fn print_reconciliation(result: &ReconciliationResult) {
    if result.matches {
        println!("{}", "Square totals match the shift report".green().bold());
        return;
    }
    println!("{}", "Square totals do not match".red().bold());
    for discrepancy in &result.discrepancies {
        println!("  {} {}", "-".red(), discrepancy.message);
    }
    println!(
        "  transactions {:+}  sales {:+.2}  tips {:+.2}",
        result.differences.transactions, result.differences.sales, result.differences.tips
    );
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("{}: {err}", path.display()))?;
    serde_json::from_str(&raw).map_err(|err| format!("{}: {err}", path.display()))
}
