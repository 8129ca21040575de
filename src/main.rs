use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use snmp_poller::config::load_targets;
use snmp_poller::discovery::{self, TrafficOptions};
use snmp_poller::export::{ExportFormat, FileSink};
use snmp_poller::render::{ConsoleFormat, ConsoleSink};
use snmp_poller::secret::SecretString;
use snmp_poller::session::{
    AuthProtocol, PrivProtocol, SessionConfig, UsmCredentials, DEFAULT_PORT, DEFAULT_RETRIES,
};
use snmp_poller::{version, Error, Record, Session, Sink};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_logger() {
    // Use LOG_LEVEL env var (fall back to RUST_LOG)
    let filter = env::var("LOG_LEVEL")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[derive(Parser)]
#[command(name = "snmp-poller")]
#[command(about = "Discover interfaces, neighbors and traffic rates over SNMP", long_about = None)]
#[command(version = version::current_version())]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Device address (hostname, IPv4 or IPv6)
    #[arg(long, env = "SNMP_HOST", global = true)]
    host: Option<String>,

    /// Device UDP port
    #[arg(long, env = "SNMP_PORT", global = true, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// SNMPv2c community string
    #[arg(long, env = "SNMP_COMMUNITY", global = true, hide_env_values = true)]
    community: Option<String>,

    /// SNMPv3 user name (selects v3 authPriv)
    #[arg(long, env = "SNMP_USER", global = true)]
    user: Option<String>,

    /// SNMPv3 authentication passphrase
    #[arg(long, env = "SNMP_AUTH_PASS", global = true, hide_env_values = true)]
    auth_pass: Option<String>,

    /// SNMPv3 privacy passphrase
    #[arg(long, env = "SNMP_PRIV_PASS", global = true, hide_env_values = true)]
    priv_pass: Option<String>,

    /// SNMPv3 authentication protocol (MD5, SHA, SHA-224, SHA-256, SHA-384, SHA-512)
    #[arg(long, env = "SNMP_AUTH_PROTOCOL", global = true, default_value = "SHA")]
    auth_protocol: AuthProtocol,

    /// SNMPv3 privacy protocol (DES, AES, AES-192, AES-256)
    #[arg(long, env = "SNMP_PRIV_PROTOCOL", global = true, default_value = "DES")]
    priv_protocol: PrivProtocol,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "SNMP_TIMEOUT_MS", global = true, default_value_t = 2000)]
    timeout_ms: u64,

    /// Extra attempts after a timeout
    #[arg(long, env = "SNMP_RETRIES", global = true, default_value_t = DEFAULT_RETRIES)]
    retries: u32,

    /// JSON file listing several targets to poll concurrently
    #[arg(long, env = "SNMP_TARGETS", global = true)]
    targets: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Write records to this file instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum Command {
    /// Interface inventory (ifTable)
    Interfaces,
    /// IP neighbors from the ARP table
    Neighbors,
    /// sysName, sysDescr and sysUpTime
    System,
    /// Interface traffic rates
    Traffic {
        /// Seconds between the two samples of each iteration
        #[arg(long, default_value_t = 5)]
        interval: u64,

        #[arg(long, default_value_t = 1)]
        iterations: u32,

        /// Use 64-bit ifHCInOctets/ifHCOutOctets counters
        #[arg(long)]
        hc: bool,
    },
}

impl Command {
    fn title(&self) -> &'static str {
        match self {
            Command::Interfaces => "Interfaces",
            Command::Neighbors => "IP neighbors",
            Command::System => "System",
            Command::Traffic { .. } => "Interface traffic",
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// Where records end up
enum Output {
    Console(ConsoleFormat),
    File(FileSink),
}

impl Output {
    fn from_args(args: &Args) -> anyhow::Result<Self> {
        let Some(path) = &args.output else {
            let format = match args.format {
                OutputFormat::Table => ConsoleFormat::Table,
                OutputFormat::Json => ConsoleFormat::Json,
                OutputFormat::Csv => ConsoleFormat::Csv,
            };
            return Ok(Output::Console(format));
        };

        let format = match args.format {
            OutputFormat::Json => ExportFormat::Json,
            OutputFormat::Csv => ExportFormat::Csv,
            OutputFormat::Table => ExportFormat::from_path(path).with_context(|| {
                format!(
                    "Cannot tell export format for {}; pass --format json or --format csv",
                    path.display()
                )
            })?,
        };
        Ok(Output::File(FileSink::new(path.clone(), format)))
    }

    fn emit(&mut self, title: String, records: &[Record]) {
        match self {
            Output::Console(format) => {
                ConsoleSink::new(std::io::stdout(), *format)
                    .with_title(title)
                    .emit(records);
            }
            Output::File(sink) => sink.emit(records),
        }
    }
}

/// Forwards each batch from a polling task to the output loop
struct ChannelSink {
    target: String,
    tx: mpsc::UnboundedSender<Batch>,
}

impl Sink for ChannelSink {
    fn emit(&mut self, records: &[Record]) {
        if self
            .tx
            .send((self.target.clone(), records.to_vec()))
            .is_err()
        {
            tracing::warn!("Output closed, dropping {} records", records.len());
        }
    }
}

/// Session settings from `--targets`, or from the single-device flags.
fn session_configs(args: &Args) -> anyhow::Result<Vec<SessionConfig>> {
    if let Some(path) = &args.targets {
        let targets = load_targets(path)?;
        if targets.is_empty() {
            bail!("{} lists no targets", path.display());
        }
        return targets
            .iter()
            .map(|target| target.to_session_config().map_err(anyhow::Error::from))
            .collect();
    }

    let host = args
        .host
        .clone()
        .context("No target: pass --host (or SNMP_HOST) or --targets")?;

    let config = match &args.user {
        Some(user) => {
            let auth = args
                .auth_pass
                .as_deref()
                .context("SNMPv3 needs --auth-pass (or SNMP_AUTH_PASS)")?;
            let privacy = args
                .priv_pass
                .as_deref()
                .context("SNMPv3 needs --priv-pass (or SNMP_PRIV_PASS)")?;
            SessionConfig::user_auth_priv(
                host,
                UsmCredentials {
                    username: user.clone(),
                    auth_passphrase: SecretString::new(auth),
                    priv_passphrase: SecretString::new(privacy),
                    auth_protocol: args.auth_protocol,
                    priv_protocol: args.priv_protocol,
                },
            )
        }
        None => {
            let community = args
                .community
                .as_deref()
                .context("SNMPv2c needs --community (or SNMP_COMMUNITY), or set --user for v3")?;
            SessionConfig::community(host, SecretString::new(community))
        }
    };

    Ok(vec![config
        .with_port(args.port)
        .with_timeout(Duration::from_millis(args.timeout_ms))
        .with_retries(args.retries)])
}

/// Run one workflow against one device.
async fn poll_target(
    config: SessionConfig,
    command: Command,
    cancel: CancellationToken,
    mut sink: ChannelSink,
) -> anyhow::Result<()> {
    let target = config.address();
    let session = Session::open(config)
        .await
        .with_context(|| format!("Failed to open session to {}", target))?;

    match command {
        Command::Interfaces => sink.emit(&discovery::interfaces(&session).await),
        Command::Neighbors => sink.emit(&discovery::neighbors(&session).await),
        Command::System => sink.emit(&[discovery::system_info(&session).await]),
        Command::Traffic {
            interval,
            iterations,
            hc,
        } => {
            let options = TrafficOptions {
                interval: Duration::from_secs(interval),
                iterations,
                high_capacity: hc,
            };
            discovery::monitor_traffic(&session, &options, &cancel, &mut sink).await?;
        }
    }

    Ok(())
}

type Batch = (String, Vec<Record>);
type PollOutcome = (String, anyhow::Result<()>);

/// Hand batches to `emit` until every task has dropped its sender. Once
/// `cancel` fires the remaining tasks are aborted, so workflows that do not
/// watch the token stop too.
async fn forward_batches(
    rx: &mut mpsc::UnboundedReceiver<Batch>,
    tasks: &mut JoinSet<PollOutcome>,
    cancel: &CancellationToken,
    mut emit: impl FnMut(String, Vec<Record>),
) {
    let mut aborted = false;
    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Some((target, records)) => emit(target, records),
                None => break,
            },
            _ = cancel.cancelled(), if !aborted => {
                tracing::info!("Stopping {} polling tasks", tasks.len());
                tasks.abort_all();
                aborted = true;
            }
        }
    }
}

/// Cancel on SIGINT or SIGTERM.
async fn cancel_on_shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!("Failed to register signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to register Ctrl+C handler: {}", e);
            return;
        }
        tracing::info!("Received Ctrl+C");
    }

    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();
    version::log_startup();

    let configs = session_configs(&args)?;
    let mut output = Output::from_args(&args)?;
    let tag_target = configs.len() > 1;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut tasks = JoinSet::new();
    for config in configs {
        let target = config.address();
        let sink = ChannelSink {
            target: target.clone(),
            tx: tx.clone(),
        };
        tasks.spawn({
            let cancel = cancel.clone();
            let command = args.command;
            async move { (target, poll_target(config, command, cancel, sink).await) }
        });
    }
    drop(tx);

    forward_batches(&mut rx, &mut tasks, &cancel, |target, mut records| {
        if tag_target {
            for record in &mut records {
                record.set("target", target.as_str());
            }
        }
        output.emit(format!("{} on {}", args.command.title(), target), &records);
    })
    .await;

    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((target, Err(e))) => match e.downcast_ref::<Error>() {
                Some(Error::Cancelled) => tracing::info!("Polling {} cancelled", target),
                _ => {
                    tracing::error!("Polling {} failed: {:#}", target, e);
                    failed += 1;
                }
            },
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                tracing::error!("Polling task panicked: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} target(s) failed", failed);
    }
    Ok(())
}
