//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use stundenplan_core::{JsonLinesSink, ProgressReporter, RunConfig, RunResult};
use stundenplan_shared::{
    AppConfig, CrawlConfig, Credentials, MarkupPayload, NodeKind, init_config, load_config,
    resolve_password,
};
use tracing::{info, warn};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Stundenplan: crawl timetables out of myStundenplan.
#[derive(Parser)]
#[command(
    name = "stundenplan",
    version,
    about = "Log in to myStundenplan and export every reachable timetable document as JSON lines.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Log in and crawl the tenant.
    Crawl(CrawlArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options of `stundenplan crawl`. Unset options fall back to the config file.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct CrawlArgs {
    /// Tenant (`FH`) to log in to, e.g. `fhin`.
    #[arg(long)]
    pub tenant: Option<String>,

    /// Account name.
    #[arg(short, long)]
    pub username: Option<String>,

    /// Account password.
    #[arg(long, env = "STUNDENPLAN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Login form URL.
    #[arg(long)]
    pub login_url: Option<String>,

    /// Crawl every listed semester instead of only the current one.
    #[arg(long)]
    pub all_semesters: bool,

    /// Emit markup documents as raw text instead of extracted fields.
    #[arg(long)]
    pub raw_markup: bool,

    /// JSON-lines output file (`-` for stdout).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Maximum concurrent requests.
    #[arg(long)]
    pub concurrency: Option<u32>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Crates whose spans and events are shown.
const LOG_TARGETS: [&str; 6] = [
    "stundenplan",
    "stundenplan_core",
    "stundenplan_crawler",
    "stundenplan_session",
    "stundenplan_extract",
    "stundenplan_shared",
];

/// Initialize tracing based on CLI flags. Logs go to stderr so records can
/// be piped from stdout.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let directives = LOG_TARGETS
        .map(|target| format!("{target}={level}"))
        .join(",");

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Crawl(args) => cmd_crawl(args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// crawl
// ---------------------------------------------------------------------------

async fn cmd_crawl(args: CrawlArgs) -> Result<()> {
    let config = load_config()?;
    let run_config = resolve_run_config(&args, &config)?;
    let out = args
        .out
        .clone()
        .or_else(|| config.defaults.output.as_ref().map(PathBuf::from));

    info!(
        tenant = %run_config.credentials.tenant,
        username = %run_config.credentials.username,
        all_semesters = run_config.crawl.all_semesters,
        "crawling"
    );

    let mut sink = JsonLinesSink::open(out.as_ref())?;
    let reporter = CliProgress::new();
    let result = match stundenplan_core::run_crawl(&run_config, &mut sink, &reporter).await {
        Ok(result) => {
            sink.finish()?;
            result
        }
        Err(e) => {
            sink.discard();
            return Err(e.into());
        }
    };

    for failure in &result.summary.failures {
        warn!(node = %failure.node, error = %failure.error, "node failed");
    }

    eprintln!();
    eprintln!("  Crawl finished.");
    eprintln!("  Run:      {}", result.run_id);
    eprintln!("  Started:  {}", result.started_at.to_rfc3339());
    eprintln!("  Tenant:   {} ({})", result.tenant, result.user_id);
    eprintln!("  Nodes:    {}", result.summary.nodes_visited);
    eprintln!("  Records:  {}", result.summary.records_emitted);
    eprintln!("  Failures: {}", result.summary.failures.len());
    eprintln!(
        "  Time:     {:.1}s",
        result.summary.duration.as_secs_f64()
    );
    if let Some(path) = out.filter(|p| p.as_os_str() != "-") {
        eprintln!("  Output:   {}", path.display());
    }
    eprintln!();

    Ok(())
}

/// Merge flags over the config file.
fn resolve_run_config(args: &CrawlArgs, config: &AppConfig) -> Result<RunConfig> {
    let tenant = args
        .tenant
        .clone()
        .or_else(|| config.defaults.tenant.clone())
        .ok_or_else(|| eyre!("no tenant given: pass --tenant or set defaults.tenant"))?;
    let username = args
        .username
        .clone()
        .or_else(|| config.defaults.username.clone())
        .ok_or_else(|| eyre!("no username given: pass --username or set defaults.username"))?;
    let password = match &args.password {
        Some(p) if !p.is_empty() => p.clone(),
        _ => resolve_password(config)?,
    };

    let login_url = args
        .login_url
        .as_deref()
        .unwrap_or(&config.defaults.login_url);
    let login_url =
        Url::parse(login_url).map_err(|e| eyre!("invalid login URL '{login_url}': {e}"))?;

    let mut crawl = CrawlConfig::from(config);
    if args.all_semesters {
        crawl.all_semesters = true;
    }
    if args.raw_markup {
        crawl.markup_payload = MarkupPayload::Raw;
    }
    if let Some(n) = args.concurrency {
        crawl.concurrency = n;
    }

    Ok(RunConfig {
        login_url,
        credentials: Credentials {
            tenant,
            username,
            password,
        },
        crawl,
    })
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_emitted(&self, kind: NodeKind, id: &str, count: usize) {
        self.spinner
            .set_message(format!("Crawling [{count} records] {kind}: {id}"));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.defaults.tenant = Some("fhin".into());
        config.defaults.username = Some("alice".into());
        config
    }

    #[test]
    fn parses_crawl_flags() {
        let cli = Cli::try_parse_from([
            "stundenplan",
            "-v",
            "crawl",
            "--tenant",
            "fhin",
            "--all-semesters",
            "--out",
            "records.jsonl",
            "--concurrency",
            "8",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };
        assert_eq!(args.tenant.as_deref(), Some("fhin"));
        assert!(args.all_semesters);
        assert_eq!(args.concurrency, Some(8));
    }

    #[test]
    fn flags_override_config() {
        let args = CrawlArgs {
            tenant: Some("thi".into()),
            password: Some("secret".into()),
            all_semesters: true,
            raw_markup: true,
            concurrency: Some(2),
            ..CrawlArgs::default()
        };
        let run = resolve_run_config(&args, &config()).unwrap();
        assert_eq!(run.credentials.tenant, "thi");
        assert_eq!(run.credentials.username, "alice");
        assert_eq!(run.credentials.password, "secret");
        assert!(run.crawl.all_semesters);
        assert_eq!(run.crawl.markup_payload, MarkupPayload::Raw);
        assert_eq!(run.crawl.concurrency, 2);
        assert_eq!(run.login_url.as_str(), "https://www3.primuss.de/stpl/login.php");
    }

    #[test]
    fn missing_tenant_is_reported() {
        let args = CrawlArgs {
            password: Some("secret".into()),
            ..CrawlArgs::default()
        };
        let err = resolve_run_config(&args, &AppConfig::default()).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    #[test]
    fn invalid_login_url_is_reported() {
        let args = CrawlArgs {
            password: Some("secret".into()),
            login_url: Some("not a url".into()),
            ..CrawlArgs::default()
        };
        assert!(resolve_run_config(&args, &config()).is_err());
    }
}
