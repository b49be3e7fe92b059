use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rck")]
#[command(about = "Reserved capacity checker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile running inventory against reservations and report gauges
    Check(CheckArgs),

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<String>,

    /// Root of saved describe-* responses (<dir>/<region>/<category>/)
    #[arg(long)]
    snapshot_dir: Option<String>,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    statsd_host: Option<String>,

    #[arg(long)]
    statsd_port: Option<u16>,

    /// Leading metric path segment (e.g. "aws")
    #[arg(long)]
    metric_prefix: Option<String>,

    #[arg(long)]
    check_ec2: Option<bool>,

    #[arg(long)]
    check_rds: Option<bool>,

    #[arg(long)]
    check_elasticache: Option<bool>,

    /// key_order | largest_deficit_first
    #[arg(long)]
    allocation_policy: Option<String>,

    /// Reconcile and print gauges without sending them
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Print the per-placement text report
    #[arg(long, default_value_t = false)]
    report: bool,
}

impl From<CheckArgs> for commands::check::CheckFlags {
    fn from(a: CheckArgs) -> Self {
        Self {
            config_paths: a.config_paths,
            snapshot_dir: a.snapshot_dir,
            region: a.region,
            statsd_host: a.statsd_host,
            statsd_port: a.statsd_port,
            metric_prefix: a.metric_prefix,
            check_ec2: a.check_ec2,
            check_rds: a.check_rds,
            check_elasticache: a.check_elasticache,
            allocation_policy: a.allocation_policy,
            dry_run: a.dry_run,
            report: a.report,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Dev convenience: pick up RUST_LOG and friends from .env.local if present.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Check(args) => {
            commands::check::run_check(args.into()).await?;
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = rck_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries only `key=value` output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
