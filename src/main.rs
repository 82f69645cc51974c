use chrono::Utc;
use clap::{Parser, Subcommand};
use gamesales::config::JobConfig;
use gamesales::pipeline::JobRunner;
use gamesales::report::ReportFormat;
use gamesales::schedule::DailySchedule;
use std::path::PathBuf;
use tracing::{debug, error, info, trace, warn};

/// Yearly video-game sales digest
#[derive(Parser)]
#[command(name = "gamesales")]
#[command(about = "Report the best sellers of one year of video-game sales", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the data once and print the report (default command)
    Run {
        /// Dataset location (http(s) URL, file:// URL or path)
        #[arg(long)]
        source: Option<String>,

        /// Report on this year instead of the configured one
        #[arg(long)]
        year: Option<i32>,

        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
    /// Run on the configured daily trigger until interrupted
    Schedule,
    /// Print the target year
    Year,
    /// Print the task execution stages
    Plan,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match JobConfig::load(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let log_level = match cli.verbose {
        0 => config.job.log_level.as_deref().unwrap_or("info"),
        1 => "debug",
        2 => "trace",
        _ => "trace,hyper=debug,reqwest=debug", // -vvv shows everything including dependencies
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .init();

    debug!("gamesales started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Some(Commands::Run {
            source,
            year,
            format,
        }) => run_once(config, source, year, format).await,
        Some(Commands::Schedule) => run_schedule(config).await,
        Some(Commands::Year) => {
            println!("{}", config.target_year());
            Ok(())
        }
        Some(Commands::Plan) => print_plan(&config),
        None => run_once(config, None, None, ReportFormat::Text).await,
    };

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_once(
    mut config: JobConfig,
    source: Option<String>,
    year: Option<i32>,
    format: ReportFormat,
) -> anyhow::Result<()> {
    if let Some(source) = source {
        config.job.source_url = source;
    }
    if let Some(year) = year {
        config.job.year = Some(year);
    }

    let runner = JobRunner::from_config(&config)?.with_format(format);
    let mut out = std::io::stdout();
    runner.run_until(&mut out, shutdown_signal()).await?;
    Ok(())
}

async fn run_schedule(config: JobConfig) -> anyhow::Result<()> {
    let schedule = DailySchedule::from_settings(&config.schedule)?;
    let runner = JobRunner::from_config(&config)?;

    info!(
        "Scheduling {} daily at {} UTC from {} for year {} ({} run retries)",
        config.job.owner,
        schedule.at(),
        schedule.start_date(),
        runner.year(),
        config.retry.run.retries()
    );

    loop {
        let now = Utc::now();
        info!("Next run at {}", schedule.next_fire_after(now));

        tokio::select! {
            _ = tokio::time::sleep(schedule.wait_from(now)) => {}
            _ = shutdown_signal() => {
                info!("Scheduler stopped");
                return Ok(());
            }
        }

        let mut out = std::io::stdout();
        let outcome = tokio::select! {
            outcome = runner.run_with_retry(&config.retry.run, &mut out) => outcome,
            _ = shutdown_signal() => {
                info!("Scheduler stopped during a run");
                return Ok(());
            }
        };

        match outcome {
            Ok(summary) => info!(
                "Scheduled run for {} done: {} rows, {} failed rules",
                summary.year, summary.rows, summary.failed_rules
            ),
            Err(e) => error!("Scheduled run failed: {}", e),
        }
    }
}

fn print_plan(config: &JobConfig) -> anyhow::Result<()> {
    let runner = JobRunner::from_config(config)?;
    for (index, stage) in runner.graph().stages()?.iter().enumerate() {
        let names: Vec<String> = stage.iter().map(ToString::to_string).collect();
        println!("stage {}: {}", index, names.join(", "));
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
