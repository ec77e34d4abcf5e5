//! CLI for running Stroop sessions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use stroop_task::results::{BatchResults, SessionSummary, save_session, timestamped_path};
use stroop_task::session::{Mode, SessionRunner};
use stroop_task::settings::ExperimentConfig;

#[derive(Parser)]
#[command(name = "stroop-task")]
#[command(version)]
#[command(about = "Stroop color-naming task with simulated participants")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single session
    Run {
        /// Session mode: qa or sim
        #[arg(long, default_value = "sim")]
        mode: String,

        /// Config file (default depends on mode)
        #[arg(long, env = "STROOP_CONFIG")]
        config: Option<PathBuf>,

        /// Responder seed (overrides the config)
        #[arg(long)]
        seed: Option<u64>,

        /// Output directory (overrides the config)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pace the session with the wall clock
        #[arg(long)]
        realtime: bool,
    },

    /// Run many simulated sessions with consecutive seeds
    Batch {
        /// Number of sessions
        #[arg(long, default_value = "20")]
        sessions: usize,

        /// Config file
        #[arg(long, env = "STROOP_CONFIG", default_value = "config/config_scripted_sim.toml")]
        config: PathBuf,

        /// Seed of the first session
        #[arg(long, default_value = "1")]
        first_seed: u64,

        /// Output file for aggregated results
        #[arg(long, default_value = "outputs/batch.json")]
        output: PathBuf,
    },

    /// Load and validate a config file
    Check {
        /// Config file
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    match cli.command {
        Commands::Run {
            mode,
            config,
            seed,
            output,
            realtime,
        } => {
            let mode: Mode = mode.parse()?;
            let config_path = config.unwrap_or_else(|| PathBuf::from(mode.default_config()));
            info!(mode = %mode, config = %config_path.display(), "Loading config");

            let config = ExperimentConfig::load(&config_path)?;
            let output_dir = output.unwrap_or_else(|| config.output.dir.clone());
            let runner = SessionRunner::new(config)?;
            let result = runner.run(mode, seed, realtime)?;
            let files = save_session(&output_dir, runner.config(), &result)?;
            let summary = SessionSummary::from_result(&result);

            println!("\n=== Session Complete ===");
            println!("Trials:   {}", files.trials_csv.display());
            println!("Settings: {}", files.settings_json.display());
            println!("Summary:  {}", files.summary_json.display());
            println!("\nAccuracy: {:.1}%", summary.accuracy * 100.0);
            println!("Miss rate: {:.1}%", summary.miss_rate * 100.0);
            for block in &summary.blocks {
                println!("  {}: accuracy={:.1}%", block.block_id, block.accuracy * 100.0);
            }
            match summary.stroop_effect_s {
                Some(effect) => println!("Stroop effect: {:.0} ms", effect * 1000.0),
                None => println!("Stroop effect: n/a (no correct trials in one condition)"),
            }
        }

        Commands::Batch {
            sessions,
            config,
            first_seed,
            output,
        } => {
            let runner = SessionRunner::new(ExperimentConfig::load(&config)?)?;
            let mut results = BatchResults::new();

            for i in 0..sessions {
                let seed = first_seed + i as u64;
                info!(session = i + 1, total = sessions, seed = seed, "Running session");
                let result = runner.run(Mode::Sim, Some(seed), false)?;
                results.add(SessionSummary::from_result(&result));
            }
            results.compute_summary();

            let output_path = timestamped_path(&output);
            results.save(&output_path)?;

            println!("\n=== Batch Complete ===");
            println!("Results saved to: {}", output_path.display());
            if let Some(summary) = &results.summary {
                println!("\nSummary ({} sessions):", summary.sessions);
                println!(
                    "  accuracy={:.1}% (SE {:.1}%), miss_rate={:.1}%",
                    summary.mean_accuracy * 100.0,
                    summary.accuracy_se * 100.0,
                    summary.mean_miss_rate * 100.0
                );
                if let (Some(effect), Some((lo, hi))) = (summary.mean_stroop_effect_s, summary.stroop_effect_ci) {
                    println!(
                        "  stroop_effect={:.0} ms (95% CI {:.0}..{:.0} ms)",
                        effect * 1000.0,
                        lo * 1000.0,
                        hi * 1000.0
                    );
                }
            }
        }

        Commands::Check { config } => {
            let loaded = ExperimentConfig::load(&config)?;
            let task = &loaded.task;
            println!("{} is valid", config.display());
            println!(
                "  task={} blocks={} trials_per_block={} conditions={}",
                task.task_name,
                task.total_blocks,
                task.trials_per_block,
                task.conditions.join(",")
            );
            println!(
                "  keys: red={} green={} continue={}",
                task.red_key,
                task.green_key,
                task.continue_keys.join(",")
            );
            println!(
                "  stimuli={} triggers={} responder={}",
                loaded.stimuli.len(),
                task.triggers.len(),
                loaded.sim.responder.kind()
            );
        }
    }

    Ok(())
}
