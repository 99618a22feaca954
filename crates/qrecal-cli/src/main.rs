//! CLI for qrecal: inspect recalibration reports and recalibrate reads.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "qrecal")]
#[command(about = "qrecal: base quality score recalibration from empirical error tables")]
#[command(version = qrecal_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a recalibration report: covariates, table sizes, quantization map
    Inspect {
        /// Recalibration report (JSON, optionally .gz)
        #[arg(long)]
        report: String,

        /// Quantization levels: 0 disables, positive re-buckets, omit for the report's own
        #[arg(long, allow_negative_numbers = true)]
        quantize: Option<i32>,
    },

    /// Recalibrate JSON-lines reads and write them back out in input order
    Apply {
        /// Recalibration report (JSON, optionally .gz)
        #[arg(long)]
        report: String,

        /// Input reads, one JSON object per line
        #[arg(long)]
        input: String,

        /// Output path (default: stdout)
        #[arg(long)]
        output: Option<String>,

        /// Quantization levels: 0 disables, positive re-buckets, omit for the report's own
        #[arg(long, allow_negative_numbers = true)]
        quantize: Option<i32>,

        /// Worker threads (default: available parallelism)
        #[arg(long)]
        threads: Option<usize>,

        /// Reads handed to the workers per batch
        #[arg(long, default_value = "10000")]
        batch_size: usize,

        /// JSON settings file (max_read_length, min_usable_quality, ...)
        #[arg(long)]
        config: Option<String>,

        /// Override the maximum read length
        #[arg(long)]
        max_read_length: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { report, quantize } => commands::inspect::run(&report, quantize),
        Commands::Apply {
            report,
            input,
            output,
            quantize,
            threads,
            batch_size,
            config,
            max_read_length,
        } => commands::apply::run(commands::apply::ApplyCommandConfig {
            report_path: &report,
            input_path: &input,
            output_path: output.as_deref(),
            quantize,
            threads,
            batch_size,
            config_path: config.as_deref(),
            max_read_length,
        }),
    }
}
