mod commands;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use formscan_core::config::Settings;
use formscan_core::error::FormscanError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "formscan",
    version,
    about = "Field extraction and accuracy reporting for scanned claim forms (form 283)"
)]
struct Cli {
    /// Project directory holding resources/ and output/
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    /// Render DPI (must match the section layout)
    #[arg(long, global = true)]
    dpi: Option<u32>,

    /// Directory for log files (default: <base-dir>/logs)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the fields of a single form PDF
    Process {
        /// Path to the form PDF
        pdf_file: PathBuf,

        /// Keep the section crops next to the analysis
        #[arg(long)]
        keep_sections: bool,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Extract every form_*.pdf in a directory
    Batch {
        /// Directory of form PDFs (default: output/generated_pdfs)
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Re-process forms that already have an analysis
        #[arg(long)]
        force: bool,

        /// Keep the section crops next to the analysis
        #[arg(long)]
        keep_sections: bool,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Re-run reconciliation from a first-pass checkpoint
    Reconcile {
        /// Form PDF or its <stem>_first_pass.json checkpoint
        input: PathBuf,
    },
    /// Split a form into section images without OCR
    Split {
        /// Path to the form PDF
        pdf_file: PathBuf,

        /// Directory for the section PNGs
        #[arg(long = "out", value_name = "DIR")]
        out: PathBuf,
    },
    /// Compare analyzed forms against ground truth
    Compare {
        /// Ground-truth CSV or XLSX (default: output/master_data.csv)
        #[arg(long, value_name = "FILE")]
        ground_truth: Option<PathBuf>,

        /// Directory of analysis artifacts (default: output/analyzed_forms)
        #[arg(long, value_name = "DIR")]
        analyzed_dir: Option<PathBuf>,

        /// Directory for result sheets (default: output/comparison_results)
        #[arg(long = "out", value_name = "DIR")]
        out: Option<PathBuf>,

        /// Score every ground-truth file, counting unanalyzed ones as unmatched
        #[arg(long)]
        all_files: bool,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Print the field schema with comparison types
    Schema {
        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), FormscanError> {
    let settings = settings(&cli)?;
    let log_dir = cli.log_dir.unwrap_or_else(|| settings.log_dir.clone());
    if let Some(path) = logging::init(&log_dir) {
        tracing::debug!(path = %path.display(), "logging to file");
    }
    dispatch(cli.command, &settings)
}

fn settings(cli: &Cli) -> Result<Settings, FormscanError> {
    let settings = Settings::from_base_dir(&cli.base_dir);
    match cli.dpi {
        Some(dpi) => settings.with_dpi(dpi),
        None => Ok(settings),
    }
}

fn dispatch(command: Commands, settings: &Settings) -> Result<(), FormscanError> {
    match command {
        Commands::Process {
            pdf_file,
            keep_sections,
            output,
        } => commands::process::run(pdf_file, settings, keep_sections, &output),
        Commands::Batch {
            input_dir,
            force,
            keep_sections,
            output,
        } => commands::batch::run(input_dir, settings, force, keep_sections, &output),
        Commands::Reconcile { input } => commands::reconcile::run(input, settings),
        Commands::Split { pdf_file, out } => commands::split::run(pdf_file, out, settings),
        Commands::Compare {
            ground_truth,
            analyzed_dir,
            out,
            all_files,
            output,
        } => commands::compare::run(
            commands::compare::CompareArgs {
                ground_truth,
                analyzed_dir,
                out_dir: out,
                all_files,
            },
            settings,
            &output,
        ),
        Commands::Schema { output } => commands::schema::run(settings, &output),
    }
}
