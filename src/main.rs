use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use infinigen2co3d::{process_dataset, Args};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = args.to_convert_config();
    info!("Starting the conversion process...");

    match process_dataset(&config) {
        Ok(summary) => {
            summary.print_summary();
            info!("Conversion process completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to process dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
