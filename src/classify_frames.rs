use clap::Parser;
use log::info;

use infinigen2co3d::{classify_frames, ClassifyArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ClassifyArgs::parse();

    info!("Sorting frames into camera directories...");
    let report = classify_frames(&args.roots);
    report.print_summary();
}
