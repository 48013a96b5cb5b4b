//! Generate a default analysis configuration file
//!
//! Creates a JSON config with all default parameters, ready for editing

use scan_lengths::AnalysisConfig;
use std::{env, path::Path, process};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <output_config.json>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} configs/default.json", args[0]);
        process::exit(1);
    }

    let output_path = Path::new(&args[1]);

    // Create parent directory if needed
    if let Some(parent) = output_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("Error creating directory: {}", e);
            process::exit(1);
        }
    }

    let config = AnalysisConfig::default();

    match config.to_json_file(output_path) {
        Ok(_) => {
            eprintln!("Configuration saved to {}", output_path.display());
            eprintln!();
            eprintln!("Config summary:");
            eprintln!("  Clusters: {}", config.k);
            eprintln!("  Color mask: S > {}, V > {}", config.s_thr, config.v_thr);
            eprintln!("  Hue peak separation: {} buckets", config.min_dist);
            eprintln!("  Measurement: {}, min area {:.0} px", config.measure, config.min_area);
            match config.rng_seed {
                Some(seed) => eprintln!("  Clustering seed: {}", seed),
                None => eprintln!("  Clustering seed: unseeded"),
            }
        }
        Err(e) => {
            eprintln!("Error saving config: {}", e);
            process::exit(1);
        }
    }
}
