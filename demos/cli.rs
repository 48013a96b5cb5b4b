//! Command-line interface for scan_lengths
//!
//! Measures colored features in one photo and prints the result as JSON

use scan_lengths::{
    locate_reference_region, AnalysisConfig, AnalysisResult, Analyzer, ClusterCount, ImageSource,
    MeasureMethod, ReferenceRegion,
};
use std::{env, path::{Path, PathBuf}, process};

struct Options {
    image_path: PathBuf,
    roi: Option<ReferenceRegion>,
    length_m: f64,
    config: AnalysisConfig,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let options = parse_args(&args);

    if !options.image_path.exists() {
        eprintln!("Error: File '{}' does not exist", options.image_path.display());
        process::exit(1);
    }

    let image = match ImageSource::File(options.image_path.clone()).load() {
        Ok(image) => image,
        Err(error) => fail(error),
    };

    let roi = match options.roi {
        Some(roi) => roi,
        None => match locate_reference_region(&image) {
            Ok(roi) => roi,
            Err(error) => fail(error),
        },
    };

    let analyzer = Analyzer::new(options.config.clone());
    match analyzer.analyze_image_with_fallback(&image, roi, options.length_m) {
        Ok(result) => print_result(&result, roi, options.config.json_indent),
        Err(error) => fail(error),
    }
}

fn parse_args(args: &[String]) -> Options {
    let mut image_path_arg = None;
    let mut roi = None;
    let mut length_m = scan_lengths::constants::calibration::DEFAULT_REFERENCE_LENGTH_M;
    let mut config_path: Option<PathBuf> = None;
    let mut k = None;
    let mut measure = None;
    let mut indent = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--roi" => roi = Some(parse_value(args, &mut i, "--roi")),
            "--length" => length_m = parse_value(args, &mut i, "--length"),
            "--k" => k = Some(parse_value::<ClusterCount>(args, &mut i, "--k")),
            "--measure" => measure = Some(parse_value::<MeasureMethod>(args, &mut i, "--measure")),
            "--indent" => indent = Some(parse_value::<usize>(args, &mut i, "--indent")),
            "--config" => config_path = Some(PathBuf::from(next_value(args, &mut i, "--config"))),
            "--help" | "-h" => {
                print_help(&args[0]);
                process::exit(0);
            }
            arg if !arg.starts_with("--") => {
                if image_path_arg.is_none() {
                    image_path_arg = Some(PathBuf::from(arg));
                } else {
                    eprintln!("Error: Multiple image paths provided");
                    process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                eprintln!("Use --help for usage information");
                process::exit(1);
            }
        }
        i += 1;
    }

    let image_path = match image_path_arg {
        Some(path) => path,
        None => {
            print_help(&args[0]);
            process::exit(1);
        }
    };

    let mut config = match config_path {
        Some(path) => load_config(&path),
        None => AnalysisConfig::default(),
    };
    if let Some(k) = k {
        config.k = k;
    }
    if let Some(measure) = measure {
        config.measure = measure;
    }
    if let Some(indent) = indent {
        config.json_indent = indent;
    }

    Options {
        image_path,
        roi,
        length_m,
        config,
    }
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(value) => value,
        None => {
            eprintln!("Error: {} requires a value", flag);
            process::exit(1);
        }
    }
}

fn parse_value<T>(args: &[String], i: &mut usize, flag: &str) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = next_value(args, i, flag);
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: invalid value '{}' for {}: {}", raw, flag, e);
            process::exit(1);
        }
    }
}

fn load_config(path: &Path) -> AnalysisConfig {
    match AnalysisConfig::from_json_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn fail(error: scan_lengths::AnalysisError) -> ! {
    eprintln!("Analysis failed: {}", error);
    if error.is_recoverable() {
        eprintln!("Suggestion: {}", error.user_message());
    }
    process::exit(1);
}

fn print_help(program_name: &str) {
    eprintln!("Usage: {} [OPTIONS] <image_path>", program_name);
    eprintln!();
    eprintln!("Measure colored lines in a photo against a black reference line.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --roi X1,Y1,X2,Y2   Reference region (default: locate automatically)");
    eprintln!("  --length METERS     Real length of the reference line (default: 5.0)");
    eprintln!("  --k N|auto          Number of color clusters (default: auto)");
    eprintln!("  --measure METHOD    skeleton or box (default: skeleton)");
    eprintln!("  --indent N          JSON indentation, 0 for compact (default: 2)");
    eprintln!("  --config FILE       Load options from a JSON config file");
    eprintln!("  --help, -h          Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} photo.jpg", program_name);
    eprintln!("  {} --roi 120,900,620,940 --length 2.5 --k 6 photo.jpg", program_name);
    eprintln!("  {} --measure box --indent 0 photo.png", program_name);
}

fn print_result(result: &AnalysisResult, roi: ReferenceRegion, indent: usize) {
    // JSON to stdout for programmatic use
    match result.to_json(indent) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing result: {}", e);
            process::exit(1);
        }
    }

    // Summary to stderr for human reading
    eprintln!();
    eprintln!("Length Analysis Summary:");
    eprintln!("  Reference region: {}", roi);
    eprintln!("  Scale: {:.6} m/px", result.m_per_px);
    if result.fallback_measure.is_some() {
        eprintln!("  Method: {} (fallback, first attempt measured nothing)", result.measure);
    } else {
        eprintln!("  Method: {}", result.measure);
    }
    for cluster in &result.clusters {
        eprintln!(
            "  Cluster {:>2}: {:>9.3} m  {}",
            cluster.cluster_id(),
            cluster.sum_length_m,
            cluster.dominant_hex
        );
    }
    eprintln!("  Total: {:.3} m", result.total_length_m());

    if result.total_length_m() <= 0.0 {
        eprintln!("  Warning: Nothing measured. Check the thresholds or try --measure box.");
    }
}
