//! Cluster a batch of failed test results from the command line.
//!
//! Reads a JSON array of failure records from a file or stdin, runs the
//! clustering engine, and prints the cluster summary as pretty JSON.
//!
//! Usage:
//!   cluster-failures --input failures.json
//!   some-exporter | cluster-failures

use std::io::Read;
use std::process;

use test_insights::models::FailureRecord;
use test_insights::services::clustering;

fn print_usage() {
    println!("Usage: cluster-failures [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -i, --input <FILE>  JSON array of failure records (default: stdin)");
    println!("  -h, --help          Show this help message");
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let mut input: Option<String> = None;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                i += 1;
                match args.get(i) {
                    Some(path) => input = Some(path.clone()),
                    None => {
                        eprintln!("Error: {} requires a file path", args[i - 1]);
                        process::exit(1);
                    }
                }
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("Error: unknown argument '{}'", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let raw = match read_input(input.as_deref()) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: failed to read input: {}", e);
            process::exit(1);
        }
    };

    let failures: Vec<FailureRecord> = match serde_json::from_str(&raw) {
        Ok(failures) => failures,
        Err(e) => {
            eprintln!("Error: input is not a JSON array of failure records: {}", e);
            process::exit(1);
        }
    };

    let summary = clustering::cluster_failures(&failures);
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: failed to serialize summary: {}", e);
            process::exit(1);
        }
    }
}

fn read_input(path: Option<&str>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}
