//! Preview one metadata sync without writing to any store.
//!
//! Refreshes the configured test repository, runs discovery, and prints the
//! change plan against an empty metadata view. Useful for checking what a
//! first sync of a branch would create, and for validating that a test tree
//! parses cleanly.
//!
//! Usage:
//!   RUST_ENV=development sync-preview --branch release-7.2 --release r7.2

use std::collections::HashMap;
use std::process;

use test_insights::config::Config;
use test_insights::repo::{GitRepository, RepositorySource};
use test_insights::services::{differ, discovery};

fn print_usage() {
    println!("Usage: sync-preview [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -b, --branch <BRANCH>    Branch to preview (default: configured branch)");
    println!("  -r, --release <RELEASE>  Release scope (default: global)");
    println!("  -h, --help               Show this help message");
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut branch: Option<String> = None;
    let mut release: Option<String> = None;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--branch" | "-b" => {
                i += 1;
                match args.get(i) {
                    Some(value) => branch = Some(value.clone()),
                    None => {
                        eprintln!("Error: {} requires a value", args[i - 1]);
                        process::exit(1);
                    }
                }
            }
            "--release" | "-r" => {
                i += 1;
                match args.get(i) {
                    Some(value) => release = Some(value.clone()),
                    None => {
                        eprintln!("Error: {} requires a value", args[i - 1]);
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

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let branch = branch.unwrap_or_else(|| config.repo_branch.clone());

    let repo = GitRepository::new(&config.repo_url, &config.repo_workdir, config.git_timeout());
    let commit = match repo.refresh(&branch).await {
        Ok(commit) => commit,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let outcome = match discovery::discover(
        repo.workdir(),
        &config.tests_path,
        &config.staging_config,
        config.discovery_limits(),
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let diff = differ::compare(&outcome.tests, &HashMap::new(), release.as_deref());

    println!("Branch:       {}", branch);
    println!("Commit:       {}", commit);
    println!("Release:      {}", release.as_deref().unwrap_or("global"));
    println!("Discovered:   {} tests", outcome.tests.len());
    println!("Parse errors: {} files", outcome.failed_files.len());
    for failure in &outcome.failed_files {
        println!("  {}: {}", failure.path, failure.error);
    }
    println!();
    println!("A first sync would add {} rows:", diff.to_add.len());
    for test in &diff.to_add {
        println!(
            "  {} [{}] {} ({})",
            test.name,
            test.topology,
            test.test_state,
            test.priority.map(|p| p.as_str()).unwrap_or("no priority")
        );
    }
}
