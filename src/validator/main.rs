//! Standalone validator for registry files.
//!
//! Reads a registry document without repairing it and reports every
//! subscriber record that breaks the list invariants.

use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;

use ban_monitor_bot::config::DEFAULT_MAX_USERNAMES;
use ban_monitor_bot::registry::{Registry, RegistryStore};

/// Registry file validator.
#[derive(Parser, Debug)]
#[command(name = "validate_registry")]
#[command(about = "Validates the registry file of the username monitor bot")]
#[command(version)]
struct Args {
    /// Path to the registry JSON file to validate.
    #[arg(short, long, default_value = "data.json")]
    file: String,

    /// Watch-list capacity to check against.
    #[arg(short, long, default_value_t = DEFAULT_MAX_USERNAMES)]
    max_usernames: usize,

    /// Show detailed information for each subscriber.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    validate_registry(&args)
}

fn validate_registry(args: &Args) -> ExitCode {
    println!("Validating: {}\n", args.file);

    let registry = match RegistryStore::new(&args.file).load_strict() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("✗ Failed to load registry: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (errors, warnings) = report(&registry, args.max_usernames, args.verbose);

    println!();
    let total = registry.len();
    if errors == 0 {
        println!("✓ All {total} subscriber records are consistent!");
        if warnings > 0 {
            println!("  ({warnings} warning(s) - watch lists over capacity)");
        }
        println!("  Admins: {}", registry.admins().len());
        ExitCode::SUCCESS
    } else {
        println!("✗ Validation failed: {errors} error(s) in {total} subscriber records");
        ExitCode::FAILURE
    }
}

/// Prints per-subscriber findings and returns `(errors, warnings)`.
fn report(registry: &Registry, max_usernames: usize, verbose: bool) -> (usize, usize) {
    let now = Utc::now();
    let mut errors = 0;
    let mut warnings = 0;

    for (owner, user) in registry.users() {
        let problems = user.violations();

        if verbose {
            println!(
                "[{owner}] {} watching, {} banned, expires {} ({})",
                user.watching().len(),
                user.banned().len(),
                user.expiry().format("%Y-%m-%d"),
                if user.is_entitled(now) { "active" } else { "expired" }
            );
        }

        if user.watching().len() > max_usernames {
            warnings += 1;
            println!(
                "  ⚠ Warning: [{owner}] watches {} usernames (limit {max_usernames})",
                user.watching().len()
            );
        }

        if problems.is_empty() {
            if verbose {
                println!("  ✓ OK");
            }
            continue;
        }

        errors += problems.len();
        for problem in problems {
            println!("  ✗ Error: [{owner}] {problem}");
        }
    }

    (errors, warnings)
}
