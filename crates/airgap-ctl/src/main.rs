//! airgap-ctl — encode and decode chunked air-gap messages from the shell.

mod cmd;
mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};

use config::AirGapConfig;

fn print_usage() {
    println!("Usage: airgap-ctl [--config <path>] <command>");
    println!();
    println!("Commands:");
    println!("  encode <op>=<path>...   Encode operations into frames, one per line");
    println!("                          (<op> is decimal or 0x-hex, <path> '-' reads stdin)");
    println!("  decode [<path>]         Reassemble frames (stdin by default) and print operations");
    println!("  decode [<path>] --json  Same, printing operations as JSON");
    println!("  inspect <frame>         Show the header of one base64 frame");
    println!("  config                  Show the resolved configuration");
    println!("  config init             Write a default config file if none exists");
    println!();
    println!("Options:");
    println!("  --config <path>   Config file (default: $AIRGAP_CONFIG or ~/.config/airgap/config.toml)");
    println!();
    println!("Logging goes to stderr; set RUST_LOG=airgap_core=debug for per-frame detail.");
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --config option
    let mut config_path: Option<PathBuf> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--config" {
            i += 1;
            config_path = Some(args.get(i).context("--config requires a path")?.into());
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    let path = config_path.unwrap_or_else(AirGapConfig::file_path);

    match remaining.as_slice() {
        ["config", "init"] => return cmd::config::cmd_config_init(&path),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            return Ok(());
        }
        _ => {}
    }

    let config = AirGapConfig::load_from(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    match remaining.as_slice() {
        ["encode", ops @ ..] => cmd::encode::cmd_encode(&cmd::airgap(&config)?, ops),
        ["decode"] => cmd::decode::cmd_decode(&cmd::airgap(&config)?, None, false),
        ["decode", "--json"] => cmd::decode::cmd_decode(&cmd::airgap(&config)?, None, true),
        ["decode", file] => cmd::decode::cmd_decode(&cmd::airgap(&config)?, Some(*file), false),
        ["decode", file, "--json"] | ["decode", "--json", file] => {
            cmd::decode::cmd_decode(&cmd::airgap(&config)?, Some(*file), true)
        }
        ["inspect", frame] => cmd::inspect::cmd_inspect(frame),
        ["config"] => cmd::config::cmd_config(&config, &path),
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
