//! # Hub Host Daemon
//!
//! Main entry point for the hub host runtime.

use hubd::{HostReport, HostRuntime, HostRuntimeConfig};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().collect();

    let config = parse_args(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        print_usage(&args[0]);
        process::exit(1);
    });

    init_tracing(&config.log_level);

    let mut runtime = HostRuntime::new(config).unwrap_or_else(|e| {
        eprintln!("Failed to create runtime: {}", e);
        process::exit(1);
    });

    match runtime.run() {
        Ok(report) => print_report(&report),
        Err(e) => {
            eprintln!("Runtime error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_args(args: &[String]) -> Result<HostRuntimeConfig, String> {
    let mut config = HostRuntimeConfig::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--script" | "-s" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --script".to_string());
                }
                let script_text = fs::read_to_string(&args[i])
                    .map_err(|e| format!("Failed to read script file: {}", e))?;
                config.script = Some(script_text);
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --config".to_string());
                }
                config.config_path = Some(PathBuf::from(&args[i]));
            }
            "--step-limit" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --step-limit".to_string());
                }
                config.step_limit = args[i]
                    .parse()
                    .map_err(|_| format!("Invalid step-limit value: {}", args[i]))?;
            }
            "--log-level" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value for --log-level".to_string());
                }
                config.log_level = args[i].clone();
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other => {
                return Err(format!("Unknown option: {}", other));
            }
        }
        i += 1;
    }

    Ok(config)
}

fn print_report(report: &HostReport) {
    for message in &report.received {
        println!(
            "{} {} {} {}: {}",
            message.port, message.channel, message.side, message.event, message.payload
        );
    }
    for (port, error) in &report.refusals {
        println!("refused {}: {}", port, error);
    }
    for entry in &report.log {
        let source = entry
            .source
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("[{}] {} {}", entry.level, source, entry.message);
    }
    println!(
        "delivered={} dropped={} discarded={} tasks={}",
        report.stats.delivered, report.stats.dropped, report.stats.discarded, report.stats.tasks
    );
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --script <FILE>      Route script to play");
    eprintln!("  -c, --config <FILE>      JSON file holding the shared configuration");
    eprintln!("  --step-limit <N>         Deliveries allowed per scheduling round");
    eprintln!("  --log-level <FILTER>     Log filter when RUST_LOG is unset (default: info)");
    eprintln!("  -h, --help               Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} --script demos/pairing.hub", program);
    eprintln!("  {} --config hub.json --script demos/pairing.hub --log-level debug", program);
}
