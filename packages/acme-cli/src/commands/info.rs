use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use acme_rs::binary::{find_binary, BINARY_ENV_VAR, BINARY_NAME, DEFAULT_BINARY_PATHS};
use acme_rs::{CaptureConfig, SupervisorState};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct InfoOutput {
    cli_version: String,
    binary_name: &'static str,
    binary_path: Option<String>,
    binary_found: bool,
    platform: String,
    arch: String,
    search_paths: Vec<&'static str>,
    defaults: CaptureConfig,
    initial_state: SupervisorState,
}

pub fn execute(args: InfoArgs) -> i32 {
    let binary_path = find_binary(args.binary.as_deref().map(Path::new));

    let info = InfoOutput {
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        binary_name: BINARY_NAME,
        binary_path: binary_path.as_ref().map(|p| p.display().to_string()),
        binary_found: binary_path.is_some(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        search_paths: DEFAULT_BINARY_PATHS.to_vec(),
        defaults: CaptureConfig::default(),
        initial_state: SupervisorState::Idle,
    };

    if args.json {
        if let Err(e) = output::emit(&info, false, None) {
            eprintln!("Error: {}", e);
            return exit_codes::EXECUTION_ERROR;
        }
    } else {
        println!("acmecap v{}", info.cli_version);
        println!("Platform: {} ({})", info.platform, info.arch);
        println!();
        match info.binary_path {
            Some(ref path) => println!("iio-capture binary: {}", path),
            None => println!("iio-capture binary: not found"),
        }
        println!("Binary name: {}", info.binary_name);
        println!(
            "Search paths: ${}, {}, $PATH",
            BINARY_ENV_VAR,
            info.search_paths.join(", ")
        );
        println!();
        println!("Default host: {}", info.defaults.host);
        println!("Default buffer size: {}", info.defaults.buffer_size);
        println!(
            "Stop grace window: {} polls x {} ms",
            info.defaults.grace_polls, info.defaults.poll_interval_ms
        );
    }

    exit_codes::SUCCESS
}
