use crate::cli::CaptureArgs;
use crate::exit_codes;
use crate::output;
use crate::params;
use acme_rs::{require_binary, CaptureSupervisor, CombinedOutput, Invocation};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct CaptureSummary<'a> {
    #[serde(flatten)]
    combined: &'a CombinedOutput,
    duration_secs: f64,
    host: &'a str,
    raw_artifacts: Vec<PathBuf>,
    invocations: Vec<&'a Invocation>,
}

pub async fn execute(args: CaptureArgs) -> i32 {
    let duration = match params::validate_duration(args.duration) {
        Ok(d) => d,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let mut config = match params::build_config(&args) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let kinds = match params::parse_kinds(&args.kinds) {
        Ok(k) => k,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    match require_binary(config.binary.as_deref()) {
        Ok(path) => config.binary = Some(path),
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::BINARY_NOT_FOUND;
        }
    }

    let devices = config.devices.clone();
    let channels = params::active_channels(&devices, &kinds);

    let mut supervisor = match CaptureSupervisor::new(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    if let Err(e) = supervisor.reset(&devices) {
        eprintln!("Error: {}", e);
        return exit_codes::for_error(&e);
    }

    if !args.quiet {
        eprintln!(
            "Capturing from {} on {} for {}s...",
            devices.join(", "),
            supervisor.config().host,
            args.duration
        );
    }

    if let Err(e) = supervisor.start().await {
        eprintln!("Capture failed to start: {}", e);
        return exit_codes::for_error(&e);
    }

    tokio::time::sleep(duration).await;

    if let Err(e) = supervisor.stop().await {
        eprintln!("Capture failed to stop: {}", e);
        return exit_codes::for_error(&e);
    }

    let combined = match supervisor.data_retrieval(&channels, Path::new(&args.output)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Data retrieval failed: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let summary = CaptureSummary {
        combined: &combined,
        duration_secs: args.duration,
        host: &supervisor.config().host,
        raw_artifacts: supervisor.raw_artifacts(),
        invocations: supervisor.invocations(),
    };

    if let Err(e) = output::emit(&summary, args.compact, args.summary.as_deref()) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }

    if !args.quiet {
        output::report(&combined);
    }

    exit_codes::SUCCESS
}
