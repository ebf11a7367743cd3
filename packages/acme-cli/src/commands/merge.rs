use crate::cli::MergeArgs;
use crate::exit_codes;
use crate::output;
use crate::params;
use acme_rs::{merge_artifacts, CombinedOutput};
use std::path::Path;

pub fn execute(args: MergeArgs) -> i32 {
    let sources = match params::parse_sources(&args.sources) {
        Ok(s) => s,
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

    let tie_break = match params::parse_tie_break(&args.tie_break) {
        Ok(t) => t,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let devices: Vec<String> = sources.iter().map(|(d, _)| d.clone()).collect();
    let channels = params::active_channels(&devices, &kinds);
    let output_path = Path::new(&args.output);

    let merged = match merge_artifacts(
        &sources,
        &channels,
        output_path,
        &args.timestamp_column,
        tie_break,
    ) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Merge failed: {}", e);
            return exit_codes::for_error(&e);
        }
    };

    let combined = CombinedOutput::new(
        output_path.to_path_buf(),
        merged.channels,
        args.sample_rate,
        merged.rows,
    );

    if let Err(e) = output::emit(&combined, args.compact, None) {
        eprintln!("Error: {}", e);
        return exit_codes::EXECUTION_ERROR;
    }
    output::report(&combined);

    exit_codes::SUCCESS
}
