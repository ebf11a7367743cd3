use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "acmecap",
    version,
    about = "ACME cape power capture tool",
    long_about = "Capture power, voltage and current from ACME cape IIO devices and merge\n\
                  the per-device streams into one time-ordered CSV.\n\
                  Requires the iio-capture binary. Set $IIO_CAPTURE_PATH or use --binary."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a full capture cycle and write the combined CSV
    Capture(CaptureArgs),
    /// Merge raw iio-capture CSVs from an earlier run
    Merge(MergeArgs),
    /// Show iio-capture binary path and platform information
    Info(InfoArgs),
    /// List the standard channels of each device
    Channels(ChannelsArgs),
}

#[derive(Args)]
pub struct CaptureArgs {
    /// JSON capture configuration; flags below override it
    #[arg(long)]
    pub config: Option<String>,

    /// Path to iio-capture
    #[arg(long, env = "IIO_CAPTURE_PATH")]
    pub binary: Option<String>,

    /// ACME cape host name
    #[arg(long)]
    pub host: Option<String>,

    /// IIO devices to capture from (e.g., iio:device0 iio:device1)
    #[arg(long = "device", num_args = 1..)]
    pub devices: Vec<String>,

    /// iio-capture buffer size
    #[arg(long)]
    pub buffer_size: Option<u32>,

    /// Capture duration in seconds
    #[arg(long, default_value_t = 10.0)]
    pub duration: f64,

    /// Channel kinds to keep (voltage, power, current, time_ms); all when omitted
    #[arg(long, num_args = 1..)]
    pub kinds: Vec<String>,

    /// Tie-break for equal timestamps (device-order, advance-all)
    #[arg(long)]
    pub tie_break: Option<String>,

    /// Combined CSV output path
    #[arg(short, long)]
    pub output: String,

    /// Write the JSON summary here instead of stdout
    #[arg(long)]
    pub summary: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Raw artifact per device as "device=path"
    #[arg(long = "source", num_args = 1.., required = true)]
    pub sources: Vec<String>,

    /// Combined CSV output path
    #[arg(short, long)]
    pub output: String,

    /// Channel kinds to keep (voltage, power, current, time_ms); all when omitted
    #[arg(long, num_args = 1..)]
    pub kinds: Vec<String>,

    /// Tie-break for equal timestamps (device-order, advance-all)
    #[arg(long, default_value = "device-order")]
    pub tie_break: String,

    /// Name of the timestamp column in the raw CSVs
    #[arg(long, default_value = "timestamp ms")]
    pub timestamp_column: String,

    /// Sample rate recorded in the summary
    #[arg(long, default_value_t = 100.0)]
    pub sample_rate: f64,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct InfoArgs {
    /// Path to iio-capture
    #[arg(long, env = "IIO_CAPTURE_PATH")]
    pub binary: Option<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ChannelsArgs {
    /// IIO devices to list
    #[arg(long = "device", num_args = 1.., default_values_t = vec!["iio:device0".to_string()])]
    pub devices: Vec<String>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
