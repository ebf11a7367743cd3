use crate::cli::CaptureArgs;
use acme_rs::channels::{select, standard_channels};
use acme_rs::{CaptureConfig, Channel, ChannelKind, TieBreak};
use std::path::PathBuf;
use std::time::Duration;

/// Load the optional JSON config and apply command-line overrides.
pub fn build_config(args: &CaptureArgs) -> Result<CaptureConfig, String> {
    let mut config = match &args.config {
        Some(path) => CaptureConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => CaptureConfig::default(),
    };

    if let Some(ref binary) = args.binary {
        config.binary = Some(PathBuf::from(binary));
    }
    if let Some(ref host) = args.host {
        config.host = host.clone();
    }
    if !args.devices.is_empty() {
        config.devices = args.devices.clone();
    }
    if let Some(size) = args.buffer_size {
        if size == 0 {
            return Err("Buffer size (--buffer-size) must be greater than 0".to_string());
        }
        config.buffer_size = size;
    }
    if let Some(ref tie_break) = args.tie_break {
        config.tie_break = parse_tie_break(tie_break)?;
    }

    if config.devices.is_empty() {
        return Err("At least one device must be specified".to_string());
    }

    Ok(config)
}

/// Convert a capture duration in seconds, rejecting values `Duration` cannot hold
pub fn validate_duration(duration: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(duration).map_err(|_| {
        format!(
            "Duration must be a non-negative number of seconds, got {}",
            duration
        )
    })
}

pub fn parse_kinds(kinds: &[String]) -> Result<Vec<ChannelKind>, String> {
    kinds
        .iter()
        .map(|k| {
            ChannelKind::from_str(k).ok_or_else(|| {
                format!(
                    "Unknown channel kind '{}'. Valid kinds: voltage, power, current, time_ms",
                    k
                )
            })
        })
        .collect()
}

pub fn parse_tie_break(s: &str) -> Result<TieBreak, String> {
    TieBreak::from_str(s).ok_or_else(|| {
        format!(
            "Unknown tie-break '{}'. Valid values: device-order, advance-all",
            s
        )
    })
}

/// Parse a "device=path" source string.
pub fn parse_source(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((device, path)) if !device.trim().is_empty() && !path.trim().is_empty() => {
            Ok((device.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!(
            "Invalid source '{}': expected 'device=path' (e.g., iio:device0=/tmp/a.csv)",
            s
        )),
    }
}

/// Parse a list of source strings, rejecting repeated devices.
pub fn parse_sources(sources: &[String]) -> Result<Vec<(String, PathBuf)>, String> {
    let parsed: Vec<(String, PathBuf)> = sources
        .iter()
        .map(|s| parse_source(s))
        .collect::<Result<_, _>>()?;

    for (i, (device, _)) in parsed.iter().enumerate() {
        if parsed[..i].iter().any(|(d, _)| d == device) {
            return Err(format!("Device '{}' given more than once", device));
        }
    }

    Ok(parsed)
}

/// Standard channels of `devices` restricted to `kinds`.
pub fn active_channels(devices: &[String], kinds: &[ChannelKind]) -> Vec<Channel> {
    select(&standard_channels(devices), kinds, &[] as &[&str])
}
