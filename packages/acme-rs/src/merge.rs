use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CaptureError, Result};
use crate::reader::StreamReader;
use crate::types::{Channel, TieBreak};

/// Result of a merge: the channels written to the header and the row count
#[derive(Debug, Clone)]
pub struct Merged {
    pub channels: Vec<Channel>,
    pub rows: u64,
}

/// Merge per-device readers into one CSV on `writer`
///
/// `readers` is in device order, which decides ties under
/// `TieBreak::DeviceOrder`. Channels whose device has no reader are left out
/// of the header. Each step writes one row of the current values, then
/// advances the device(s) holding the minimum timestamp; a finished device
/// leaves the active set but keeps supplying its last row.
pub fn merge_readers<W: Write>(
    mut readers: Vec<(String, StreamReader)>,
    channels: &[Channel],
    writer: W,
    tie_break: TieBreak,
) -> Result<Merged> {
    let index: HashMap<&str, usize> = readers
        .iter()
        .enumerate()
        .map(|(i, (device, _))| (device.as_str(), i))
        .collect();

    let mut header = Vec::new();
    let mut lookups = Vec::new();
    for channel in channels {
        if let Some(&i) = index.get(channel.device.as_str()) {
            header.push(channel.clone());
            lookups.push((i, channel.column.clone()));
        }
    }

    let mut out = csv::Writer::from_writer(writer);
    out.write_record(header.iter().map(|c| c.label.as_str()))
        .map_err(write_error)?;

    let mut active: Vec<usize> = (0..readers.len())
        .filter(|&i| !readers[i].1.is_finished())
        .collect();
    let mut rows = 0u64;

    while !active.is_empty() {
        {
            let row = lookups
                .iter()
                .map(|(i, column)| readers[*i].1.value(column))
                .collect::<Result<Vec<&str>>>()?;
            out.write_record(&row).map_err(write_error)?;
        }
        rows += 1;

        let min = active
            .iter()
            .map(|&i| readers[i].1.timestamp())
            .fold(f64::INFINITY, f64::min);

        let holders = active
            .iter()
            .copied()
            .filter(|&i| readers[i].1.timestamp() == min);
        let to_advance: Vec<usize> = match tie_break {
            TieBreak::DeviceOrder => holders.take(1).collect(),
            TieBreak::AdvanceAll => holders.collect(),
        };

        for i in to_advance {
            let (device, reader) = &mut readers[i];
            reader.advance()?;
            if reader.is_finished() {
                log::debug!("{} exhausted after {} rows", device, reader.rows_read());
            }
        }
        active.retain(|&i| !readers[i].1.is_finished());
    }

    out.flush()?;

    Ok(Merged {
        channels: header,
        rows,
    })
}

/// Open the raw artifacts of `sources` and merge them into `output`
///
/// Devices without an active channel are skipped without opening their
/// artifact. Zero-length or header-only artifacts are logged and their
/// channels dropped from the output. A channel naming a device absent from
/// `sources` is a configuration error.
pub fn merge_artifacts(
    sources: &[(String, PathBuf)],
    channels: &[Channel],
    output: &Path,
    timestamp_column: &str,
    tie_break: TieBreak,
) -> Result<Merged> {
    if channels.is_empty() {
        return Err(CaptureError::Configuration(
            "At least one active channel is required".to_string(),
        ));
    }

    for channel in channels {
        if !sources.iter().any(|(device, _)| device == &channel.device) {
            return Err(CaptureError::Configuration(format!(
                "Channel '{}' refers to unknown device '{}'",
                channel.label, channel.device
            )));
        }
    }

    let mut readers = Vec::new();
    for (device, artifact) in sources {
        let columns: Vec<&str> = channels
            .iter()
            .filter(|c| &c.device == device)
            .map(|c| c.column.as_str())
            .collect();

        if columns.is_empty() {
            log::debug!("Skipping {}: no active channels", device);
            continue;
        }

        if std::fs::metadata(artifact)?.len() == 0 {
            log::warn!("\"{}\" appears to be empty", artifact.display());
            continue;
        }

        match StreamReader::open(artifact, &columns, timestamp_column) {
            Ok(reader) => readers.push((device.clone(), reader)),
            Err(CaptureError::EmptyArtifact(path)) => {
                log::warn!("\"{}\" has a header but no samples", path.display());
            }
            Err(e) => return Err(e),
        }
    }

    log::info!(
        "Merging {} of {} device outputs into {}",
        readers.len(),
        sources.len(),
        output.display()
    );

    let file = File::create(output)?;
    let merged = merge_readers(readers, channels, file, tie_break)?;

    log::info!(
        "Wrote {} rows × {} channels to {}",
        merged.rows,
        merged.channels.len(),
        output.display()
    );

    Ok(merged)
}

fn write_error(err: csv::Error) -> CaptureError {
    CaptureError::Io(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelKind;
    use tempfile::TempDir;

    const TS: &str = "timestamp ms";

    fn artifact(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let header = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        (header, rows)
    }

    fn timestamp_channel(device: &str, label: &str) -> Channel {
        Channel::new(device, ChannelKind::TimeMs, TS, label)
    }

    /// Device A at 0,10,20 and device B at 0,5,15,25
    fn two_devices(dir: &TempDir) -> Vec<(String, PathBuf)> {
        let a = artifact(dir, "a.csv", "timestamp ms, vbus mV\n0, 1\n10, 2\n20, 3\n");
        let b = artifact(
            dir,
            "b.csv",
            "timestamp ms, vbus mV\n0, 4\n5, 5\n15, 6\n25, 7\n",
        );
        vec![("A".to_string(), a), ("B".to_string(), b)]
    }

    fn rows_of(rows: &[Vec<String>]) -> Vec<(u32, u32)> {
        rows.iter()
            .map(|r| (r[0].parse().unwrap(), r[1].parse().unwrap()))
            .collect()
    }

    #[test]
    fn test_merge_device_order_steps_single_minimum() {
        let dir = TempDir::new().unwrap();
        let sources = two_devices(&dir);
        let channels = vec![timestamp_channel("A", "ta"), timestamp_channel("B", "tb")];
        let out = dir.path().join("merged.csv");

        let merged = merge_artifacts(&sources, &channels, &out, TS, TieBreak::DeviceOrder).unwrap();
        assert_eq!(merged.rows, 7);

        let (header, rows) = read_csv(&out);
        assert_eq!(header, vec!["ta", "tb"]);
        assert_eq!(
            rows_of(&rows),
            vec![(0, 0), (10, 0), (10, 5), (10, 15), (20, 15), (20, 25), (20, 25)]
        );
    }

    #[test]
    fn test_merge_advance_all_gives_one_row_per_distinct_timestamp() {
        let dir = TempDir::new().unwrap();
        let sources = two_devices(&dir);
        let channels = vec![timestamp_channel("A", "ta"), timestamp_channel("B", "tb")];
        let out = dir.path().join("merged.csv");

        let merged = merge_artifacts(&sources, &channels, &out, TS, TieBreak::AdvanceAll).unwrap();
        assert_eq!(merged.rows, 6);

        let (_, rows) = read_csv(&out);
        assert_eq!(
            rows_of(&rows),
            vec![(0, 0), (10, 5), (10, 15), (20, 15), (20, 25), (20, 25)]
        );
    }

    #[test]
    fn test_tie_goes_to_first_device_in_order() {
        let dir = TempDir::new().unwrap();
        let mut sources = two_devices(&dir);
        sources.reverse();
        let channels = vec![timestamp_channel("A", "ta"), timestamp_channel("B", "tb")];
        let out = dir.path().join("merged.csv");

        merge_artifacts(&sources, &channels, &out, TS, TieBreak::DeviceOrder).unwrap();

        let (_, rows) = read_csv(&out);
        // B is first in device order now, so B leaves the shared 0 first
        assert_eq!(rows_of(&rows)[..2], [(0, 0), (0, 5)]);
    }

    #[test]
    fn test_column_order_follows_channels_not_devices() {
        let dir = TempDir::new().unwrap();
        let sources = two_devices(&dir);
        let channels = vec![
            Channel::new("B", ChannelKind::Voltage, "vbus mV", "bus_B"),
            Channel::new("A", ChannelKind::Voltage, "vbus mV", "bus_A"),
            Channel::new("B", ChannelKind::Voltage, "vbus mV", "bus_B_again"),
        ];
        let out = dir.path().join("merged.csv");

        merge_artifacts(&sources, &channels, &out, TS, TieBreak::DeviceOrder).unwrap();

        let (header, rows) = read_csv(&out);
        assert_eq!(header, vec!["bus_B", "bus_A", "bus_B_again"]);
        assert_eq!(rows[0], vec!["4", "1", "4"]);
    }

    #[test]
    fn test_device_without_channels_is_never_opened() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "a.csv", "timestamp ms, vbus mV\n0, 1\n10, 2\n");
        // not valid CSV for the requested columns; opening it would fail
        let b = artifact(&dir, "b.csv", "garbage\n");
        let sources = vec![("A".to_string(), a), ("B".to_string(), b)];
        let channels = vec![Channel::new("A", ChannelKind::Voltage, "vbus mV", "bus_A")];
        let out = dir.path().join("merged.csv");

        let merged = merge_artifacts(&sources, &channels, &out, TS, TieBreak::DeviceOrder).unwrap();
        assert_eq!(merged.rows, 2);
        let (header, _) = read_csv(&out);
        assert_eq!(header, vec!["bus_A"]);
    }

    #[test]
    fn test_empty_artifact_drops_its_channels() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "a.csv", "timestamp ms, vbus mV\n0, 1\n10, 2\n");
        let b = artifact(&dir, "b.csv", "");
        let c = artifact(&dir, "c.csv", "timestamp ms, vbus mV\n");
        let sources = vec![
            ("A".to_string(), a),
            ("B".to_string(), b),
            ("C".to_string(), c),
        ];
        let channels = vec![
            Channel::new("B", ChannelKind::Voltage, "vbus mV", "bus_B"),
            Channel::new("A", ChannelKind::Voltage, "vbus mV", "bus_A"),
            Channel::new("C", ChannelKind::Voltage, "vbus mV", "bus_C"),
        ];
        let out = dir.path().join("merged.csv");

        let merged = merge_artifacts(&sources, &channels, &out, TS, TieBreak::DeviceOrder).unwrap();
        assert_eq!(merged.rows, 2);
        assert_eq!(merged.channels.len(), 1);

        let (header, rows) = read_csv(&out);
        assert_eq!(header, vec!["bus_A"]);
        assert_eq!(rows, vec![vec!["1"], vec!["2"]]);
    }

    #[test]
    fn test_all_empty_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "a.csv", "");
        let sources = vec![("A".to_string(), a)];
        let channels = vec![Channel::new("A", ChannelKind::Voltage, "vbus mV", "bus_A")];
        let out = dir.path().join("merged.csv");

        let merged = merge_artifacts(&sources, &channels, &out, TS, TieBreak::DeviceOrder).unwrap();
        assert_eq!(merged.rows, 0);
        assert!(merged.channels.is_empty());
    }

    #[test]
    fn test_unknown_device_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let sources = two_devices(&dir);
        let channels = vec![Channel::new("Z", ChannelKind::Voltage, "vbus mV", "bus_Z")];
        let out = dir.path().join("merged.csv");

        let result = merge_artifacts(&sources, &channels, &out, TS, TieBreak::DeviceOrder);
        assert!(matches!(result, Err(CaptureError::Configuration(_))));
    }

    #[test]
    fn test_malformed_artifact_aborts_merge() {
        let dir = TempDir::new().unwrap();
        let a = artifact(&dir, "a.csv", "timestamp ms, vshunt mV\n0, 1\n");
        let sources = vec![("A".to_string(), a)];
        let channels = vec![Channel::new("A", ChannelKind::Voltage, "vbus mV", "bus_A")];
        let out = dir.path().join("merged.csv");

        let result = merge_artifacts(&sources, &channels, &out, TS, TieBreak::DeviceOrder);
        assert!(matches!(result, Err(CaptureError::MalformedArtifact { .. })));
    }

    #[test]
    fn test_merge_readers_into_memory() {
        let dir = TempDir::new().unwrap();
        let path = artifact(&dir, "x.csv", "timestamp ms, vbus mV\n0, 100\n10, 105\n");
        let reader = StreamReader::open(&path, &["vbus mV"], TS).unwrap();
        let channels = vec![Channel::new("X", ChannelKind::Voltage, "vbus mV", "bus_X")];

        let mut buf = Vec::new();
        let merged = merge_readers(
            vec![("X".to_string(), reader)],
            &channels,
            &mut buf,
            TieBreak::DeviceOrder,
        )
        .unwrap();

        assert_eq!(merged.rows, 2);
        assert_eq!(String::from_utf8(buf).unwrap(), "bus_X\n100\n105\n");
    }
}
