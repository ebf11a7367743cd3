//! Channels the ACME cape exposes for each IIO device

use crate::types::{Channel, ChannelKind};

/// Raw column names written by iio-capture
pub mod columns {
    pub const SHUNT_VOLTAGE: &str = "vshunt mV";
    pub const BUS_VOLTAGE: &str = "vbus mV";
    pub const POWER: &str = "power mW";
    pub const CURRENT: &str = "current mA";
    pub const TIMESTAMP: &str = "timestamp ms";
}

/// (label prefix, kind, column) for every standard channel, in registration order
pub const STANDARD_CHANNELS: &[(&str, ChannelKind, &str)] = &[
    ("shunt", ChannelKind::Voltage, columns::SHUNT_VOLTAGE),
    ("bus", ChannelKind::Voltage, columns::BUS_VOLTAGE),
    ("power", ChannelKind::Power, columns::POWER),
    ("current", ChannelKind::Current, columns::CURRENT),
    ("timestamp", ChannelKind::TimeMs, columns::TIMESTAMP),
];

/// Standard channels of one device, labelled `<prefix>_<device>`
pub fn device_channels(device: &str) -> Vec<Channel> {
    STANDARD_CHANNELS
        .iter()
        .map(|(prefix, kind, column)| {
            Channel::new(device, *kind, *column, format!("{}_{}", prefix, device))
        })
        .collect()
}

/// Standard channels of every device, grouped by device in the order given
pub fn standard_channels<S: AsRef<str>>(devices: &[S]) -> Vec<Channel> {
    devices
        .iter()
        .flat_map(|d| device_channels(d.as_ref()))
        .collect()
}

/// Keep channels matching the given kinds and devices; an empty filter matches all
pub fn select<S: AsRef<str>>(
    channels: &[Channel],
    kinds: &[ChannelKind],
    devices: &[S],
) -> Vec<Channel> {
    channels
        .iter()
        .filter(|c| kinds.is_empty() || kinds.contains(&c.kind))
        .filter(|c| devices.is_empty() || devices.iter().any(|d| d.as_ref() == c.device))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_channels() {
        let channels = device_channels("iio:device0");
        assert_eq!(channels.len(), 5);
        assert_eq!(channels[1].label, "bus_iio:device0");
        assert_eq!(channels[1].column, "vbus mV");
        assert!(channels.iter().all(|c| c.device == "iio:device0"));
    }

    #[test]
    fn test_labels_are_unique() {
        let channels = standard_channels(&["a", "b"]);
        let mut labels: Vec<_> = channels.iter().map(|c| c.label.clone()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 10);
    }

    #[test]
    fn test_select_by_kind_and_device() {
        let channels = standard_channels(&["a", "b"]);

        let voltages = select(&channels, &[ChannelKind::Voltage], &[] as &[&str]);
        assert_eq!(voltages.len(), 4);

        let b_power = select(&channels, &[ChannelKind::Power], &["b"]);
        assert_eq!(b_power.len(), 1);
        assert_eq!(b_power[0].label, "power_b");

        assert_eq!(select(&channels, &[], &[] as &[&str]).len(), 10);
    }
}
