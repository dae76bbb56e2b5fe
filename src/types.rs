use chrono::Utc;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Number of channels delivered by the acquisition device per tick.
pub const CHANNEL_COUNT: usize = 10;

/// Channel labels in device order: eight EEG electrodes, galvanic skin
/// response, skin temperature.
pub const CHANNEL_LABELS: [&str; CHANNEL_COUNT] =
    ["e0", "e1", "e2", "e3", "e4", "e5", "e6", "e7", "gsr", "tmp"];

/// Index of the channel subjected to spectral analysis.
pub const ANALYSIS_CHANNEL: usize = 0;

/// Wire key carrying the band powers of the analysis channel.
pub const BAND_FIELD: &str = "e0_bands";

/// Current wall-clock time in nanoseconds.
pub fn now_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// One multi-channel sample delivered by the acquisition device.
///
/// Immutable once produced; values are ordered to match [`CHANNEL_LABELS`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub values: [f64; CHANNEL_COUNT],
    /// Nanosecond timestamp assigned at acquisition time.
    pub ts_ns: i64,
}

impl RawSample {
    pub fn new(values: [f64; CHANNEL_COUNT]) -> Self {
        Self {
            values,
            ts_ns: now_ns(),
        }
    }

    pub fn with_timestamp(values: [f64; CHANNEL_COUNT], ts_ns: i64) -> Self {
        Self { values, ts_ns }
    }

    /// Value of the designated analysis channel.
    pub fn analysis_value(&self) -> f64 {
        self.values[ANALYSIS_CHANNEL]
    }
}

/// Named frequency interval, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandDefinition {
    pub name: &'static str,
    pub low_hz: f64,
    pub high_hz: f64,
}

/// The physiological EEG bands, in ascending frequency order.
pub const BANDS: [BandDefinition; 5] = [
    BandDefinition {
        name: "delta",
        low_hz: 0.5,
        high_hz: 4.0,
    },
    BandDefinition {
        name: "theta",
        low_hz: 4.0,
        high_hz: 8.0,
    },
    BandDefinition {
        name: "alpha",
        low_hz: 8.0,
        high_hz: 13.0,
    },
    BandDefinition {
        name: "beta",
        low_hz: 13.0,
        high_hz: 30.0,
    },
    BandDefinition {
        name: "gamma",
        low_hz: 30.0,
        high_hz: 100.0,
    },
];

/// Per-band spectral power of one analysis window.
///
/// Recomputed wholesale each time the window is analyzed; carries no state
/// between windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralResult {
    pub delta: f64,
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl SpectralResult {
    /// Build from powers ordered like [`BANDS`].
    pub fn from_powers(powers: [f64; BANDS.len()]) -> Self {
        Self {
            delta: powers[0],
            theta: powers[1],
            alpha: powers[2],
            beta: powers[3],
            gamma: powers[4],
        }
    }

    /// Powers ordered like [`BANDS`].
    pub fn powers(&self) -> [f64; BANDS.len()] {
        [self.delta, self.theta, self.alpha, self.beta, self.gamma]
    }
}

/// The unit broadcast to subscribers: the latest sample plus the most recent
/// band powers, absent until the first full window has been analyzed.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedFrame {
    pub sample: RawSample,
    pub bands: Option<SpectralResult>,
}

// Serialized flat to match the legacy wire shape: one key per channel, "ts",
// and "e0_bands" only once bands exist.
impl Serialize for EnrichedFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = CHANNEL_COUNT + 1 + usize::from(self.bands.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (label, value) in CHANNEL_LABELS.iter().zip(self.sample.values.iter()) {
            map.serialize_entry(label, value)?;
        }
        map.serialize_entry("ts", &self.sample.ts_ns)?;
        if let Some(bands) = &self.bands {
            map.serialize_entry(BAND_FIELD, bands)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample() -> RawSample {
        let mut values = [0.0; CHANNEL_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as f64;
        }
        RawSample::with_timestamp(values, 1_700_000_000_000_000_000)
    }

    #[test]
    fn frame_without_bands_omits_band_field() {
        let frame = EnrichedFrame {
            sample: sample(),
            bands: None,
        };
        let json: Value = serde_json::to_value(&frame).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj.len(), CHANNEL_COUNT + 1);
        for label in CHANNEL_LABELS {
            assert!(obj.contains_key(label), "missing channel key {label}");
        }
        assert_eq!(obj["ts"], Value::from(1_700_000_000_000_000_000i64));
        assert!(!obj.contains_key(BAND_FIELD));
    }

    #[test]
    fn frame_with_bands_carries_all_five() {
        let frame = EnrichedFrame {
            sample: sample(),
            bands: Some(SpectralResult::from_powers([0.1, 0.2, 0.3, 0.4, 0.5])),
        };
        let json: Value = serde_json::to_value(&frame).unwrap();
        let bands = json[BAND_FIELD].as_object().unwrap();

        assert_eq!(bands.len(), BANDS.len());
        for band in BANDS {
            assert!(bands.contains_key(band.name), "missing band {}", band.name);
        }
        assert_eq!(bands["alpha"], Value::from(0.3));
    }

    #[test]
    fn channel_values_serialize_in_device_order() {
        let frame = EnrichedFrame {
            sample: sample(),
            bands: None,
        };
        let json: Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["e0"], Value::from(0.0));
        assert_eq!(json["gsr"], Value::from(8.0));
        assert_eq!(json["tmp"], Value::from(9.0));
    }

    #[test]
    fn band_table_matches_wire_names() {
        let names: Vec<&str> = BANDS.iter().map(|b| b.name).collect();
        assert_eq!(names, ["delta", "theta", "alpha", "beta", "gamma"]);
    }
}
