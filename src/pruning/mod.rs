use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

pub mod prune;
pub mod scheduler;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, poise::ChoiceParameter)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl IntervalUnit {
    pub fn seconds(self) -> u64 {
        match self {
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3600,
            IntervalUnit::Days => 86400,
            IntervalUnit::Weeks => 604800,
        }
    }
}

/// Pruning schedule, persisted as JSON so it survives restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneConfig {
    pub channel_id: Option<u64>,
    pub interval: u64,
    pub unit: IntervalUnit,
    pub log_channel_id: Option<u64>,
    #[serde(default)]
    pub images_only: bool,
}

impl Default for PruneConfig {
    fn default() -> Self {
        PruneConfig {
            channel_id: None,
            interval: 72,
            unit: IntervalUnit::Hours,
            log_channel_id: None,
            images_only: false,
        }
    }
}

impl PruneConfig {
    /// Messages older than this many seconds are prune candidates, and a new
    /// run becomes due this long after the previous one. Saturates so an
    /// absurd interval in a hand-edited config file cannot overflow.
    pub fn threshold_secs(&self) -> u64 {
        self.interval
            .saturating_mul(self.unit.seconds())
            .min(i64::MAX as u64)
    }
}

/// File-backed store for the prune schedule and the last-run watermark.
#[derive(Debug, Clone)]
pub struct PruneStore {
    config_path: PathBuf,
    watermark_path: PathBuf,
}

impl PruneStore {
    pub fn new(config_path: impl Into<PathBuf>, watermark_path: impl Into<PathBuf>) -> Self {
        PruneStore {
            config_path: config_path.into(),
            watermark_path: watermark_path.into(),
        }
    }

    /// Loads the schedule, falling back to the default when no file exists
    /// yet.
    pub fn load_config(&self) -> Result<PruneConfig> {
        if !self.config_path.exists() {
            return Ok(PruneConfig::default());
        }
        let text = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read {}", self.config_path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", self.config_path.display()))
    }

    pub fn store_config(&self, config: &PruneConfig) -> Result<()> {
        ensure_parent(&self.config_path)?;
        let text = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, text)
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;
        Ok(())
    }

    /// Unix timestamp of the last completed run, if any.
    pub fn watermark(&self) -> Result<Option<i64>> {
        if !self.watermark_path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.watermark_path)
            .with_context(|| format!("Failed to read {}", self.watermark_path.display()))?;
        let mark = text
            .trim()
            .parse::<i64>()
            .with_context(|| format!("Invalid watermark in {}", self.watermark_path.display()))?;
        Ok(Some(mark))
    }

    pub fn set_watermark(&self, timestamp: i64) -> Result<()> {
        ensure_parent(&self.watermark_path)?;
        fs::write(&self.watermark_path, timestamp.to_string())
            .with_context(|| format!("Failed to write {}", self.watermark_path.display()))?;
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// A run is due when no run was ever recorded or the threshold has elapsed
/// since the last one.
pub fn is_due(now: i64, watermark: Option<i64>, threshold_secs: u64) -> bool {
    match watermark {
        None => true,
        Some(mark) => now.saturating_sub(mark) >= threshold_secs as i64,
    }
}

pub fn is_image_filename(filename: &str) -> bool {
    let Some((_, extension)) = filename.rsplit_once('.') else {
        return false;
    };
    matches!(
        extension.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_are_due_by_threshold() {
        let threshold = 72 * IntervalUnit::Hours.seconds();

        // never ran
        assert!(is_due(1_000_000, None, threshold));
        // ran ten hours ago
        assert!(!is_due(1_000_000, Some(1_000_000 - 10 * 3600), threshold));
        // ran exactly one threshold ago
        assert!(is_due(1_000_000, Some(1_000_000 - threshold as i64), threshold));
        // watermark from the future
        assert!(!is_due(1_000_000, Some(2_000_000), threshold));
    }

    #[test]
    fn unit_seconds() {
        assert_eq!(IntervalUnit::Minutes.seconds(), 60);
        assert_eq!(IntervalUnit::Weeks.seconds(), 7 * 24 * 3600);
    }

    #[test]
    fn image_filenames_are_detected_by_extension() {
        assert!(is_image_filename("photo.PNG"));
        assert!(is_image_filename("a.b.webp"));
        assert!(!is_image_filename("report.pdf"));
        assert!(!is_image_filename("noextension"));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PruneConfig {
            channel_id: Some(5),
            interval: 2,
            unit: IntervalUnit::Days,
            log_channel_id: None,
            images_only: true,
        };
        let text = serde_json::to_string(&config).unwrap();
        let parsed: PruneConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.channel_id, Some(5));
        assert_eq!(parsed.unit, IntervalUnit::Days);
        assert!(parsed.images_only);
        assert_eq!(parsed.threshold_secs(), 2 * 86400);
    }

    #[test]
    fn extreme_intervals_saturate_instead_of_overflowing() {
        let config = PruneConfig {
            channel_id: Some(5),
            interval: u64::MAX,
            unit: IntervalUnit::Weeks,
            log_channel_id: None,
            images_only: false,
        };
        let threshold = config.threshold_secs();
        assert_eq!(threshold, i64::MAX as u64);
        // a threshold that large never comes due
        assert!(!is_due(1_000_000, Some(999_900), threshold));
    }

    #[test]
    fn images_only_defaults_to_false_for_old_files() {
        let parsed: PruneConfig = serde_json::from_str(
            r#"{"channel_id":null,"interval":72,"unit":"hours","log_channel_id":null}"#,
        )
        .unwrap();
        assert!(!parsed.images_only);
    }

    #[test]
    fn store_persists_config_and_watermark() {
        let dir = std::env::temp_dir().join(format!("prune-store-{}", std::process::id()));
        let store = PruneStore::new(dir.join("schedule.json"), dir.join("watermark.txt"));

        // empty store falls back to defaults
        assert_eq!(store.load_config().unwrap().interval, 72);
        assert_eq!(store.watermark().unwrap(), None);

        let mut config = PruneConfig::default();
        config.channel_id = Some(99);
        store.store_config(&config).unwrap();
        assert_eq!(store.load_config().unwrap().channel_id, Some(99));

        store.set_watermark(1234).unwrap();
        assert_eq!(store.watermark().unwrap(), Some(1234));

        let _ = std::fs::remove_dir_all(dir);
    }
}
