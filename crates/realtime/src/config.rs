use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::ConfigError;

/// Engine tunables. Every section falls back to its defaults when missing from the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	pub keepalive: KeepaliveConfig,
	pub history: HistoryConfig,
	pub gesture: GestureConfig,
	pub notifier: NotifierConfig,
	pub filters: FilterConfig,
}

impl SyncConfig {
	pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();

		let data = fs::read(path).await.map_err(|source| ConfigError::Read {
			path: path.to_path_buf(),
			source,
		})?;

		let config = serde_json::from_slice::<Self>(&data)?;
		config.validate()?;

		debug!(path = %path.display(), "Loaded sync config;");

		Ok(config)
	}

	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let config = serde_json::from_str::<Self>(json)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.keepalive.period_ms == 0 {
			return Err(ConfigError::Invalid(
				"keepalive.period_ms must be greater than zero".to_string(),
			));
		}

		if self.history.limit == 0 {
			return Err(ConfigError::Invalid(
				"history.limit must be greater than zero".to_string(),
			));
		}

		let gesture = &self.gesture;
		if !(gesture.preview_threshold.is_finite()
			&& gesture.commit_threshold.is_finite()
			&& gesture.preview_threshold >= 0.0
			&& gesture.preview_threshold < gesture.commit_threshold)
		{
			return Err(ConfigError::Invalid(format!(
				"gesture.preview_threshold ({}) must be lower than gesture.commit_threshold ({})",
				gesture.preview_threshold, gesture.commit_threshold
			)));
		}

		if !(gesture.opacity_falloff.is_finite() && gesture.opacity_falloff > 0.0) {
			return Err(ConfigError::Invalid(
				"gesture.opacity_falloff must be a positive number".to_string(),
			));
		}

		if !(0.0..=1.0).contains(&gesture.min_opacity) {
			return Err(ConfigError::Invalid(
				"gesture.min_opacity must be within 0.0..=1.0".to_string(),
			));
		}

		if self.filters.min_age > self.filters.max_age {
			return Err(ConfigError::Invalid(format!(
				"filters.min_age ({}) is greater than filters.max_age ({})",
				self.filters.min_age, self.filters.max_age
			)));
		}

		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
	/// Delay before the first ping after the stream opens.
	pub warmup_ms: u64,
	pub period_ms: u64,
}

impl KeepaliveConfig {
	#[must_use]
	pub const fn warmup(&self) -> Duration {
		Duration::from_millis(self.warmup_ms)
	}

	/// Never zero, a zero period would stall the link runner.
	#[must_use]
	pub const fn period(&self) -> Duration {
		if self.period_ms == 0 {
			Duration::from_millis(1)
		} else {
			Duration::from_millis(self.period_ms)
		}
	}
}

impl Default for KeepaliveConfig {
	fn default() -> Self {
		Self {
			warmup_ms: 10_000,
			period_ms: 25_000,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
	/// Window size used when the caller does not pick one.
	pub limit: usize,
}

impl Default for HistoryConfig {
	fn default() -> Self {
		Self { limit: 100 }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
	/// `|dx|` past which the direction indicator lights up.
	pub preview_threshold: f64,
	/// `|dx|` past which a release commits the decision.
	pub commit_threshold: f64,
	/// Degrees of rotation per unit of horizontal displacement.
	pub rotation_coefficient: f64,
	/// `|dx|` at which opacity would reach zero before flooring.
	pub opacity_falloff: f64,
	pub min_opacity: f64,
}

impl Default for GestureConfig {
	fn default() -> Self {
		Self {
			preview_threshold: 50.0,
			commit_threshold: 100.0,
			rotation_coefficient: 0.1,
			opacity_falloff: 300.0,
			min_opacity: 0.3,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
	pub visible_ms: u64,
}

impl NotifierConfig {
	#[must_use]
	pub const fn visible_for(&self) -> Duration {
		Duration::from_millis(self.visible_ms)
	}
}

impl Default for NotifierConfig {
	fn default() -> Self {
		Self { visible_ms: 1_400 }
	}
}

/// Bounds every submitted age filter is clamped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
	pub min_age: i32,
	pub max_age: i32,
}

impl Default for FilterConfig {
	fn default() -> Self {
		Self {
			min_age: 18,
			max_age: 120,
		}
	}
}
