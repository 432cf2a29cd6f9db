use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use tracing::info;

/// Severity thresholds, tilt in degrees and acceleration in m/s².
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    pub tilt_warning: f64,
    pub tilt_danger: f64,
    pub tilt_critical: f64,
    pub accel_warning: f64,
    pub accel_danger: f64,
    pub accel_critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tilt_warning: 10.0,
            tilt_danger: 20.0,
            tilt_critical: 30.0,
            accel_warning: 10.5,
            accel_danger: 12.0,
            accel_critical: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertSettings {
    pub enable_email: bool,
    pub enable_sms: bool,
    pub enable_web_notification: bool,
    pub email_recipients: Vec<String>,
    pub sms_recipients: Vec<String>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enable_email: false,
            enable_sms: false,
            enable_web_notification: true,
            email_recipients: Vec::new(),
            sms_recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorSettings {
    /// Sampling interval in seconds.
    pub sample_rate: u32,
    pub data_retention_days: u32,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            sample_rate: 5,
            data_retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplaySettings {
    pub default_chart_range: String,
    /// Dashboard refresh interval in seconds.
    pub refresh_interval: u32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            default_chart_range: "24h".to_string(),
            refresh_interval: 5,
        }
    }
}

/// Runtime-mutable operational configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub alert_settings: AlertSettings,
    #[serde(default)]
    pub sensor_settings: SensorSettings,
    #[serde(default)]
    pub display_settings: DisplaySettings,
}

impl AppConfig {
    fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("tilt_warning", t.tilt_warning),
            ("tilt_danger", t.tilt_danger),
            ("tilt_critical", t.tilt_critical),
            ("accel_warning", t.accel_warning),
            ("accel_danger", t.accel_danger),
            ("accel_critical", t.accel_critical),
        ] {
            if !value.is_finite() {
                return Err(Error::ConfigValidation(format!(
                    "threshold {} must be a finite number",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Shared configuration store.
///
/// Readers take a snapshot under a read lock so a concurrent update can
/// never produce a torn view; the lock is never held across an await point.
pub struct ConfigStore {
    inner: RwLock<AppConfig>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AppConfig::default()),
        }
    }

    pub fn snapshot(&self) -> AppConfig {
        self.inner.read().expect("config lock poisoned").clone()
    }

    /// Thresholds snapshot used by the classifier.
    pub fn thresholds(&self) -> Thresholds {
        self.inner
            .read()
            .expect("config lock poisoned")
            .thresholds
            .clone()
    }

    /// Deep-merges a partial JSON update into the current config.
    ///
    /// The merged document is re-validated by typed deserialization before
    /// it replaces the current value; on any failure the prior config is
    /// retained untouched.
    pub fn update(&self, partial: &Value) -> Result<AppConfig> {
        if !partial.is_object() {
            return Err(Error::ConfigValidation(
                "config update must be a JSON object".to_string(),
            ));
        }

        let current = self.snapshot();
        let mut merged = serde_json::to_value(&current)
            .map_err(|e| Error::ConfigValidation(e.to_string()))?;
        deep_merge(&mut merged, partial);

        let candidate: AppConfig = serde_json::from_value(merged)
            .map_err(|e| Error::ConfigValidation(e.to_string()))?;
        candidate.validate()?;

        *self.inner.write().expect("config lock poisoned") = candidate.clone();
        info!("config updated");
        Ok(candidate)
    }

    pub fn reset(&self) -> AppConfig {
        let defaults = AppConfig::default();
        *self.inner.write().expect("config lock poisoned") = defaults.clone();
        info!("config reset to defaults");
        defaults
    }
}

/// Recursively overlays `updates` onto `base`; non-object values replace.
fn deep_merge(base: &mut Value, updates: &Value) {
    match (base, updates) {
        (Value::Object(base_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, updates) => *base = updates.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.thresholds.accel_warning, 10.5);
        assert_eq!(config.thresholds.accel_danger, 12.0);
        assert_eq!(config.thresholds.accel_critical, 15.0);
        assert_eq!(config.thresholds.tilt_warning, 10.0);
        assert_eq!(config.thresholds.tilt_danger, 20.0);
        assert_eq!(config.thresholds.tilt_critical, 30.0);
        assert!(!config.alert_settings.enable_email);
        assert!(config.alert_settings.enable_web_notification);
        assert_eq!(config.sensor_settings.sample_rate, 5);
        assert_eq!(config.sensor_settings.data_retention_days, 30);
        assert_eq!(config.display_settings.default_chart_range, "24h");
    }

    #[test]
    fn test_partial_update_preserves_siblings() {
        let store = ConfigStore::new();
        let updated = store
            .update(&json!({"thresholds": {"accel_warning": 5.0}}))
            .unwrap();

        assert_eq!(updated.thresholds.accel_warning, 5.0);
        // Siblings untouched.
        assert_eq!(updated.thresholds.accel_danger, 12.0);
        assert_eq!(updated.thresholds.tilt_critical, 30.0);
        assert!(updated.alert_settings.enable_web_notification);
        assert_eq!(store.thresholds().accel_warning, 5.0);
    }

    #[test]
    fn test_update_rejects_unknown_key() {
        let store = ConfigStore::new();
        let err = store
            .update(&json!({"thresholds": {"accel_extreme": 99.0}}))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(_)));
        // Prior config retained.
        assert_eq!(store.snapshot(), AppConfig::default());
    }

    #[test]
    fn test_update_rejects_wrong_type() {
        let store = ConfigStore::new();
        let err = store
            .update(&json!({"thresholds": {"accel_warning": "very high"}}))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigValidation(_)));
        assert_eq!(store.thresholds().accel_warning, 10.5);
    }

    #[test]
    fn test_update_rejects_non_object() {
        let store = ConfigStore::new();
        assert!(matches!(
            store.update(&json!(42)),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = ConfigStore::new();
        store
            .update(&json!({
                "thresholds": {"accel_critical": 20.0},
                "sensor_settings": {"sample_rate": 60}
            }))
            .unwrap();
        assert_ne!(store.snapshot(), AppConfig::default());

        store.reset();
        assert_eq!(store.snapshot(), AppConfig::default());
    }

    #[test]
    fn test_deep_merge_replaces_arrays() {
        let store = ConfigStore::new();
        let updated = store
            .update(&json!({"alert_settings": {"email_recipients": ["ops@example.com"]}}))
            .unwrap();
        assert_eq!(
            updated.alert_settings.email_recipients,
            vec!["ops@example.com".to_string()]
        );
        assert!(!updated.alert_settings.enable_email);
    }
}
