//! Configuration for atmospheric interpolation.

use serde::{Deserialize, Serialize};

/// Configuration consumed by the interpolation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// Number of reference neighbors used for each local regression.
    pub nneighbors: usize,

    /// Nodata sentinel of the target locations and the output raster.
    pub nodata_value: f64,

    /// Number of workers; `None` uses all available cores.
    /// Always capped at the number of target lines.
    pub n_workers: Option<usize>,

    /// Gaussian smoothing sigma in pixels; `<= 0` disables smoothing.
    pub smoothing_sigma: f64,

    /// Band-name prefix marking surface reflectance bands, which are
    /// excluded from interpolation.
    pub reflectance_prefix: String,

    /// Reference values at or below this floor are treated as invalid
    /// when fitting a band.
    pub validity_floor: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            nneighbors: 400,
            nodata_value: -9999.0,
            n_workers: None,
            smoothing_sigma: 2.0,
            reflectance_prefix: "RFL_".to_string(),
            validity_floor: -5.0,
        }
    }
}

impl InterpolationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ATM_NNEIGHBORS") {
            if let Ok(n) = val.parse() {
                config.nneighbors = n;
            }
        }

        if let Ok(val) = std::env::var("ATM_NODATA_VALUE") {
            if let Ok(v) = val.parse() {
                config.nodata_value = v;
            }
        }

        if let Ok(val) = std::env::var("ATM_N_WORKERS") {
            if let Ok(n) = val.parse::<i64>() {
                config.n_workers = if n > 0 { Some(n as usize) } else { None };
            }
        }

        if let Ok(val) = std::env::var("ATM_SMOOTHING_SIGMA") {
            if let Ok(v) = val.parse() {
                config.smoothing_sigma = v;
            }
        }

        if let Ok(val) = std::env::var("ATM_REFLECTANCE_PREFIX") {
            config.reflectance_prefix = val;
        }

        if let Ok(val) = std::env::var("ATM_VALIDITY_FLOOR") {
            if let Ok(v) = val.parse() {
                config.validity_floor = v;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.nneighbors == 0 {
            return Err("nneighbors must be > 0".to_string());
        }

        if self.n_workers == Some(0) {
            return Err("n_workers must be > 0".to_string());
        }

        if !self.nodata_value.is_finite() {
            return Err("nodata_value must be finite".to_string());
        }

        if !self.smoothing_sigma.is_finite() {
            return Err("smoothing_sigma must be finite".to_string());
        }

        if !self.validity_floor.is_finite() {
            return Err("validity_floor must be finite".to_string());
        }

        Ok(())
    }

    /// Number of workers for a target grid with `lines` rows.
    ///
    /// The requested count (or all available cores) capped at `lines`;
    /// at least one unless there are no lines at all.
    pub fn resolve_workers(&self, lines: usize) -> usize {
        let requested = self.n_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        requested.max(1).min(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InterpolationConfig::default();
        assert_eq!(config.nneighbors, 400);
        assert_eq!(config.nodata_value, -9999.0);
        assert_eq!(config.n_workers, None);
        assert_eq!(config.smoothing_sigma, 2.0);
        assert_eq!(config.reflectance_prefix, "RFL_");
        assert_eq!(config.validity_floor, -5.0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = InterpolationConfig::default();
        assert!(config.validate().is_ok());

        config.nneighbors = 0;
        assert!(config.validate().is_err());

        config = InterpolationConfig::default();
        config.n_workers = Some(0);
        assert!(config.validate().is_err());

        config = InterpolationConfig::default();
        config.nodata_value = f64::NAN;
        assert!(config.validate().is_err());

        config = InterpolationConfig::default();
        config.smoothing_sigma = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_workers_capped_by_lines() {
        let mut config = InterpolationConfig::default();
        config.n_workers = Some(16);
        assert_eq!(config.resolve_workers(4), 4);
        assert_eq!(config.resolve_workers(100), 16);
        assert_eq!(config.resolve_workers(0), 0);

        config.n_workers = None;
        let available = config.resolve_workers(usize::MAX);
        assert!(available >= 1);
        assert_eq!(config.resolve_workers(1), 1);
    }

    #[test]
    fn test_yaml_partial_config_uses_defaults() {
        let config: InterpolationConfig =
            serde_yaml::from_str("nneighbors: 50\nsmoothing_sigma: 0\n").unwrap();
        assert_eq!(config.nneighbors, 50);
        assert_eq!(config.smoothing_sigma, 0.0);
        assert_eq!(config.nodata_value, -9999.0);
    }
}
