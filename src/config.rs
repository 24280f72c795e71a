//! Pipeline configuration.
//!
//! Every tunable of the grid matcher lives here. All structs implement
//! `Default` with the values the command line uses when nothing is given,
//! and deserialize with `#[serde(default)]` so a JSON file only needs the
//! fields it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    keypoints::DistanceMetric,
};

/// Number of grid rows and columns each image is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> Self {
        return GridShape { rows, cols };
    }

    pub fn cells(&self) -> usize {
        return self.rows * self.cols;
    }
}

impl Default for GridShape {
    fn default() -> Self {
        return GridShape { rows: 2, cols: 2 };
    }
}

/// ORB detector and descriptor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbConfig {
    /// Upper bound on keypoints kept per region, strongest first.
    pub max_features: usize,
    /// Intensity difference a circle pixel needs to count as brighter or darker.
    pub fast_threshold: i32,
    /// Contiguous circle pixels required for a corner (FAST-9 to FAST-12).
    pub fast_arc_length: usize,
    /// Non-maximum suppression radius in pixels, 0 disables it.
    pub nms_radius: f32,
    /// Gaussian smoothing applied before the BRIEF tests, 0 disables it.
    pub blur_sigma: f32,
}

impl Default for OrbConfig {
    fn default() -> Self {
        return OrbConfig {
            max_features: 200,
            fast_threshold: 20,
            fast_arc_length: 9,
            nms_radius: 3.0,
            blur_sigma: 2.0,
        };
    }
}

/// Nearest-neighbour search used to pair descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatcherKind {
    /// Exhaustive search over every train descriptor.
    #[default]
    BruteForce,
    /// Vantage-point tree index, Hamming metric only.
    VpTree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub kind: MatcherKind,
    pub metric: DistanceMetric,
}

/// Relative distance filter applied to raw correspondences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// A correspondence survives when its distance is below `factor * min_distance`.
    pub distance_factor: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        return FilterConfig { distance_factor: 3.0 };
    }
}

/// RANSAC homography settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Maximum hypotheses drawn.
    pub max_iterations: usize,
    /// Reprojection error in pixels below which a pair counts as an inlier.
    pub inlier_threshold: f64,
    /// Target probability of having drawn one outlier-free sample.
    pub confidence: f64,
    /// Random seed for reproducibility (None for entropy).
    pub seed: Option<u64>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        return RansacConfig {
            max_iterations: 2000,
            inlier_threshold: 3.0,
            confidence: 0.995,
            seed: None,
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub grid: GridShape,
    pub orb: OrbConfig,
    pub matcher: MatcherConfig,
    pub filter: FilterConfig,
    pub ransac: RansacConfig,
    /// Process region pairs on the rayon pool instead of one after another.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        return PipelineConfig {
            grid: GridShape::default(),
            orb: OrbConfig::default(),
            matcher: MatcherConfig::default(),
            filter: FilterConfig::default(),
            ransac: RansacConfig::default(),
            parallel: true,
        };
    }
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;

        return Ok(config);
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.grid.rows == 0 || self.grid.cols == 0 {
            return Err(Error::Config(format!(
                "grid must have at least one row and column, got {}x{}",
                self.grid.rows, self.grid.cols
            )));
        }
        if self.orb.max_features == 0 {
            return Err(Error::Config("max_features must be positive".into()));
        }
        if !(9..=12).contains(&self.orb.fast_arc_length) {
            return Err(Error::Config(format!(
                "fast_arc_length must be within 9..=12, got {}",
                self.orb.fast_arc_length
            )));
        }
        if !(1..=255).contains(&self.orb.fast_threshold) {
            return Err(Error::Config(format!(
                "fast_threshold must be within 1..=255, got {}",
                self.orb.fast_threshold
            )));
        }
        if !self.orb.nms_radius.is_finite() || self.orb.nms_radius < 0.0 {
            return Err(Error::Config("nms_radius must be finite and non-negative".into()));
        }
        if !self.orb.blur_sigma.is_finite() || self.orb.blur_sigma < 0.0 {
            return Err(Error::Config("blur_sigma must be finite and non-negative".into()));
        }
        if !self.filter.distance_factor.is_finite() || self.filter.distance_factor <= 0.0 {
            return Err(Error::Config("distance_factor must be finite and positive".into()));
        }
        if self.matcher.kind == MatcherKind::VpTree && self.matcher.metric != DistanceMetric::Hamming {
            return Err(Error::Config("the vp-tree matcher only supports the hamming metric".into()));
        }
        if self.ransac.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be positive".into()));
        }
        if !self.ransac.inlier_threshold.is_finite() || self.ransac.inlier_threshold <= 0.0 {
            return Err(Error::Config("inlier_threshold must be finite and positive".into()));
        }
        if !(self.ransac.confidence > 0.0 && self.ransac.confidence < 1.0) {
            return Err(Error::Config("confidence must be within (0, 1)".into()));
        }

        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid, GridShape::new(2, 2));
        assert_eq!(config.orb.max_features, 200);
        assert_eq!(config.filter.distance_factor, 3.0);
    }

    #[test]
    fn empty_json_is_the_default_config() {
        let parsed: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, PipelineConfig::default());
        assert!(parsed.parallel);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let parsed: PipelineConfig = serde_json::from_str(
            r#"{ "grid": { "rows": 3 }, "matcher": { "kind": "vp-tree" }, "ransac": { "seed": 9 } }"#,
        )
        .unwrap();

        assert_eq!(parsed.grid, GridShape::new(3, 2));
        assert_eq!(parsed.matcher.kind, MatcherKind::VpTree);
        assert_eq!(parsed.matcher.metric, DistanceMetric::Hamming);
        assert_eq!(parsed.ransac.seed, Some(9));
        assert_eq!(parsed.ransac.max_iterations, 2000);
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = PipelineConfig::default();
        config.orb.max_features = 64;
        config.matcher.metric = DistanceMetric::L2;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(PipelineConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = PipelineConfig::default();
        config.grid.cols = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = PipelineConfig::default();
        config.matcher = MatcherConfig { kind: MatcherKind::VpTree, metric: DistanceMetric::L2 };
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.ransac.confidence = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.orb.fast_arc_length = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fast_threshold_stays_within_pixel_range() {
        let mut config = PipelineConfig::default();

        for t in [1, 255] {
            config.orb.fast_threshold = t;
            assert!(config.validate().is_ok(), "threshold {t}");
        }

        for t in [0, -5, 256, i32::MAX] {
            config.orb.fast_threshold = t;
            assert!(matches!(config.validate(), Err(Error::Config(_))), "threshold {t}");
        }

        let parsed: PipelineConfig = serde_json::from_str(r#"{ "orb": { "fast_threshold": 32767 } }"#).unwrap();
        assert!(parsed.validate().is_err());
    }
}
