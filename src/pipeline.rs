//! Region-pair orchestration.
//!
//! Both images are cut with the same grid, then every cell pair goes through
//! extract → match → filter → estimate on its own. A pair that fails keeps its
//! failure in its [`MatchResult`] and never stops its siblings.

use std::{fmt, time::Duration};

use nalgebra::{Matrix3, Point2};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::{FilterConfig, GridShape, MatcherKind, PipelineConfig},
    error::{Error, Result},
    features::{FeatureExtractor, FeatureSet, OrbExtractor},
    homography::{HomographyEstimator, RansacHomography},
    keypoints::KeyPoint,
    matching::{distance_range, filter_matches, BruteForceMatcher, Correspondence, DescriptorMatcher, VpTreeMatcher},
    model::Image,
    segment::{segment, Region},
    timing::{millis, time_one},
};

/// Outcome of matching one region pair.
#[derive(Debug, Default)]
pub struct MatchResult {
    /// One correspondence per keypoint of the first region.
    pub matches: Vec<Correspondence>,
    /// Subset of `matches` that passed the distance filter.
    pub good_matches: Vec<Correspondence>,
    /// Smallest and largest distance over `matches`.
    pub distance_range: Option<(f32, f32)>,
    pub homography: Option<Matrix3<f64>>,
    /// Why `homography` is missing, when it is.
    pub failure: Option<Error>,
}

impl MatchResult {
    fn failed(error: Error) -> Self {
        return MatchResult { failure: Some(error), ..MatchResult::default() };
    }
}

#[derive(Debug)]
pub struct RegionReport {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub features_1: FeatureSet,
    pub features_2: FeatureSet,
    pub result: MatchResult,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub grid: GridShape,
    pub regions_1: Vec<Region>,
    pub regions_2: Vec<Region>,
    /// One report per region pair, in row-major grid order.
    pub reports: Vec<RegionReport>,
}

impl PipelineOutput {
    pub fn failures(&self) -> usize {
        return self.reports.iter().filter(|r| r.result.failure.is_some()).count();
    }
}

pub type DynMatcher = Box<dyn DescriptorMatcher + Send + Sync>;

pub struct Pipeline<E, M, H> {
    grid: GridShape,
    filter: FilterConfig,
    parallel: bool,
    extractor: E,
    matcher: M,
    estimator: H,
}

impl Pipeline<OrbExtractor, DynMatcher, RansacHomography> {
    /// ORB extraction, the configured matcher and RANSAC estimation.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let matcher: DynMatcher = match config.matcher.kind {
            MatcherKind::BruteForce => Box::new(BruteForceMatcher::new(config.matcher.metric)),
            MatcherKind::VpTree => Box::new(VpTreeMatcher),
        };

        return Ok(Pipeline::new(
            config.grid,
            config.filter,
            config.parallel,
            OrbExtractor::new(config.orb.clone()),
            matcher,
            RansacHomography::new(config.ransac.clone()),
        ));
    }
}

fn point(kp: &KeyPoint) -> Point2<f64> {
    return Point2::new(kp.x as f64, kp.y as f64);
}

impl<E, M, H> Pipeline<E, M, H>
where
    E: FeatureExtractor + Sync,
    M: DescriptorMatcher + Sync,
    H: HomographyEstimator + Sync,
{
    pub fn new(grid: GridShape, filter: FilterConfig, parallel: bool, extractor: E, matcher: M, estimator: H) -> Self {
        return Pipeline { grid, filter, parallel, extractor, matcher, estimator };
    }

    /// Segments both images and matches every region pair.
    ///
    /// Only an invalid grid aborts the run; per-pair failures end up in the reports.
    pub fn run(&self, first: &Image<u8>, second: &Image<u8>) -> Result<PipelineOutput> {
        let regions_1 = segment(first, self.grid)?;
        let regions_2 = segment(second, self.grid)?;

        info!(
            rows = self.grid.rows,
            cols = self.grid.cols,
            parallel = self.parallel,
            "matching {} region pairs",
            regions_1.len()
        );

        let pairs: Vec<(usize, &Region, &Region)> = regions_1
            .iter()
            .zip(regions_2.iter())
            .enumerate()
            .map(|(i, (a, b))| (i, a, b))
            .collect();

        let reports: Vec<RegionReport> = if self.parallel {
            pairs.par_iter().map(|&(i, a, b)| self.process_pair(i, a, b)).collect()
        } else {
            pairs.iter().map(|&(i, a, b)| self.process_pair(i, a, b)).collect()
        };

        let output = PipelineOutput { grid: self.grid, regions_1, regions_2, reports };
        info!(failures = output.failures(), "matching finished");

        return Ok(output);
    }

    /// Extract → match → filter → estimate for one pair of corresponding cells.
    pub fn process_pair(&self, index: usize, first: &Region, second: &Region) -> RegionReport {
        let (outcome, elapsed) = time_one(|| self.match_regions(index, first, second));
        let (features_1, features_2, result) = outcome;

        debug!(region = index, elapsed_ms = millis(elapsed), "region pair done");

        return RegionReport { index, row: first.row, col: first.col, features_1, features_2, result, elapsed };
    }

    fn match_regions(&self, index: usize, first: &Region, second: &Region) -> (FeatureSet, FeatureSet, MatchResult) {
        let features_1 = match self.extractor.extract(&first.image) {
            Ok(features) => features,
            Err(e) => {
                warn!(region = index, image = 1, error = %e, "skipping region pair");
                return (FeatureSet::default(), FeatureSet::default(), MatchResult::failed(e));
            }
        };

        // The first region's features stay in the report so they can still be drawn
        let features_2 = match self.extractor.extract(&second.image) {
            Ok(features) => features,
            Err(e) => {
                warn!(region = index, image = 2, error = %e, "skipping region pair");
                return (features_1, FeatureSet::default(), MatchResult::failed(e));
            }
        };

        let matches = self.matcher.match_features(&features_1, &features_2);
        let good_matches = filter_matches(&matches, self.filter.distance_factor);
        let range = distance_range(&matches);

        debug!(
            region = index,
            keypoints_1 = features_1.len(),
            keypoints_2 = features_2.len(),
            matches = matches.len(),
            good = good_matches.len(),
            "matched"
        );

        let src: Vec<_> = good_matches.iter().map(|c| point(&features_1.keypoints[c.query_idx])).collect();
        let dst: Vec<_> = good_matches.iter().map(|c| point(&features_2.keypoints[c.train_idx])).collect();

        let (homography, failure) = match self.estimator.estimate(&src, &dst) {
            Ok(h) => (Some(h), None),
            Err(e) => {
                warn!(region = index, error = %e, "no homography for region pair");
                (None, Some(e))
            }
        };

        let result = MatchResult { matches, good_matches, distance_range: range, homography, failure };

        return (features_1, features_2, result);
    }
}

impl fmt::Display for RegionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- Region {} (row {}, col {})", self.index, self.row, self.col)?;

        match self.result.distance_range {
            Some((min, max)) => {
                writeln!(f, "-- Max dist : {max:.6}")?;
                writeln!(f, "-- Min dist : {min:.6}")?;
            }
            None => {
                writeln!(f, "-- Max dist : n/a")?;
                writeln!(f, "-- Min dist : n/a")?;
            }
        }

        writeln!(
            f,
            "-- Keypoints: {} / {}, matches: {}, good matches: {}",
            self.features_1.len(),
            self.features_2.len(),
            self.result.matches.len(),
            self.result.good_matches.len()
        )?;

        match (&self.result.homography, &self.result.failure) {
            (Some(h), _) => {
                writeln!(f, "-- Homography:")?;
                for r in 0..3 {
                    writeln!(f, "   [ {:12.6} {:12.6} {:12.6} ]", h[(r, 0)], h[(r, 1)], h[(r, 2)])?;
                }
            }
            (None, Some(e)) => writeln!(f, "-- Homography: none ({e})")?,
            (None, None) => writeln!(f, "-- Homography: none")?,
        }

        return Ok(());
    }
}
