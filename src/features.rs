use std::sync::OnceLock;

use crunchy::unroll;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::{
    algorithm::Padding,
    config::OrbConfig,
    error::{Error, Result},
    keypoints::{Descriptor, KeyPoint, DESCRIPTOR_BYTES},
    model::{ColorSpace, Image},
    typing::ImageData,
};

/// Radius of the disc sampled by the orientation moments and the BRIEF tests.
pub const PATCH_RADIUS: i32 = 15;

// Rotating a point of the disc keeps it inside the disc, so one extra pixel is enough
const EDGE_MARGIN: usize = PATCH_RADIUS as usize + 1;

const PATTERN_SEED: u64 = 0x0b1e_f00d;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureSet {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Vec<Descriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        return self.keypoints.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.keypoints.is_empty();
    }
}

pub trait FeatureExtractor {
    /// Keypoints of `image`, strongest first, with one descriptor each.
    fn extract(&self, image: &Image<u8>) -> Result<FeatureSet>;
}

/// Test point pairs `[x0, y0, x1, y1]`, drawn once from a fixed seed so
/// descriptors are comparable across runs and processes.
fn brief_pattern() -> &'static [[i8; 4]] {
    static PATTERN: OnceLock<Vec<[i8; 4]>> = OnceLock::new();

    return PATTERN.get_or_init(|| {
        let mut rng = ChaCha8Rng::seed_from_u64(PATTERN_SEED);
        let r2 = PATCH_RADIUS * PATCH_RADIUS;

        let mut sample = || loop {
            let x = rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS);
            let y = rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS);

            if x * x + y * y <= r2 {
                break (x as i8, y as i8);
            }
        };

        return (0..DESCRIPTOR_BYTES * 8).map(|_| {
            let (x0, y0) = sample();
            let (x1, y1) = sample();
            [x0, y0, x1, y1]
        }).collect();
    });
}

impl<T: ImageData> Image<T> {
    fn non_maximum_suppression_kd(&self, keypoints: Vec<KeyPoint>, radius: f32) -> Vec<KeyPoint> {
        if keypoints.is_empty() {
            return keypoints;
        }

        let tree = kd_tree::KdTree::build_by_ordered_float(keypoints);

        return tree.iter().filter(|&p| {
            tree.within_radius(p, radius).iter().all(|q| p.score >= q.score)
        }).copied().collect::<Vec<KeyPoint>>();
    }

    fn fast_neighborhood(&self, i: usize, j: usize) -> [u8; 16] {
        return [
            self.get_pixel(j, i - 3)[0].to_u8(),
            self.get_pixel(j + 1, i - 3)[0].to_u8(),

            self.get_pixel(j + 2, i - 2)[0].to_u8(),

            self.get_pixel(j + 3, i - 1)[0].to_u8(),
            self.get_pixel(j + 3, i)[0].to_u8(),
            self.get_pixel(j + 3, i + 1)[0].to_u8(),

            self.get_pixel(j + 2, i + 2)[0].to_u8(),

            self.get_pixel(j + 1, i + 3)[0].to_u8(),
            self.get_pixel(j, i + 3)[0].to_u8(),
            self.get_pixel(j - 1, i + 3)[0].to_u8(),

            self.get_pixel(j - 2, i + 2)[0].to_u8(),

            self.get_pixel(j - 3, i + 1)[0].to_u8(),
            self.get_pixel(j - 3, i)[0].to_u8(),
            self.get_pixel(j - 3, i - 1)[0].to_u8(),

            self.get_pixel(j - 2, i - 2)[0].to_u8(),

            self.get_pixel(j - 1, i - 3)[0].to_u8(),
        ]
    }

    // Any arc of 9 or more circle pixels covers at least two compass points, 12 or more covers three
    fn fast_neighborhood_fast_check(&self, i: usize, j: usize, p_up: i32, p_down: i32, arc_length: usize) -> bool {
        let p0 = self.get_pixel(j, i - 3)[0].to_u8() as i32;
        let p1 = self.get_pixel(j + 3, i)[0].to_u8() as i32;
        let p2 = self.get_pixel(j, i + 3)[0].to_u8() as i32;
        let p3 = self.get_pixel(j - 3, i)[0].to_u8() as i32;

        let needed = if arc_length >= 12 { 3 } else { 2 };

        return (p0 > p_up) as u8 + (p1 > p_up) as u8 + (p2 > p_up) as u8 + (p3 > p_up) as u8 >= needed ||
               (p0 < p_down) as u8 + (p1 < p_down) as u8 + (p2 < p_down) as u8 + (p3 < p_down) as u8 >= needed;
    }

    // 0 -> lower, 1 -> none, 2 -> higher
    fn map_fast_pixel_value(p: u8, p_up: i32, p_down: i32) -> u8 {
        return 1 + ((p as i32) > p_up) as u8 - ((p as i32) < p_down) as u8;
    }

    fn fast_neighborhood_full_check(&self, i: usize, j: usize, p_up: i32, p_down: i32, arc_length: usize) -> bool {
        let n = self.fast_neighborhood(i, j).map(|p| Image::<T>::map_fast_pixel_value(p, p_up, p_down));

        for target in [0u8, 2u8] {
            let mut run = 0;

            // Walk the ring twice so arcs wrapping past index 15 are counted
            for idx in 0..32 {
                if n[idx % 16] == target {
                    run += 1;

                    if run >= arc_length {
                        return true;
                    }

                } else {
                    run = 0;
                }
            }
        }

        return false;
    }

    fn fast_score(&self, i: usize, j: usize) -> i32 {
        let p = self.get_pixel(j, i)[0].to_u8() as i32;
        return self.fast_neighborhood(i, j).into_iter().map(|n| (p - n as i32).abs()).sum();
    }

    /// FAST corners on a single-channel grayscale image, scanned row by row.
    pub fn fast(&self, t: i32, arc_length: usize, margin: usize) -> Vec<KeyPoint> {
        assert!(self.channels == 1 && self.color == ColorSpace::Gray);

        let mut res = vec!();
        let margin = margin.max(3);

        if self.height <= 2 * margin || self.width <= 2 * margin {
            return res;
        }

        for i in margin..self.height - margin {
            for j in margin..self.width - margin {
                let p = self.get_pixel(j, i)[0].to_u8() as i32;
                let p_up = p.saturating_add(t);
                let p_down = p.saturating_sub(t);

                if self.fast_neighborhood_fast_check(i, j, p_up, p_down, arc_length) &&
                   self.fast_neighborhood_full_check(i, j, p_up, p_down, arc_length) {
                    let mut kp = KeyPoint::new(j as f32, i as f32);
                    kp.score = self.fast_score(i, j);
                    res.push(kp);
                }
            }
        }

        return res;
    }

    /// Orientation from the intensity centroid of the disc around `kp`.
    pub fn compute_angle(&self, kp: &mut KeyPoint) {
        let xi = kp.x as i32;
        let yi = kp.y as i32;
        let r2 = PATCH_RADIUS * PATCH_RADIUS;

        let mut m10 = 0.0f32;
        let mut m01 = 0.0f32;

        for dy in -PATCH_RADIUS..=PATCH_RADIUS {
            for dx in -PATCH_RADIUS..=PATCH_RADIUS {
                if dx * dx + dy * dy > r2 {
                    continue;
                }

                let v = self.get_pixel((xi + dx) as usize, (yi + dy) as usize)[0].to_f32();
                m10 += dx as f32 * v;
                m01 += dy as f32 * v;
            }
        }

        kp.angle = m01.atan2(m10);
    }

    fn compute_rotated_brief(&self, kp: &KeyPoint) -> Descriptor {
        let mut res = [0u8; DESCRIPTOR_BYTES];
        let xi = kp.x as i32;
        let yi = kp.y as i32;
        let (s, c) = kp.angle.sin_cos();
        let pattern = brief_pattern();

        let sample = |x: i8, y: i8| {
            let rx = (x as f32 * c - y as f32 * s).round() as i32;
            let ry = (x as f32 * s + y as f32 * c).round() as i32;
            return self.get_pixel((xi + rx) as usize, (yi + ry) as usize)[0];
        };

        for i in 0..DESCRIPTOR_BYTES {
            let idx = i * 8;

            unroll! {
                for j in 0..8 {
                    let [x0, y0, x1, y1] = pattern[idx + j];
                    res[i] |= ((sample(x0, y0) < sample(x1, y1)) as u8) << j;
                }
            }
        }

        return Descriptor(res);
    }

    pub fn rotated_brief(&self, keypoints: &[KeyPoint]) -> Vec<Descriptor> {
        assert!(self.channels == 1 && self.color == ColorSpace::Gray);

        return keypoints.iter().map(|kp| self.compute_rotated_brief(kp)).collect();
    }
}

/// FAST corners with steered BRIEF descriptors, single scale.
#[derive(Clone, Debug, Default)]
pub struct OrbExtractor {
    config: OrbConfig,
}

impl OrbExtractor {
    pub fn new(config: OrbConfig) -> Self {
        return OrbExtractor { config };
    }

    /// Oriented keypoints of a grayscale image, strongest first.
    pub fn detect(&self, gray: &Image<u8>) -> Vec<KeyPoint> {
        let cfg = &self.config;
        let mut keypoints = gray.fast(cfg.fast_threshold, cfg.fast_arc_length, EDGE_MARGIN);
        let detected = keypoints.len();

        if cfg.nms_radius > 0.0 {
            keypoints = gray.non_maximum_suppression_kd(keypoints, cfg.nms_radius);
        }

        // Stable, so equal scores keep detector order
        keypoints.sort_by(|a, b| b.score.cmp(&a.score));
        keypoints.truncate(cfg.max_features);

        keypoints.iter_mut().for_each(|kp| gray.compute_angle(kp));

        trace!(detected, kept = keypoints.len(), "fast corners");

        return keypoints;
    }
}

impl FeatureExtractor for OrbExtractor {
    fn extract(&self, image: &Image<u8>) -> Result<FeatureSet> {
        if image.is_empty() {
            return Err(Error::Extraction(format!("region has zero area ({}x{})", image.width, image.height)));
        }

        if image.channels != 1 && image.channels != 3 {
            return Err(Error::Extraction(format!("unsupported number of channels ({})", image.channels)));
        }

        let gray = image.gray();
        let keypoints = self.detect(&gray);

        let mut smoothed = gray.clone();
        if self.config.blur_sigma > 0.0 {
            let window = ((self.config.blur_sigma * 1.5).ceil() as usize).max(1);
            smoothed.gaussian_blur(window, self.config.blur_sigma, Padding::Repeat);
        }

        let descriptors = smoothed.rotated_brief(&keypoints);

        return Ok(FeatureSet { keypoints, descriptors });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::textured_image;

    fn square_on_background() -> Image<u8> {
        let mut img = Image::<u8>::filled(80, 80, 1, 30);
        for i in 30..50 {
            for j in 25..55 {
                img.get_pixel_mut(j, i)[0] = 220;
            }
        }
        return img;
    }

    #[test]
    fn pattern_stays_inside_the_patch() {
        let pattern = brief_pattern();
        let r2 = PATCH_RADIUS * PATCH_RADIUS;

        assert_eq!(pattern.len(), DESCRIPTOR_BYTES * 8);
        for [x0, y0, x1, y1] in pattern.iter().copied() {
            assert!((x0 as i32).pow(2) + (y0 as i32).pow(2) <= r2);
            assert!((x1 as i32).pow(2) + (y1 as i32).pow(2) <= r2);
        }
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = Image::<u8>::filled(64, 64, 3, 120);
        let features = OrbExtractor::default().extract(&img).unwrap();

        assert!(features.is_empty());
        assert!(features.descriptors.is_empty());
    }

    #[test]
    fn square_corners_are_found() {
        let img = square_on_background();
        let features = OrbExtractor::default().extract(&img).unwrap();

        let corners = [(25.0, 30.0), (54.0, 30.0), (25.0, 49.0), (54.0, 49.0)];
        for (cx, cy) in corners {
            assert!(
                features.keypoints.iter().any(|kp| (kp.x - cx).abs() <= 2.0 && (kp.y - cy).abs() <= 2.0),
                "no keypoint near ({cx}, {cy})"
            );
        }
    }

    #[test]
    fn tiny_regions_yield_no_features() {
        let img = Image::<u8>::filled(10, 10, 3, 50);
        let features = OrbExtractor::default().extract(&img).unwrap();
        assert!(features.is_empty());
    }

    #[test]
    fn zero_area_region_is_an_error() {
        let img = Image::<u8>::zeros(0, 12, 3);
        assert!(matches!(OrbExtractor::default().extract(&img), Err(Error::Extraction(_))));
    }

    #[test]
    fn max_features_bounds_the_output_strongest_first() {
        let img = textured_image(160, 160, 3);
        let all = OrbExtractor::default().extract(&img).unwrap();
        assert!(all.len() > 10);

        let config = OrbConfig { max_features: 10, ..OrbConfig::default() };
        let few = OrbExtractor::new(config).extract(&img).unwrap();

        assert_eq!(few.len(), 10);
        assert_eq!(few.descriptors.len(), 10);
        assert!(few.keypoints.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(few.keypoints[0].score, all.keypoints[0].score);
    }

    #[test]
    fn extraction_is_deterministic_and_leaves_input_alone() {
        let img = textured_image(128, 128, 11);
        let before = img.clone();

        let a = OrbExtractor::default().extract(&img).unwrap();
        let b = OrbExtractor::default().extract(&img).unwrap();

        assert_eq!(a, b);
        assert_eq!(img, before);
    }

    #[test]
    fn nms_keeps_local_maxima_only() {
        let img = square_on_background();
        let gray = img.gray();

        let raw = gray.fast(20, 9, EDGE_MARGIN);
        let suppressed = gray.non_maximum_suppression_kd(raw.clone(), 3.0);

        assert!(!suppressed.is_empty());
        assert!(suppressed.len() <= raw.len());
    }

    #[test]
    fn extreme_thresholds_do_not_overflow() {
        let gray = square_on_background().gray();

        assert!(!gray.fast(1, 9, EDGE_MARGIN).is_empty());
        assert!(gray.fast(255, 9, EDGE_MARGIN).is_empty());
        assert!(gray.fast(i32::MAX, 12, EDGE_MARGIN).is_empty());

        let config = OrbConfig { fast_threshold: 255, ..OrbConfig::default() };
        assert!(OrbExtractor::new(config).extract(&textured_image(96, 96, 5)).unwrap().is_empty());
    }
}
