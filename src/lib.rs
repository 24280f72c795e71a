//! Grid-segmented image matching.
//!
//! Two images are cut into the same grid of cells; every pair of corresponding
//! cells gets ORB features, nearest-neighbour matches, a min-distance filter and
//! a RANSAC homography of its own.

pub mod typing;
pub mod model;
pub mod algorithm;
pub mod draw;
pub mod colors;
pub mod error;
pub mod config;
pub mod keypoints;
pub mod features;
pub mod segment;
pub mod matching;
pub mod homography;
pub mod pipeline;
pub mod render;
pub mod viewer;
pub mod logging;
pub mod timing;

#[cfg(test)]
mod test_utils;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use model::Image;
pub use pipeline::{MatchResult, Pipeline, PipelineOutput, RegionReport};

#[cfg(test)]
mod tests {
    use nalgebra::{Matrix3, Point2};

    use crate::{
        config::{GridShape, MatcherKind, OrbConfig},
        homography::project,
        render::{build_surfaces, save_surfaces},
        test_utils::{textured_image, translated},
        Error, Pipeline, PipelineConfig,
    };

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.orb = OrbConfig { max_features: 500, ..OrbConfig::default() };
        config.ransac.seed = Some(7);
        return config;
    }

    fn assert_close(a: &Matrix3<f64>, b: &Matrix3<f64>, tol: f64) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < tol, "{a} != {b}");
        }
    }

    #[test]
    fn identical_images_give_identity_everywhere() {
        let img = textured_image(240, 240, 11);
        let output = Pipeline::from_config(&config()).unwrap().run(&img, &img).unwrap();

        assert_eq!(output.reports.len(), 4);

        for r in &output.reports {
            assert!(r.result.failure.is_none(), "region {}: {:?}", r.index, r.result.failure);
            assert_eq!(r.features_1, r.features_2);

            let exact = r.result.matches.iter().filter(|c| c.distance == 0.0).count();
            assert!(exact * 2 > r.result.matches.len());

            assert_eq!(r.result.distance_range.map(|(min, _)| min), Some(0.0));
            assert!(r.result.good_matches.iter().all(|c| c.distance == 0.0));

            assert_close(&r.result.homography.unwrap(), &Matrix3::identity(), 1e-3);
        }
    }

    #[test]
    fn translated_copy_gives_translation_per_region() {
        let a = textured_image(240, 240, 12);
        let b = translated(&a, 6, 4, 40);

        let output = Pipeline::from_config(&config()).unwrap().run(&a, &b).unwrap();
        let expected = Matrix3::new(1.0, 0.0, 6.0, 0.0, 1.0, 4.0, 0.0, 0.0, 1.0);

        for r in &output.reports {
            let h = r.result.homography.unwrap_or_else(|| panic!("region {}: {:?}", r.index, r.result.failure));
            assert_close(&h, &expected, 0.05);

            let p = project(&h, &Point2::new(50.0, 60.0)).unwrap();
            assert!((p.x - 56.0).abs() < 0.5 && (p.y - 64.0).abs() < 0.5, "{p}");
        }
    }

    #[test]
    fn shift_inside_one_cell_only_moves_that_region() {
        let a = textured_image(240, 240, 17);
        let mut b = a.clone();
        let (dx, dy) = (5, 3);

        // Cell (0, 0) is 120x120; its content moves without crossing into siblings
        for y in 0..120 {
            for x in 0..120 {
                let px = if x >= dx && y >= dy { a.get_pixel(x - dx, y - dy).to_vec() } else { vec!(40, 40, 40) };
                b.get_pixel_mut(x, y).copy_from_slice(&px);
            }
        }

        let output = Pipeline::from_config(&config()).unwrap().run(&a, &b).unwrap();
        let shifted = Matrix3::new(1.0, 0.0, dx as f64, 0.0, 1.0, dy as f64, 0.0, 0.0, 1.0);

        let h0 = output.reports[0].result.homography.unwrap();
        assert_close(&h0, &shifted, 0.05);

        for r in &output.reports[1..] {
            let h = r.result.homography.unwrap_or_else(|| panic!("region {}: {:?}", r.index, r.result.failure));
            assert_close(&h, &Matrix3::identity(), 1e-3);
        }
    }

    #[test]
    fn vp_tree_run_matches_brute_force_geometry() {
        let a = textured_image(200, 200, 13);
        let b = translated(&a, -5, 3, 40);

        let mut cfg = config();
        let brute = Pipeline::from_config(&cfg).unwrap().run(&a, &b).unwrap();
        cfg.matcher.kind = MatcherKind::VpTree;
        let tree = Pipeline::from_config(&cfg).unwrap().run(&a, &b).unwrap();

        for (x, y) in brute.reports.iter().zip(&tree.reports) {
            assert_eq!(x.result.distance_range, y.result.distance_range);
            assert_eq!(x.result.good_matches.len(), y.result.good_matches.len());
        }
    }

    #[test]
    fn grid_shape_changes_the_number_of_pairs() {
        let img = textured_image(150, 210, 14);
        let mut cfg = config();
        cfg.grid = GridShape::new(3, 1);

        let output = Pipeline::from_config(&cfg).unwrap().run(&img, &img).unwrap();

        assert_eq!(output.reports.len(), 3);
        assert_eq!(output.regions_1[2].y, 100);
        assert_eq!(output.regions_1[2].width, 210);
        for (i, r) in output.reports.iter().enumerate() {
            assert_eq!((r.index, r.row, r.col), (i, i, 0));
        }
    }

    #[test]
    fn too_fine_grid_aborts_the_run() {
        let img = textured_image(30, 30, 15);
        let mut cfg = config();
        cfg.grid = GridShape::new(31, 2);

        let res = Pipeline::from_config(&cfg).unwrap().run(&img, &img);
        assert!(matches!(res, Err(Error::InvalidGrid { rows: 31, cols: 2, .. })));
    }

    #[test]
    fn every_surface_is_saved_as_png() {
        let a = textured_image(120, 160, 16);
        let b = translated(&a, 2, 2, 40);
        let output = Pipeline::from_config(&config()).unwrap().run(&a, &b).unwrap();

        let surfaces = build_surfaces(&a, &b, &output);
        let names: Vec<_> = surfaces.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(surfaces.len(), 2 + 4 * 4);
        assert_eq!(&names[..6], &["origin #1", "origin #2", "featImg #10", "featImg #20", "matchImg #0", "goodMatch #0"]);

        let dir = tempfile::tempdir().unwrap();
        let written = save_surfaces(&surfaces, dir.path()).unwrap();

        assert_eq!(written.len(), surfaces.len());
        assert!(dir.path().join("goodMatch_3.png").exists());
        assert!(dir.path().join("origin_2.png").exists());

        let reread = crate::Image::read(dir.path().join("matchImg_1.png")).unwrap();
        assert_eq!((reread.width, reread.height), (160, 60));
    }
}
