use acap::{vp::VpTree, NearestNeighbors, Proximity};

use crate::{
    colors::Gradient,
    features::FeatureSet,
    keypoints::{Descriptor, DistanceMetric, KeyPointShape},
    model::Image,
    typing::ImageData,
};

/// Pairing of `query.keypoints[query_idx]` with `train.keypoints[train_idx]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Correspondence {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

pub trait DescriptorMatcher {
    /// Nearest train descriptor for every query descriptor, in query order.
    ///
    /// Returns one correspondence per query descriptor, or nothing when either side is empty.
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> Vec<Correspondence>;
}

impl<M: DescriptorMatcher + ?Sized> DescriptorMatcher for Box<M> {
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> Vec<Correspondence> {
        return (**self).match_features(query, train);
    }
}

/// Exhaustive nearest neighbour; ties go to the lowest train index.
#[derive(Clone, Copy, Debug, Default)]
pub struct BruteForceMatcher {
    metric: DistanceMetric,
}

impl BruteForceMatcher {
    pub fn new(metric: DistanceMetric) -> Self {
        return BruteForceMatcher { metric };
    }
}

impl DescriptorMatcher for BruteForceMatcher {
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> Vec<Correspondence> {
        if query.descriptors.is_empty() || train.descriptors.is_empty() {
            return vec!();
        }

        return query.descriptors.iter().enumerate().map(|(query_idx, q)| {
            let mut best = Correspondence { query_idx, train_idx: 0, distance: f32::INFINITY };

            for (train_idx, t) in train.descriptors.iter().enumerate() {
                let distance = q.distance(t, self.metric);

                if distance < best.distance {
                    best.train_idx = train_idx;
                    best.distance = distance;
                }
            }

            best
        }).collect();
    }
}

#[derive(Clone, Copy)]
struct Indexed<'a> {
    idx: usize,
    descriptor: &'a Descriptor,
}

impl Proximity for Indexed<'_> {
    type Distance = i32;

    fn distance(&self, other: &Self) -> Self::Distance {
        self.descriptor.hamming(other.descriptor) as i32
    }
}

/// Nearest neighbour through a vantage-point tree built over the train set.
/// Hamming distance only, which is a true metric as the tree requires.
#[derive(Clone, Copy, Debug, Default)]
pub struct VpTreeMatcher;

impl DescriptorMatcher for VpTreeMatcher {
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> Vec<Correspondence> {
        if query.descriptors.is_empty() || train.descriptors.is_empty() {
            return vec!();
        }

        let tree = VpTree::from_iter(train.descriptors.iter().enumerate().map(|(idx, descriptor)| Indexed { idx, descriptor }));

        return query.descriptors.iter().enumerate().filter_map(|(query_idx, descriptor)| {
            let target = Indexed { idx: query_idx, descriptor };
            let nn = tree.k_nearest(&target, 1);

            nn.first().map(|n| Correspondence {
                query_idx,
                train_idx: n.item.idx,
                distance: n.distance as f32,
            })
        }).collect();
    }
}

/// Smallest and largest distance of a correspondence set.
pub fn distance_range(correspondences: &[Correspondence]) -> Option<(f32, f32)> {
    let first = correspondences.first()?.distance;

    return Some(correspondences.iter().fold((first, first), |(min, max), c| (min.min(c.distance), max.max(c.distance))));
}

/// Keeps correspondences closer than `factor` times the best distance of the set.
///
/// The best correspondences themselves always survive, so a set whose minimum is 0
/// keeps exactly its exact matches and a single correspondence is never dropped.
pub fn filter_matches(correspondences: &[Correspondence], factor: f32) -> Vec<Correspondence> {
    let Some((min_dist, _)) = distance_range(correspondences) else {
        return vec!();
    };

    let threshold = factor * min_dist;

    return correspondences.iter()
        .filter(|c| c.distance < threshold || c.distance == min_dist)
        .copied()
        .collect();
}

/// Both images side by side with every correspondence drawn as a line.
///
/// With `only_matched` the keypoints without a correspondence are left out and lines
/// are colored by distance instead of by index.
pub fn draw_matches<T: ImageData>(
    a: &Image<T>, features_a: &FeatureSet,
    b: &Image<T>, features_b: &FeatureSet,
    matches: &[Correspondence], only_matched: bool
) -> Image<T> {
    let mut stacked_image = a.to_three_channels().horizontal_stack(&b.to_three_channels());
    let offset = a.width as f32;

    if !only_matched {
        for kp in &features_a.keypoints {
            kp.draw(&mut stacked_image, (0, 255, 0), KeyPointShape::Dot);
        }

        for kp in &features_b.keypoints {
            let mut cpy = *kp;
            cpy.x += offset;
            cpy.draw(&mut stacked_image, (0, 255, 0), KeyPointShape::Dot);
        }
    }

    let (gradient, range) = if only_matched {
        (Gradient::distance_ramp(), distance_range(matches))
    } else {
        (Gradient::rainbow(), None)
    };

    for (i, m) in matches.iter().enumerate() {
        let frac = match range {
            Some((min, max)) if max > min => (m.distance - min) / (max - min),
            Some(_) => 0.0,
            None => i as f32 / matches.len().max(1) as f32
        };
        let color = gradient.get_color(frac);

        let kp_a = features_a.keypoints[m.query_idx];
        let mut kp_b = features_b.keypoints[m.train_idx];
        kp_b.x += offset;

        stacked_image.line(kp_a.x, kp_a.y, kp_b.x, kp_b.y, color);
        kp_a.draw(&mut stacked_image, color, KeyPointShape::Cross);
        kp_b.draw(&mut stacked_image, color, KeyPointShape::Cross);
    }

    return stacked_image;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::{KeyPoint, DESCRIPTOR_BYTES};

    fn c(query_idx: usize, distance: f32) -> Correspondence {
        Correspondence { query_idx, train_idx: query_idx, distance }
    }

    fn features(bytes: &[u8]) -> FeatureSet {
        FeatureSet {
            keypoints: (0..bytes.len()).map(|i| KeyPoint::new(i as f32 * 5.0, i as f32 * 3.0)).collect(),
            descriptors: bytes.iter().map(|b| Descriptor([*b; DESCRIPTOR_BYTES])).collect(),
        }
    }

    #[test]
    fn filter_of_nothing_is_nothing() {
        assert!(filter_matches(&[], 3.0).is_empty());
        assert!(distance_range(&[]).is_none());
    }

    #[test]
    fn filter_drops_distances_at_or_above_the_threshold() {
        let input = [c(0, 12.0), c(1, 4.0), c(2, 11.9), c(3, 30.0), c(4, 5.0)];
        let good = filter_matches(&input, 3.0);

        assert_eq!(good, vec!(c(1, 4.0), c(2, 11.9), c(4, 5.0)));
        assert!(good.iter().all(|g| g.distance < 12.0));
    }

    #[test]
    fn single_correspondence_is_kept() {
        assert_eq!(filter_matches(&[c(0, 7.0)], 3.0), vec!(c(0, 7.0)));
        assert_eq!(filter_matches(&[c(0, 0.0)], 3.0), vec!(c(0, 0.0)));
    }

    #[test]
    fn zero_minimum_keeps_only_exact_matches() {
        let input = [c(0, 0.0), c(1, 1.0), c(2, 0.0), c(3, 2.0)];
        assert_eq!(filter_matches(&input, 3.0), vec!(c(0, 0.0), c(2, 0.0)));
    }

    #[test]
    fn range_reports_extremes() {
        let input = [c(0, 3.0), c(1, 9.0), c(2, 1.5)];
        assert_eq!(distance_range(&input), Some((1.5, 9.0)));
    }

    #[test]
    fn brute_force_returns_one_match_per_query() {
        let query = features(&[0b0000_0000, 0b1111_0000, 0b0000_0011]);
        let train = features(&[0b1111_0001, 0b0000_0001]);

        let matches = BruteForceMatcher::default().match_features(&query, &train);

        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0], Correspondence { query_idx: 0, train_idx: 1, distance: 64.0 });
        assert_eq!(matches[1], Correspondence { query_idx: 1, train_idx: 0, distance: 64.0 });
        assert_eq!(matches[2], Correspondence { query_idx: 2, train_idx: 1, distance: 64.0 });
    }

    #[test]
    fn brute_force_ties_go_to_the_first_train_descriptor() {
        let query = features(&[0b0000_0000]);
        let train = features(&[0b0000_0001, 0b0000_0010]);

        let matches = BruteForceMatcher::new(DistanceMetric::Hamming).match_features(&query, &train);
        assert_eq!(matches[0].train_idx, 0);
    }

    #[test]
    fn empty_side_gives_no_matches() {
        let some = features(&[1, 2, 3]);
        let none = FeatureSet::default();

        assert!(BruteForceMatcher::default().match_features(&some, &none).is_empty());
        assert!(BruteForceMatcher::default().match_features(&none, &some).is_empty());
        assert!(VpTreeMatcher.match_features(&some, &none).is_empty());
        assert!(VpTreeMatcher.match_features(&none, &some).is_empty());
    }

    #[test]
    fn l2_metric_uses_byte_differences() {
        let query = features(&[10]);
        let train = features(&[13, 200]);

        let matches = BruteForceMatcher::new(DistanceMetric::L2).match_features(&query, &train);
        assert_eq!(matches[0].train_idx, 0);
        assert!((matches[0].distance - 3.0 * (DESCRIPTOR_BYTES as f32).sqrt()).abs() < 1e-3);
    }

    #[test]
    fn vp_tree_agrees_with_brute_force_distances() {
        let query = features(&[0, 7, 19, 255, 128, 64]);
        let train = features(&[1, 3, 200, 129, 66, 31, 254]);

        let brute = BruteForceMatcher::default().match_features(&query, &train);
        let tree = VpTreeMatcher.match_features(&query, &train);

        assert_eq!(brute.len(), tree.len());
        for (a, b) in brute.iter().zip(tree.iter()) {
            assert_eq!(a.query_idx, b.query_idx);
            assert_eq!(a.distance, b.distance);
        }
    }

    #[test]
    fn match_visualization_spans_both_images() {
        let a = Image::<u8>::zeros(10, 12, 3);
        let b = Image::<u8>::zeros(8, 6, 1);
        let fa = features(&[1, 2]);
        let fb = features(&[1, 2]);
        let matches = [c(0, 0.0), c(1, 2.0)];

        let full = draw_matches(&a, &fa, &b, &fb, &matches, false);
        let good = draw_matches(&a, &fa, &b, &fb, &matches, true);

        assert_eq!((full.width, full.height, full.channels), (18, 10, 3));
        assert_eq!((good.width, good.height), (18, 10));
        // closest match is drawn green in the filtered view
        assert_eq!(good.get_pixel(12, 0), &[0, 255, 0]);
    }
}
