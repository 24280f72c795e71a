use serde::{Deserialize, Serialize};

use crate::{typing::ImageData, model::Image, draw::Color};

pub const DESCRIPTOR_BYTES: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    #[default]
    Hamming,
    L2
}

/// 512-bit steered BRIEF descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Descriptor(pub [u8; DESCRIPTOR_BYTES]);

impl Descriptor {
    pub fn hamming(&self, b: &Descriptor) -> u32 {
        return self.0.iter().zip(b.0.iter()).map(|(i, j)| (i ^ j).count_ones()).sum();
    }

    /// Euclidean distance with each byte taken as one vector component.
    pub fn l2(&self, b: &Descriptor) -> f32 {
        return self.0.iter().zip(b.0.iter())
                   .map(|(i, j)| (*i as f32 - *j as f32).powi(2))
                   .sum::<f32>()
                   .sqrt();
    }

    pub fn distance(&self, b: &Descriptor, metric: DistanceMetric) -> f32 {
        return match metric {
            DistanceMetric::Hamming => self.hamming(b) as f32,
            DistanceMetric::L2 => self.l2(b)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyPointShape {
    Dot, Cross, Rich
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,

    pub octave: usize,
    pub score: i32,
    pub angle: f32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32) -> KeyPoint {
        return KeyPoint { x, y, octave: 0, score: 0, angle: 0.0 };
    }

    /// Apparent diameter in pixels, doubling with each pyramid octave.
    pub fn size(&self) -> f32 {
        return 31.0 * (1 << self.octave) as f32;
    }

    fn get_shape_points(&self, shape: KeyPointShape) -> Vec<(i32, i32)> {
        let xi = self.x as i32;
        let yi = self.y as i32;

        return match shape {
            KeyPointShape::Dot => vec!(
                (xi - 1, yi - 1), (xi - 1, yi), (xi - 1, yi + 1),
                (xi, yi - 1), (xi, yi), (xi, yi + 1),
                (xi + 1, yi - 1), (xi + 1, yi), (xi + 1, yi + 1),
            ),

            KeyPointShape::Cross | KeyPointShape::Rich => vec!(
                (xi, yi),
                (xi - 1, yi - 1), (xi + 1, yi + 1),
                (xi - 1, yi + 1), (xi + 1, yi - 1),
                (xi - 2, yi - 2), (xi + 2, yi + 2),
                (xi - 2, yi + 2), (xi + 2, yi - 2)
            )
        }
    }

    pub fn draw<T: ImageData>(&self, image: &mut Image<T>, color: Color, shape: KeyPointShape) {
        for (j, i) in self.get_shape_points(shape) {
            image.put(j, i, color);
        }

        if shape == KeyPointShape::Rich {
            let r = self.size() / 2.0;
            image.circle(self.x, self.y, r, color);
            image.line(self.x, self.y, self.x + r * self.angle.cos(), self.y + r * self.angle.sin(), color);
        }
    }
}

impl kd_tree::KdPoint for KeyPoint {
    type Scalar = f32;
    type Dim = typenum::U2;

    fn at(&self, k: usize) -> f32 {
        return if k == 0 { self.x } else { self.y };
    }
}
