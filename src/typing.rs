use std::fmt::Debug;

/// Pixel component type. `u8` spans 0..=255, `f32` spans 0.0..=1.0.
pub trait ImageData: Copy + PartialOrd + Debug + Send + Sync {
    fn to_u8(self) -> u8;
    fn to_f32(self) -> f32;

    fn from_u8(val: u8) -> Self;
    fn from_f32(val: f32) -> Self;

    fn min() -> Self;
}

const INV_255: f32 = 1.0 / 255.0;

impl ImageData for u8 {
    fn to_u8(self) -> u8 {
        return self;
    }

    fn to_f32(self) -> f32 {
        return self as f32 * INV_255;
    }

    fn from_u8(val: u8) -> Self {
        return val;
    }

    fn from_f32(val: f32) -> Self {
        return val.to_u8();
    }

    fn min() -> Self {
        return 0;
    }

}

impl ImageData for f32 {
    fn to_u8(self) -> u8 {
        return (self.clamp(0.0, 1.0) * 255.0).round() as u8;
    }

    fn to_f32(self) -> f32 {
        return self;
    }

    fn from_u8(val: u8) -> Self {
        return val.to_f32();
    }

    fn from_f32(val: f32) -> Self {
        return val;
    }

    fn min() -> Self {
        return 0.0;
    }

}
