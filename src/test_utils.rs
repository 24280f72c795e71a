use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::model::Image;

/// Dark RGB canvas scattered with gray rectangles, reproducible from `seed`.
pub fn textured_image(height: usize, width: usize, seed: u64) -> Image<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut img = Image::<u8>::filled(height, width, 3, 40);

    let count = (width * height / 500).max(1);

    for _ in 0..count {
        let w = rng.gen_range(6..24);
        let h = rng.gen_range(6..24);
        let x0 = rng.gen_range(0..width);
        let y0 = rng.gen_range(0..height);
        let v: u8 = rng.gen_range(90..=255);

        for y in y0..(y0 + h).min(height) {
            for x in x0..(x0 + w).min(width) {
                img.get_pixel_mut(x, y).copy_from_slice(&[v, v, v]);
            }
        }
    }

    return img;
}

/// Shifts `image` by (`dx`, `dy`), filling uncovered pixels with `fill`.
pub fn translated(image: &Image<u8>, dx: i32, dy: i32, fill: u8) -> Image<u8> {
    let mut out = Image::<u8>::filled(image.height, image.width, image.channels, fill);

    for y in 0..image.height as i32 {
        for x in 0..image.width as i32 {
            let (sx, sy) = (x - dx, y - dy);

            if sx >= 0 && sy >= 0 && sx < image.width as i32 && sy < image.height as i32 {
                let src = image.get_pixel(sx as usize, sy as usize).to_vec();
                out.get_pixel_mut(x as usize, y as usize).copy_from_slice(&src);
            }
        }
    }

    return out;
}
