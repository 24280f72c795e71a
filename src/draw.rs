use crate::{typing::ImageData, model::Image};

pub type Color = (u8, u8, u8);

impl<T: ImageData> Image<T> {
    /// Writes `color` at `(x, y)`; out-of-bounds coordinates are ignored.
    pub fn put(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }

        let p = self.get_pixel_mut(x as usize, y as usize);

        if p.len() >= 3 {
            p[0] = T::from_u8(color.0);
            p[1] = T::from_u8(color.1);
            p[2] = T::from_u8(color.2);
        } else {
            let g = (color.0 as u32 * 299 + color.1 as u32 * 587 + color.2 as u32 * 114) / 1000;
            p[0] = T::from_u8(g as u8);
        }
    }

    // Float stepping is slow but only used for debug overlays
    pub fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Color) {
        let dx = x1 - x0;
        let dy = y1 - y0;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;

        for k in 0..=steps {
            let t = k as f32 / steps as f32;
            self.put((x0 + dx * t).round() as i32, (y0 + dy * t).round() as i32, color);
        }
    }

    pub fn circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        let steps = ((std::f32::consts::TAU * radius).ceil() as usize).max(8);

        for k in 0..steps {
            let a = std::f32::consts::TAU * k as f32 / steps as f32;
            self.put((cx + radius * a.cos()).round() as i32, (cy + radius * a.sin()).round() as i32, color);
        }
    }
}
