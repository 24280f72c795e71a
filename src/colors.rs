use crate::draw::Color;

/// Piecewise-linear color ramp over integer stop positions.
#[derive(Clone, Debug, Default)]
pub struct Gradient {
    colors: Vec<(Color, u32)>,
    min_pos: u32,
    max_pos: u32
}

impl Gradient {
    pub fn new() -> Gradient {
        return Gradient { colors: vec!(), min_pos: 0, max_pos: 0 };
    }

    pub fn add(&mut self, color: Color, position: u32) {
        self.colors.push((color, position));
        self.colors.sort_by_key(|(_, p)| *p);

        if let (Some(first), Some(last)) = (self.colors.first(), self.colors.last()) {
            self.min_pos = first.1;
            self.max_pos = last.1;
        }
    }

    /// Color at `frac` in `[0, 1]`; values outside are clamped.
    pub fn get_color(&self, frac: f32) -> Color {
        match self.colors.len() {
            0 => return (255, 255, 255),
            1 => return self.colors[0].0,
            _ => {}
        }

        let mut pos = frac.clamp(0.0, 1.0);
        pos *= (self.max_pos - self.min_pos) as f32;
        pos += self.min_pos as f32;

        let mut color_idx = self.colors.len() - 1;

        for (i, (_, p)) in self.colors.iter().enumerate() {
            if *p as f32 > pos {
                color_idx = i;
                break;
            }
        }

        color_idx = color_idx.max(1);

        let c1 = &self.colors[color_idx - 1];
        let c2 = &self.colors[color_idx];
        let span = (c2.1 - c1.1).max(1) as f32;
        let c_frac = ((pos - c1.1 as f32) / span).clamp(0.0, 1.0);

        return (
            (c1.0.0 as f32 * (1.0 - c_frac) + c2.0.0 as f32 * c_frac) as u8,
            (c1.0.1 as f32 * (1.0 - c_frac) + c2.0.1 as f32 * c_frac) as u8,
            (c1.0.2 as f32 * (1.0 - c_frac) + c2.0.2 as f32 * c_frac) as u8
        );
    }

    pub fn simple(colors: Vec<Color>) -> Gradient {
        let mut res = Gradient::new();

        for (i, c) in colors.into_iter().enumerate() {
            res.add(c, i as u32);
        }

        return res;
    }

    /// Green for the closest matches through yellow to red for the farthest.
    pub fn distance_ramp() -> Gradient {
        return Gradient::simple(vec!((0, 255, 0), (255, 255, 0), (255, 0, 0)));
    }

    /// Hue sweep used to tell neighbouring match lines apart.
    pub fn rainbow() -> Gradient {
        return Gradient::simple(vec!(
            (255, 0, 0), (255, 255, 0), (0, 255, 0), (0, 255, 255), (0, 0, 255), (255, 0, 255)
        ));
    }
}
