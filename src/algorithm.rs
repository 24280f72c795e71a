use crate::{model::{Image, ColorSpace}, typing::ImageData};

#[derive(Copy, Clone, Debug)]
pub enum Padding {
    Zeros, Repeat
}

impl<T: ImageData> Image<T> {
    pub fn to_single_channel(&self) -> Image<T> {
        assert!(self.color == ColorSpace::Gray);

        let mut res = Image::<T>::zeros(self.height, self.width, 1);
        res.data.iter_mut().zip(self.data.chunks_exact(self.channels)).for_each(|(a, b)| *a = b[0]);

        return res;
    }

    pub fn to_three_channels(&self) -> Image<T> {
        if self.channels == 3 {
            return self.clone();
        }

        assert!(self.channels == 1);

        let mut res = Image::<T>::zeros(self.height, self.width, 3);

        res.pixels().zip(self.data.iter()).for_each(|(a, b)| {
            a[0] = *b;
            a[1] = *b;
            a[2] = *b;
        });

        return res;
    }

    fn rgb_to_grayscale(&mut self) -> &mut Self {
        assert!(self.channels == 3 && self.color == ColorSpace::RGB);

        self.for_each_pixel_mut(|p| {
            let g = p[0].to_f32() * 0.299 +
                    p[1].to_f32() * 0.587 +
                    p[2].to_f32() * 0.114;

            let tg = T::from_f32(g);

            p[0] = tg;
            p[1] = tg;
            p[2] = tg;
        });

        self.color = ColorSpace::Gray;

        return self;
    }

    pub fn grayscale(&mut self) -> &mut Self {
        return match self.color {
            ColorSpace::Gray => self,
            ColorSpace::RGB => self.rgb_to_grayscale()
        };
    }

    /// Single-channel grayscale copy, whatever the source layout.
    pub fn gray(&self) -> Image<T> {
        let mut cpy = self.clone();

        if cpy.channels == 1 {
            cpy.color = ColorSpace::Gray;
            return cpy;
        }

        return cpy.grayscale().to_single_channel();
    }

    /// Deep copy of the `width`x`height` window whose top-left corner is `(x, y)`.
    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> Image<T> {
        assert!(x + width <= self.width && y + height <= self.height);

        let mut res = Image::<T>::zeros(height, width, self.channels);
        res.color = self.color;

        let row_len = width * self.channels;

        for (i, row) in res.data.chunks_exact_mut(row_len.max(1)).enumerate().take(height) {
            let start = ((y + i) * self.width + x) * self.channels;
            row.copy_from_slice(&self.data[start..start + row_len]);
        }

        return res;
    }

    /// Places `other` to the right of `self`; the shorter image is padded at the bottom.
    pub fn horizontal_stack(&self, other: &Image<T>) -> Image<T> {
        assert!(self.channels == other.channels);

        let height = self.height.max(other.height);
        let width = self.width + other.width;
        let mut res = Image::<T>::zeros(height, width, self.channels);
        res.color = self.color;

        for i in 0..height {
            for j in 0..width {
                let src = if j < self.width {
                    if i < self.height { Some(self.get_pixel(j, i)) } else { None }
                } else if i < other.height {
                    Some(other.get_pixel(j - self.width, i))
                } else {
                    None
                };

                if let Some(src) = src {
                    res.get_pixel_mut(j, i).copy_from_slice(src);
                }
            }
        }

        return res;
    }

    pub fn sliding_window<F>(&self, im: i32, jm: i32, height: i32, width: i32, padding: Padding, zeros: &[T], mut f: F) where F: FnMut(i32, i32, &[T]) {
        for i in (im - height)..(im + height + 1) {
            for j in (jm - width)..(jm + width + 1) {
                let wi = i + height - im;
                let wj = j + width - jm;

                if i >= 0 && j >= 0 && i < self.height as i32 && j < self.width as i32 {
                    f(wi, wj, self.get_pixel(j as usize, i as usize));

                } else {
                    match padding {
                        Padding::Zeros => f(wi, wj, zeros),

                        Padding::Repeat => {
                            f(wi, wj, self.get_pixel(
                                j.clamp(0, self.width as i32 - 1) as usize,
                                i.clamp(0, self.height as i32 - 1) as usize
                            ))
                        }
                    }
                }
            }
        }
    }

    pub fn convolution(&mut self, height: usize, width: usize, window: &[f32], padding: Padding) -> &mut Self {
        let side_w = width * 2 + 1;
        let side_h = height * 2 + 1;

        assert!(window.len() == side_h * side_w);

        let channels = self.channels;
        let cpy = self.clone();
        let zeros = vec!(T::min(); channels);
        let mut val = vec!(0.0; channels);

        for i in 0..self.height {
            for j in 0..self.width {
                val.iter_mut().for_each(|v| *v = 0.0);

                cpy.sliding_window(i as i32, j as i32, height as i32, width as i32, padding, &zeros, |wi, wj, p| {
                    let w_idx = side_w * wi as usize + wj as usize;

                    for c in 0..channels {
                        val[c] += p[c].to_f32() * window[w_idx];
                    }
                });

                let px = self.get_pixel_mut(j, i);

                for c in 0..channels {
                    px[c] = T::from_f32(val[c]);
                }
            }
        }

        return self;
    }

    pub fn gaussian_blur(&mut self, window: usize, sigma: f32, padding: Padding) -> &mut Self {
        let w_side = window * 2 + 1;
        let w_size = w_side * w_side;

        let mut kernel = vec!(0.0; w_size);
        let s2 = sigma.powf(2.0);

        for i in 0..w_side {
            for j in 0..w_side {
                let k_idx = i * w_side + j;
                let i_n = i as i32 - window as i32;
                let j_n = j as i32 - window as i32;

                kernel[k_idx] = (-((i_n * i_n + j_n * j_n) as f32) / (s2 + s2)).exp();
            }
        }

        let kernel_sum: f32 = kernel.iter().sum();
        kernel.iter_mut().for_each(|i| *i /= kernel_sum);

        return self.convolution(window, window, &kernel, padding);
    }
}
