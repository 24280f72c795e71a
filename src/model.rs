use std::{path::Path, slice::ChunksExactMut};

use ::image::{GenericImageView, RgbImage};

use crate::{error::{Error, Result}, typing::ImageData};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ColorSpace {
    RGB, Gray
}

/// Owned raster with interleaved channels, stored row by row.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T: ImageData> {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub color: ColorSpace,

    pub data: Vec<T>
}

impl<T: ImageData> Image<T> {
    pub fn zeros(height: usize, width: usize, channels: usize) -> Self {
        let color = if channels == 1 { ColorSpace::Gray } else { ColorSpace::RGB };
        return Image { height, width, channels, color, data: vec!(T::min(); height * width * channels) }
    }

    pub fn filled(height: usize, width: usize, channels: usize, value: T) -> Self {
        let mut res = Image::zeros(height, width, channels);
        res.data.iter_mut().for_each(|p| *p = value);
        return res;
    }

    pub fn is_empty(&self) -> bool {
        return self.width == 0 || self.height == 0;
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> &[T] {
        let idx = (self.width * y + x) * self.channels;
        return &self.data[idx..idx + self.channels];
    }

    pub fn get_pixel_mut(&mut self, x: usize, y: usize) -> &mut [T] {
        let idx = (self.width * y + x) * self.channels;
        return &mut self.data[idx..idx + self.channels];
    }

    pub fn pixels(&mut self) -> ChunksExactMut<T> {
        return self.data.chunks_exact_mut(self.channels);
    }

    pub fn for_each_pixel_mut<F: FnMut(&mut [T])>(&mut self, f: F) {
        self.pixels().for_each(f);
    }
}

impl Image<u8> {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = ::image::open(path).map_err(|source| Error::ImageLoad { path: path.to_path_buf(), source })?;
        let (width, height) = image.dimensions();

        return Ok(Image::from_rgb(&image.to_rgb8(), width as usize, height as usize));
    }

    fn from_rgb(rgb: &RgbImage, width: usize, height: usize) -> Self {
        let mut res = Image::<u8>::zeros(height, width, 3);

        for (to, from) in res.data.chunks_exact_mut(3).zip(rgb.as_raw().chunks_exact(3)) {
            to.copy_from_slice(from);
        }

        return res;
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        let mut buffer = Vec::with_capacity(self.width * self.height * 3);

        for p in self.data.chunks_exact(self.channels) {
            match self.channels {
                1 => buffer.extend_from_slice(&[p[0], p[0], p[0]]),
                _ => buffer.extend_from_slice(&p[..3])
            }
        }

        // Dimensions come from the buffer we just filled
        return RgbImage::from_raw(self.width as u32, self.height as u32, buffer)
            .unwrap_or_else(|| RgbImage::new(self.width as u32, self.height as u32));
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        return self.to_rgb_image().save(path).map_err(|source| Error::ImageSave { path: path.to_path_buf(), source });
    }
}
