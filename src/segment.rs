use crate::{config::GridShape, error::{Error, Result}, model::Image, typing::ImageData};

/// One grid cell, carrying its own copy of the pixels it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct Region<T: ImageData = u8> {
    pub row: usize,
    pub col: usize,

    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,

    pub image: Image<T>
}

impl<T: ImageData> Region<T> {
    pub fn index(&self, grid: GridShape) -> usize {
        return self.row * grid.cols + self.col;
    }
}

/// Splits `image` into `grid.rows * grid.cols` equal cells in row-major order.
///
/// Cells are `floor(height / rows)` by `floor(width / cols)`; leftover rows and
/// columns at the bottom and right edges are dropped.
pub fn segment<T: ImageData>(image: &Image<T>, grid: GridShape) -> Result<Vec<Region<T>>> {
    let invalid = || Error::InvalidGrid { rows: grid.rows, cols: grid.cols, width: image.width, height: image.height };

    if grid.rows == 0 || grid.cols == 0 {
        return Err(invalid());
    }

    let cell_height = image.height / grid.rows;
    let cell_width = image.width / grid.cols;

    if cell_height == 0 || cell_width == 0 {
        return Err(invalid());
    }

    let mut regions = Vec::with_capacity(grid.cells());

    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let x = col * cell_width;
            let y = row * cell_height;

            regions.push(Region {
                row, col, x, y,
                width: cell_width,
                height: cell_height,
                image: image.crop(x, y, cell_width, cell_height)
            });
        }
    }

    return Ok(regions);
}
