use glam::UVec2;
use image::RgbaImage;

use crate::{
    error::{Error, Result},
    tile::{RgbaAtlas, RgbaTile, Tile, Tilemap},
    utils::Grid,
};

/// The atlas and tilemap built from one image
#[derive(Debug, Clone)]
pub struct Extraction {
    pub atlas: RgbaAtlas,
    pub tilemap: Tilemap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub tile_size: u32,
    /// When set the image must be exactly this size
    pub canvas: Option<UVec2>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        return Self {
            tile_size: crate::DEFAULT_TILE_SIZE,
            canvas: None,
        };
    }
}

/// Number of tile columns and rows in an image of `image_dims`.
///
/// Nothing is trimmed, the image has to divide evenly into tiles.
pub fn tile_grid<U: Into<UVec2>>(image_dims: U, config: ExtractorConfig) -> Result<Grid> {
    let dims: UVec2 = image_dims.into();
    if let Some(canvas) = config.canvas {
        if dims != canvas {
            return Err(Error::InputDimensionMismatch {
                width: dims.x,
                height: dims.y,
                expected: format!("the canvas must be {}x{}", canvas.x, canvas.y),
            });
        }
    }
    let tile_size = config.tile_size;
    if tile_size == 0 || dims.x % tile_size != 0 || dims.y % tile_size != 0 {
        return Err(Error::InputDimensionMismatch {
            width: dims.x,
            height: dims.y,
            expected: format!("both sides must be multiples of the tile size {tile_size}"),
        });
    }
    return Ok(Grid(dims / tile_size));
}

/// Top left pixel of every tile, row-major
pub fn get_tile_locs(grid: Grid, tile_size: u32) -> Vec<UVec2> {
    return grid.iter_locs().map(|cell| cell * tile_size).collect();
}

fn pattern_at(image: &RgbaImage, loc: UVec2, tile_size: u32) -> RgbaTile {
    let pixels = Grid::new(tile_size, tile_size)
        .iter_locs()
        .map(|l| l + loc)
        .map(|l| image.get_pixel(l.x, l.y).0)
        .collect();
    return Tile::from_pixels(tile_size, pixels).expect("tile_size^2 pixels were collected");
}

/// Every tile of the image in grid order, without deduplication
pub fn tiles_in_order(image: &RgbaImage, config: ExtractorConfig) -> Result<Vec<RgbaTile>> {
    let grid = tile_grid(image.dimensions(), config)?;
    return Ok(get_tile_locs(grid, config.tile_size)
        .into_iter()
        .map(|loc| pattern_at(image, loc, config.tile_size))
        .collect());
}

/// Splits `image` into tiles, deduplicating them into an atlas.
///
/// Tiles are compared on their exact RGBA content before any color
/// conversion. Cells are visited row by row so the atlas order, and therefore
/// every id, only depends on the image.
pub fn extract(image: &RgbaImage, config: ExtractorConfig) -> Result<Extraction> {
    let tile_size = config.tile_size;
    let grid = tile_grid(image.dimensions(), config)?;
    let mut atlas = RgbaAtlas::new(tile_size);
    let mut tilemap = Tilemap::new(grid.x as usize, grid.y as usize);

    for cell in grid.iter_locs() {
        let pattern = pattern_at(image, cell * tile_size, tile_size);
        tilemap[cell] = atlas.insert(pattern)?;
    }

    log::debug!(
        "extracted {} unique tiles from a {}x{} tile grid",
        atlas.len(),
        grid.x,
        grid.y
    );
    return Ok(Extraction { atlas, tilemap });
}
