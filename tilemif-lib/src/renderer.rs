use std::{collections::HashMap, ops::Range};

use derive_more::{From, IsVariant};
use glam::UVec2;
use image::RgbaImage;

use crate::{
    error::{Error, Result},
    pixel::{PackedPixel, PixelCodec},
    tile::{PackedAtlas, PackedTile, Tile, TileId, Tilemap},
    utils::{Area, Grid},
};

/// Maps a raw tilemap value to an atlas id. `None` means unresolved.
pub trait IndexRemap {
    fn remap(&self, raw: usize) -> Option<TileId>;
}

/// Raw values are atlas ids
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl IndexRemap for Identity {
    fn remap(&self, raw: usize) -> Option<TileId> {
        return Some(raw);
    }
}

/// An explicit table, anything not in it is unresolved
#[derive(Debug, Clone, Default, From)]
pub struct SparseRemap(pub HashMap<usize, TileId>);

impl IndexRemap for SparseRemap {
    fn remap(&self, raw: usize) -> Option<TileId> {
        return self.0.get(&raw).copied();
    }
}

/// Raw values in `raw` are shifted by `offset`, the rest are unresolved.
///
/// A tilemap exported against a bigger tileset usually only references a
/// window of it, `RangeRemap::new(125..138, -125)` maps that window onto an
/// atlas of 13 tiles.
#[derive(Debug, Clone)]
pub struct RangeRemap {
    pub raw: Range<usize>,
    pub offset: isize,
}

impl RangeRemap {
    pub fn new(raw: Range<usize>, offset: isize) -> Self {
        return Self { raw, offset };
    }
}

impl IndexRemap for RangeRemap {
    fn remap(&self, raw: usize) -> Option<TileId> {
        if !self.raw.contains(&raw) {
            return None;
        }
        let shifted = isize::try_from(raw).ok()?.checked_add(self.offset)?;
        return usize::try_from(shifted).ok();
    }
}

impl<F> IndexRemap for F
where
    F: Fn(usize) -> Option<TileId>,
{
    fn remap(&self, raw: usize) -> Option<TileId> {
        return self(raw);
    }
}

/// What to draw for a cell whose id does not resolve to an atlas tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum MissingTile {
    /// fill the cell with this word. `PackedPixel::OPAQUE_BLACK` is the
    /// all zero word, `PackedPixel::TRANSPARENT` leaves a see-through hole.
    Blank(PackedPixel),
    /// fail with `IndexOutOfRange`
    Error,
}

/// Packed pixels of a whole image, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<PackedPixel>,
}

/// Rebuilds an image from an atlas and a tilemap
pub struct TileRenderer<'a, R = Identity> {
    atlas: &'a PackedAtlas,
    remap: R,
    missing: MissingTile,
    codec: PixelCodec,
}

impl<'a> TileRenderer<'a, Identity> {
    pub fn new(atlas: &'a PackedAtlas, missing: MissingTile) -> Self {
        return Self {
            atlas,
            remap: Identity,
            missing,
            codec: PixelCodec::default(),
        };
    }
}

impl<'a, R: IndexRemap> TileRenderer<'a, R> {
    pub fn with_remap<R2: IndexRemap>(self, remap: R2) -> TileRenderer<'a, R2> {
        return TileRenderer {
            atlas: self.atlas,
            remap,
            missing: self.missing,
            codec: self.codec,
        };
    }

    pub fn with_codec(mut self, codec: PixelCodec) -> Self {
        self.codec = codec;
        return self;
    }

    fn resolve<'t>(&'t self, raw: usize, blank: Option<&'t PackedTile>) -> Result<&'t PackedTile> {
        let resolved = self.remap.remap(raw).and_then(|id| self.atlas.get(id));
        return match (resolved, blank) {
            (Some(tile), _) => Ok(tile),
            (None, Some(blank)) => {
                log::debug!("tile id {raw} does not resolve, drawing the blank tile");
                Ok(blank)
            }
            (None, None) => Err(Error::IndexOutOfRange {
                index: raw,
                len: self.atlas.len(),
            }),
        };
    }

    pub fn render_packed(&self, tilemap: &Tilemap) -> Result<PackedRaster> {
        let tile_size = self.atlas.tile_size();
        let grid = tilemap.grid();
        let dims = *grid * tile_size;
        let mut pixels = vec![PackedPixel::OPAQUE_BLACK; Grid::from(dims).area() as usize];

        let blank = match self.missing {
            MissingTile::Blank(filler) => Some(Tile::filled(tile_size, filler)),
            MissingTile::Error => None,
        };

        let mut fallbacks = 0;
        for cell in grid.iter_locs() {
            let raw = tilemap[cell];
            let tile = self.resolve(raw, blank.as_ref())?;
            if blank.as_ref().is_some_and(|b| std::ptr::eq(b, tile)) {
                fallbacks += 1;
            }
            let origin = cell * tile_size;
            for (y, row) in tile.rows().enumerate() {
                let start = ((origin.y + y as u32) * dims.x + origin.x) as usize;
                pixels[start..start + row.len()].copy_from_slice(row);
            }
        }
        if fallbacks > 0 {
            log::warn!("{fallbacks} cells referenced missing tiles and were drawn blank");
        }

        return Ok(PackedRaster {
            width: dims.x,
            height: dims.y,
            pixels,
        });
    }

    pub fn render(&self, tilemap: &Tilemap) -> Result<RgbaImage> {
        let raster = self.render_packed(tilemap)?;
        return self
            .codec
            .decode_image(raster.width, raster.height, &raster.pixels);
    }
}

/// Size in pixels of the image rendered from `tilemap`
pub fn rendered_dims(tilemap: &Tilemap, tile_size: u32) -> UVec2 {
    return *tilemap.grid() * tile_size;
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extractor::{extract, ExtractorConfig};

    fn five_tile_atlas() -> PackedAtlas {
        let tiles = (1..=5u16).map(|i| Tile::filled(2, PackedPixel(i)));
        return PackedAtlas::from_tiles(2, tiles).unwrap();
    }

    #[test]
    fn unknown_ids_render_the_blank_tile() {
        let atlas = five_tile_atlas();
        let tilemap = Tilemap::from_rows(vec![vec![0, 9999, 4]]).unwrap();
        let raster = TileRenderer::new(&atlas, MissingTile::Blank(PackedPixel::OPAQUE_BLACK))
            .render_packed(&tilemap)
            .unwrap();
        assert_eq!((raster.width, raster.height), (6, 2));
        let row: Vec<u16> = raster.pixels[..6].iter().map(|p| p.0).collect();
        assert_eq!(row, vec![1, 1, 0, 0, 5, 5]);

        let image = TileRenderer::new(&atlas, MissingTile::Blank(PackedPixel::OPAQUE_BLACK))
            .render(&tilemap)
            .unwrap();
        assert_eq!(image.get_pixel(2, 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn transparent_filler_is_explicit() {
        let atlas = five_tile_atlas();
        let tilemap = Tilemap::from_rows(vec![vec![7]]).unwrap();
        let image = TileRenderer::new(&atlas, MissingTile::Blank(PackedPixel::TRANSPARENT))
            .render(&tilemap)
            .unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn error_policy_reports_the_id() {
        let atlas = five_tile_atlas();
        let tilemap = Tilemap::from_rows(vec![vec![0, 5]]).unwrap();
        let err = TileRenderer::new(&atlas, MissingTile::Error)
            .render_packed(&tilemap)
            .unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 5, len: 5 }));
    }

    #[test]
    fn range_remap_shifts_a_window() {
        let remap = RangeRemap::new(125..138, -125);
        assert_eq!(remap.remap(125), Some(0));
        assert_eq!(remap.remap(137), Some(12));
        assert_eq!(remap.remap(124), None);
        assert_eq!(remap.remap(138), None);

        let atlas = five_tile_atlas();
        let tilemap = Tilemap::from_rows(vec![vec![126, 3]]).unwrap();
        let raster = TileRenderer::new(&atlas, MissingTile::Blank(PackedPixel::TRANSPARENT))
            .with_remap(remap)
            .render_packed(&tilemap)
            .unwrap();
        assert_eq!(raster.pixels[0], PackedPixel(2));
        assert_eq!(raster.pixels[2], PackedPixel::TRANSPARENT);
    }

    #[test]
    fn sparse_and_closure_remaps() {
        let sparse = SparseRemap::from(HashMap::from([(40, 1), (41, 0)]));
        assert_eq!(sparse.remap(40), Some(1));
        assert_eq!(sparse.remap(0), None);

        let atlas = five_tile_atlas();
        let tilemap = Tilemap::from_rows(vec![vec![0, 1]]).unwrap();
        let raster = TileRenderer::new(&atlas, MissingTile::Error)
            .with_remap(|raw: usize| Some(4 - raw))
            .render_packed(&tilemap)
            .unwrap();
        assert_eq!(raster.pixels[0], PackedPixel(5));
        assert_eq!(raster.pixels[2], PackedPixel(4));
    }

    #[test]
    fn render_inverts_extract() {
        // channels already multiples of 8, alpha 0 or 255
        let image = RgbaImage::from_fn(32, 16, |x, y| {
            let a = if (x + y) % 5 == 0 { 0 } else { 255 };
            image::Rgba([(x * 8) as u8, (y * 8) as u8, 64, a])
        });
        let extraction = extract(&image, ExtractorConfig { tile_size: 8, canvas: None }).unwrap();
        let codec = PixelCodec::default();
        let atlas = extraction.atlas.map_pixels(|&p| codec.encode(p));
        let rendered = TileRenderer::new(&atlas, MissingTile::Error)
            .render(&extraction.tilemap)
            .unwrap();
        assert_eq!(rendered, image);
        assert_eq!(rendered_dims(&extraction.tilemap, 8), UVec2::new(32, 16));
    }
}
