use std::{
    collections::HashMap,
    hash::Hash,
    ops::{Index, IndexMut},
};

use derive_more::Deref;
use glam::UVec2;

use crate::{
    error::{Error, Result},
    pixel::{PackedPixel, Rgba},
    utils::Grid,
};

/// A unique identifier for a tile, its position in the atlas
pub type TileId = usize;

/// A list of type T indexable by TileId
pub type IdMap<T> = Vec<T>;

/// An `N x N` block of pixels, row-major
#[derive(Deref, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tile<P> {
    #[deref]
    pixels: Vec<P>,
    size: u32,
}

pub type RgbaTile = Tile<Rgba>;
pub type PackedTile = Tile<PackedPixel>;

impl<P: Clone> Tile<P> {
    /// `None` unless there are exactly `size * size` pixels
    pub fn from_pixels(size: u32, pixels: Vec<P>) -> Option<Self> {
        if size == 0 || pixels.len() != (size * size) as usize {
            return None;
        }
        return Some(Self { pixels, size });
    }

    pub fn filled(size: u32, pixel: P) -> Self {
        return Self {
            pixels: vec![pixel; (size * size) as usize],
            size,
        };
    }

    pub fn size(&self) -> u32 {
        return self.size;
    }

    pub fn pixel(&self, loc: UVec2) -> &P {
        return &self.pixels[(loc.y * self.size + loc.x) as usize];
    }

    pub fn rows(&self) -> std::slice::Chunks<'_, P> {
        return self.pixels.chunks(self.size as usize);
    }

    pub fn map<Q>(&self, f: impl Fn(&P) -> Q) -> Tile<Q> {
        return Tile {
            pixels: self.pixels.iter().map(f).collect(),
            size: self.size,
        };
    }

    pub fn into_pixels(self) -> Vec<P> {
        return self.pixels;
    }
}

/// Unique tiles in order of first appearance.
///
/// Ids are positions in the arena and never change once handed out. The hash
/// index always points at the first tile with a given content.
#[derive(Debug, Clone)]
pub struct TileAtlas<P> {
    tile_size: u32,
    tiles: IdMap<Tile<P>>,
    frequencies: IdMap<usize>,
    ids: HashMap<Tile<P>, TileId>,
}

pub type RgbaAtlas = TileAtlas<Rgba>;
pub type PackedAtlas = TileAtlas<PackedPixel>;

impl<P: Clone + Eq + Hash> TileAtlas<P> {
    pub fn new(tile_size: u32) -> Self {
        return Self {
            tile_size,
            tiles: IdMap::new(),
            frequencies: IdMap::new(),
            ids: HashMap::new(),
        };
    }

    /// Builds an atlas that keeps every tile as given, duplicates included
    pub fn from_tiles(tile_size: u32, tiles: impl IntoIterator<Item = Tile<P>>) -> Result<Self> {
        let mut atlas = Self::new(tile_size);
        for tile in tiles {
            atlas.push(tile)?;
        }
        return Ok(atlas);
    }

    fn check_size(&self, tile: &Tile<P>) -> Result<()> {
        if tile.size() != self.tile_size {
            return Err(Error::InputDimensionMismatch {
                width: tile.size(),
                height: tile.size(),
                expected: format!("the atlas holds {0}x{0} tiles", self.tile_size),
            });
        }
        return Ok(());
    }

    /// Returns the id of an identical tile if there is one, otherwise appends
    /// `tile` with the next free id.
    pub fn insert(&mut self, tile: Tile<P>) -> Result<TileId> {
        self.check_size(&tile)?;
        if let Some(&existing_id) = self.ids.get(&tile) {
            self.frequencies[existing_id] += 1;
            return Ok(existing_id);
        }
        let id = self.tiles.len();
        log::trace!("new tile {id}");
        self.ids.insert(tile.clone(), id);
        self.tiles.push(tile);
        self.frequencies.push(1);
        return Ok(id);
    }

    /// Appends without deduplicating
    pub fn push(&mut self, tile: Tile<P>) -> Result<TileId> {
        self.check_size(&tile)?;
        let id = self.tiles.len();
        self.ids.entry(tile.clone()).or_insert(id);
        self.tiles.push(tile);
        self.frequencies.push(1);
        return Ok(id);
    }

    pub fn id_of(&self, tile: &Tile<P>) -> Option<TileId> {
        return self.ids.get(tile).copied();
    }

    /// Converts every pixel while keeping every id where it was
    pub fn map_pixels<Q: Clone + Eq + Hash>(&self, f: impl Fn(&P) -> Q) -> TileAtlas<Q> {
        let mut atlas = TileAtlas::new(self.tile_size);
        for (tile, &freq) in self.tiles.iter().zip(&self.frequencies) {
            let id = atlas.tiles.len();
            let mapped = tile.map(&f);
            atlas.ids.entry(mapped.clone()).or_insert(id);
            atlas.tiles.push(mapped);
            atlas.frequencies.push(freq);
        }
        return atlas;
    }
}

impl<P> TileAtlas<P> {
    pub fn tile_size(&self) -> u32 {
        return self.tile_size;
    }

    pub fn len(&self) -> usize {
        return self.tiles.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.tiles.is_empty();
    }

    pub fn get(&self, id: TileId) -> Option<&Tile<P>> {
        return self.tiles.get(id);
    }

    pub fn tiles(&self) -> &[Tile<P>] {
        return &self.tiles;
    }

    /// How many grid cells used each tile while the atlas was built
    pub fn frequencies(&self) -> &[usize] {
        return &self.frequencies;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tile<P>> {
        return self.tiles.iter();
    }
}

/// A grid of atlas ids, `height` rows of `width` ids each
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tilemap {
    rows: Vec<Vec<TileId>>,
    width: usize,
}

impl Tilemap {
    pub fn new(width: usize, height: usize) -> Self {
        return Self {
            rows: vec![vec![0; width]; height],
            width,
        };
    }

    /// Fails with `MalformedRecord` when the rows are ragged
    pub fn from_rows(rows: Vec<Vec<TileId>>) -> Result<Self> {
        let width = rows.first().map_or(0, |row| row.len());
        if let Some((line, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(Error::malformed(
                line + 1,
                format!("expected {width} tile ids but found {}", row.len()),
            ));
        }
        return Ok(Self { rows, width });
    }

    pub fn width(&self) -> usize {
        return self.width;
    }

    pub fn height(&self) -> usize {
        return self.rows.len();
    }

    pub fn grid(&self) -> Grid {
        return Grid::new(self.width as u32, self.height() as u32);
    }

    pub fn get(&self, loc: UVec2) -> Option<TileId> {
        return self
            .rows
            .get(loc.y as usize)
            .and_then(|row| row.get(loc.x as usize))
            .copied();
    }

    pub fn rows(&self) -> &[Vec<TileId>] {
        return &self.rows;
    }

    /// All ids, row by row
    pub fn cells(&self) -> impl Iterator<Item = TileId> + '_ {
        return self.rows.iter().flatten().copied();
    }
}

impl Index<UVec2> for Tilemap {
    type Output = TileId;
    fn index(&self, index: UVec2) -> &Self::Output {
        return &self.rows[index.y as usize][index.x as usize];
    }
}

impl IndexMut<UVec2> for Tilemap {
    fn index_mut(&mut self, index: UVec2) -> &mut Self::Output {
        return &mut self.rows[index.y as usize][index.x as usize];
    }
}
