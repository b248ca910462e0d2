//! Tile atlases, RGB555T pixels and MIF memory images for FPGA video
//! hardware.
//!
//! An image is cut into [`tile::Tile`]s, identical tiles are stored once in a
//! [`tile::TileAtlas`] and a [`tile::Tilemap`] records which tile goes where.
//! Atlases and tilemaps are written as comma separated interchange files
//! ([`interchange`]) or straight into ROM initialization files ([`mif`]).
//! [`renderer`] goes the other way and [`transform`] rearranges finished MIF
//! files for differently banked memories.

pub mod compose;
pub mod config;
pub mod error;
pub mod extractor;
pub mod interchange;
pub mod mif;
pub mod pipeline;
pub mod pixel;
pub mod quantize;
pub mod renderer;
pub mod tile;
pub mod transform;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
pub use pixel::{PackedPixel, PixelCodec};
pub use tile::{Tile, TileAtlas, TileId, Tilemap};

/// Side length in pixels of the tiles the video hardware draws
pub const DEFAULT_TILE_SIZE: u32 = 16;
