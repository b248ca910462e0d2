use std::{fs, path::Path};

use derive_more::IsVariant;
use glam::UVec2;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    extractor::ExtractorConfig,
    pixel::{PackedPixel, PixelCodec, TransparentColor},
    quantize::DEFAULT_COLOR_THRESHOLD,
    renderer::MissingTile,
    transform::{GroupReversal, TrailingGroup, DEFAULT_GROUP_SIZE},
    DEFAULT_TILE_SIZE,
};

/// Filler for cells whose tile id does not resolve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, IsVariant, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Blank {
    /// the all zero word
    #[default]
    OpaqueBlack,
    Transparent,
    /// any other packed word
    Word(u16),
    /// fail instead of drawing anything
    Error,
}

impl Blank {
    pub fn missing_tile(self) -> MissingTile {
        return match self {
            Blank::OpaqueBlack => MissingTile::Blank(PackedPixel::OPAQUE_BLACK),
            Blank::Transparent => MissingTile::Blank(PackedPixel::TRANSPARENT),
            Blank::Word(word) => MissingTile::Blank(PackedPixel(word)),
            Blank::Error => MissingTile::Error,
        };
    }
}

impl std::str::FromStr for Blank {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        return match s.trim().to_ascii_lowercase().as_str() {
            "opaque-black" | "black" => Ok(Blank::OpaqueBlack),
            "transparent" => Ok(Blank::Transparent),
            "error" => Ok(Blank::Error),
            other => PackedPixel::from_hex(other.trim_start_matches("0x"))
                .map(|p| Blank::Word(p.0))
                .ok_or_else(|| Error::parse(0, format!("{s:?} is not a blank tile filler"))),
        };
    }
}

/// Settings shared by every conversion. Missing fields take their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tile_size: u32,
    pub alpha_threshold: u8,
    pub transparent_color: TransparentColor,
    /// exact `[width, height]` required of background images
    pub canvas: Option<[u32; 2]>,
    pub tiles_base: usize,
    pub tilemap_base: usize,
    pub sprite_base: usize,
    pub group_size: usize,
    pub trailing_group: TrailingGroup,
    pub blank: Blank,
    pub color_threshold: u8,
}

impl Default for Config {
    fn default() -> Self {
        let codec = PixelCodec::default();
        return Self {
            tile_size: DEFAULT_TILE_SIZE,
            alpha_threshold: codec.alpha_threshold,
            transparent_color: codec.transparent_color,
            canvas: None,
            tiles_base: 0,
            tilemap_base: 0,
            sprite_base: 0,
            group_size: DEFAULT_GROUP_SIZE,
            trailing_group: TrailingGroup::Discard,
            blank: Blank::OpaqueBlack,
            color_threshold: DEFAULT_COLOR_THRESHOLD,
        };
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        return Ok(serde_json::from_str(text)?);
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading config from {}", path.display());
        return Self::from_json(&fs::read_to_string(path)?);
    }

    pub fn codec(&self) -> PixelCodec {
        return PixelCodec::new(self.alpha_threshold).with_transparent_color(self.transparent_color);
    }

    pub fn extractor(&self) -> ExtractorConfig {
        return ExtractorConfig {
            tile_size: self.tile_size,
            canvas: self.canvas.map(UVec2::from),
        };
    }

    pub fn group_reversal(&self) -> GroupReversal {
        return GroupReversal::new(self.group_size, self.trailing_group);
    }
}
