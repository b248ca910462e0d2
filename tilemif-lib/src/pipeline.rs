//! File to file conversions. Every function takes resolved paths and explicit
//! settings; picking the files is up to the caller.

use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use glam::UVec2;
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::{
    compose,
    config::Config,
    error::{Error, Result},
    extractor::{self, Extraction},
    interchange,
    mif::{self, MifDocument, MifImage},
    pixel::PixelCodec,
    quantize,
    renderer::{IndexRemap, TileRenderer},
    tile::{PackedAtlas, PackedTile, Tile},
    transform::{self, GroupReversal},
    utils::{write_all_atomic, write_atomic},
};

pub fn open_image<P: AsRef<Path>>(path: P) -> Result<RgbaImage> {
    let path = path.as_ref();
    log::debug!("reading image {}", path.display());
    return Ok(image::open(path)?.to_rgba8());
}

/// Encodes in memory first so a failed encode leaves no file behind
pub fn save_image<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path)?;
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image.clone()).write_to(&mut bytes, format)?;
    return write_atomic(path, bytes.get_ref());
}

/// What [`image_to_tiles`] produced
#[derive(Debug, Clone)]
pub struct TilesSummary {
    pub unique_tiles: usize,
    pub map_width: usize,
    pub map_height: usize,
}

/// Cuts an image into a deduplicated tiles file and a tilemap file
pub fn image_to_tiles<P: AsRef<Path>>(
    image_path: P,
    tiles_path: P,
    tilemap_path: P,
    config: &Config,
) -> Result<TilesSummary> {
    let image = open_image(image_path)?;
    let Extraction { atlas, tilemap } = extractor::extract(&image, config.extractor())?;
    let codec = config.codec();
    let packed = atlas.map_pixels(|&p| codec.encode(p));

    let tiles_csv = interchange::tiles_to_csv(&packed);
    let tilemap_csv = interchange::tilemap_to_csv(&tilemap);
    write_all_atomic(&[
        (tiles_path.as_ref(), tiles_csv.as_bytes()),
        (tilemap_path.as_ref(), tilemap_csv.as_bytes()),
    ])?;
    log::info!(
        "{} unique tiles in a {}x{} map",
        packed.len(),
        tilemap.width(),
        tilemap.height()
    );
    return Ok(TilesSummary {
        unique_tiles: packed.len(),
        map_width: tilemap.width(),
        map_height: tilemap.height(),
    });
}

/// Rebuilds an image from a tiles file and a tilemap file
pub fn tiles_to_image<P: AsRef<Path>, R: IndexRemap>(
    tiles_path: P,
    tilemap_path: P,
    image_path: P,
    remap: R,
    config: &Config,
) -> Result<()> {
    let atlas = interchange::read_tiles(tiles_path, config.tile_size)?;
    let tilemap = interchange::read_tilemap(tilemap_path)?;
    let image = TileRenderer::new(&atlas, config.blank.missing_tile())
        .with_remap(remap)
        .with_codec(config.codec())
        .render(&tilemap)?;
    return save_image(&image, image_path);
}

/// Tiles file to a MIF with one `16 * tile_size` bit word per tile row
pub fn tiles_to_mif<P: AsRef<Path>>(tiles_path: P, mif_path: P, base: usize, config: &Config) -> Result<MifImage> {
    let atlas = interchange::read_tiles(tiles_path, config.tile_size)?;
    let words = mif::tile_row_words(&atlas);
    return mif::write_mif(mif_path, mif::tile_row_width(config.tile_size), &words, base);
}

/// Tilemap file to a MIF with one 8 bit word per cell
pub fn tilemap_to_mif<P: AsRef<Path>>(tilemap_path: P, mif_path: P, base: usize) -> Result<MifImage> {
    let tilemap = interchange::read_tilemap(tilemap_path)?;
    let words = mif::tilemap_words(&tilemap)?;
    return mif::write_mif(mif_path, mif::TILEMAP_WIDTH, &words, base);
}

/// Tiles or sprite file to a MIF with one 16 bit word per pixel
pub fn sprites_to_mif<P: AsRef<Path>>(sprites_path: P, mif_path: P, base: usize, config: &Config) -> Result<MifImage> {
    let atlas = interchange::read_tiles(sprites_path, config.tile_size)?;
    let pixels: Vec<_> = atlas.iter().flat_map(|tile| tile.iter().copied()).collect();
    return mif::write_mif(mif_path, mif::PIXEL_WIDTH, &mif::pixel_words(&pixels), base);
}

/// Any binary blob to a MIF with one 8 bit word per byte
pub fn raw_to_mif<P: AsRef<Path>>(raw_path: P, mif_path: P, base: usize) -> Result<MifImage> {
    let bytes = fs::read(raw_path)?;
    return mif::write_mif(mif_path, 8, &mif::byte_words(&bytes), base);
}

fn sprite_from_image(image: &RgbaImage, codec: &PixelCodec, tile_size: u32) -> Result<PackedTile> {
    let (width, height) = image.dimensions();
    if (width, height) != (tile_size, tile_size) {
        return Err(Error::InputDimensionMismatch {
            width,
            height,
            expected: format!("sprites must be {tile_size}x{tile_size}"),
        });
    }
    let pixels = codec.encode_image(image);
    return Tile::from_pixels(tile_size, pixels).ok_or(Error::InputDimensionMismatch {
        width,
        height,
        expected: format!("sprites must be {tile_size}x{tile_size}"),
    });
}

/// Sprite images, in order, into one sprites file
pub fn images_to_sprites<P: AsRef<Path>, Q: AsRef<Path>>(image_paths: &[P], csv_path: Q, config: &Config) -> Result<usize> {
    let codec = config.codec();
    let mut sprites = Vec::with_capacity(image_paths.len());
    for path in image_paths {
        let image = open_image(path)?;
        sprites.push(sprite_from_image(&image, &codec, config.tile_size)?);
    }
    interchange::write_sprites(csv_path, &sprites)?;
    return Ok(sprites.len());
}

/// Decodes a sprite file into an image, as a preview
pub fn sprite_to_image<P: AsRef<Path>>(csv_path: P, image_path: P, config: &Config) -> Result<()> {
    let sprite = interchange::read_sprite(csv_path, config.tile_size)?;
    let image = config
        .codec()
        .decode_image(config.tile_size, config.tile_size, &sprite)?;
    return save_image(&image, image_path);
}

/// Splits a 16 bit sprite MIF back into `sprite_NN.png` files in `out_dir`
pub fn mif_to_sprites<P: AsRef<Path>>(mif_path: P, out_dir: P, config: &Config) -> Result<Vec<PathBuf>> {
    let doc = MifDocument::read(mif_path)?;
    let sprites = mif::sprites_from_words(&doc, config.tile_size)?;
    let codec = config.codec();
    fs::create_dir_all(&out_dir)?;
    let mut written = Vec::with_capacity(sprites.len());
    for (i, sprite) in sprites.iter().enumerate() {
        let image = codec.decode_image(config.tile_size, config.tile_size, sprite)?;
        let path = out_dir.as_ref().join(format!("sprite_{i:02}.png"));
        save_image(&image, &path)?;
        written.push(path);
    }
    log::info!("recovered {} sprites", written.len());
    return Ok(written);
}

/// Reads a tiles MIF of one word per tile row back into an atlas
pub fn mif_to_atlas<P: AsRef<Path>>(mif_path: P, tile_size: u32) -> Result<PackedAtlas> {
    let doc = MifDocument::read(mif_path)?;
    return mif::atlas_from_rows(&doc, tile_size);
}

pub fn reverse_groups<P: AsRef<Path>>(input: P, output: P, reversal: GroupReversal) -> Result<usize> {
    let doc = MifDocument::read(input)?;
    let reversed = reversal.apply_document(&doc)?;
    reversed.write(output)?;
    return Ok(reversed.entries.len());
}

pub fn reverse_nibbles<P: AsRef<Path>>(input: P, output: P) -> Result<usize> {
    let doc = MifDocument::read(input)?;
    let reversed = transform::reverse_document_nibbles(&doc);
    reversed.write(output)?;
    return Ok(reversed.entries.len());
}

/// Writes what the image looks like at RGB555T precision
pub fn quantize_image<P: AsRef<Path>>(input: P, output: P, opaque: bool, codec: &PixelCodec) -> Result<()> {
    let image = open_image(input)?;
    return save_image(&codec.quantize_image(&image, opaque), output);
}

pub fn count_colors<P: AsRef<Path>>(input: P, threshold: u8) -> Result<usize> {
    let image = open_image(input)?;
    return Ok(quantize::unique_colors(&image, threshold).len());
}

/// Centers `top` on `background`
pub fn overlay_images<P: AsRef<Path>>(background: P, top: P, output: P) -> Result<()> {
    let base = open_image(background)?;
    let top = open_image(top)?;
    return save_image(&compose::overlay_centered(&base, &top), output);
}

pub fn fit_image<P: AsRef<Path>>(input: P, output: P, size: u32, background: [u8; 4]) -> Result<()> {
    let image = open_image(input)?;
    return save_image(&compose::fit_to_tile(&image, size, background), output);
}

/// Letterboxes an image onto a background sized `canvas`
pub fn fit_canvas<P: AsRef<Path>>(input: P, output: P, canvas: UVec2, background: [u8; 4]) -> Result<()> {
    let image = open_image(input)?;
    return save_image(&compose::fit_to_canvas(&image, canvas, background), output);
}

/// Shrinks an image inside its own frame. `expanded` defaults to
/// [`compose::margin_canvas`] of the image size.
pub fn shrink_image<P: AsRef<Path>>(input: P, output: P, expanded: Option<UVec2>) -> Result<()> {
    let image = open_image(input)?;
    let expanded = expanded.unwrap_or_else(|| compose::margin_canvas(image.dimensions().into()));
    return save_image(&compose::shrink_with_margin(&image, expanded)?, output);
}

/// Cuts a strip image into `tile_NN.png` squares in `out_dir`
pub fn slice_image<P: AsRef<Path>>(input: P, out_dir: P) -> Result<Vec<PathBuf>> {
    let image = open_image(input)?;
    fs::create_dir_all(&out_dir)?;
    let mut written = Vec::new();
    for (i, tile) in compose::slice_strip(&image).iter().enumerate() {
        let path = out_dir.as_ref().join(format!("tile_{i:02}.png"));
        save_image(tile, &path)?;
        written.push(path);
    }
    return Ok(written);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::renderer::Identity;

    fn sample_image() -> RgbaImage {
        return RgbaImage::from_fn(48, 32, |x, y| {
            let cell = (x / 16 + y / 16) % 2;
            image::Rgba([(cell * 248) as u8, 8, 16, 255])
        });
    }

    #[test]
    fn image_tiles_image() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        save_image(&sample_image(), p("in.png")).unwrap();

        let config = Config::default();
        let summary = image_to_tiles(p("in.png"), p("tiles.csv"), p("tilemap.csv"), &config).unwrap();
        assert_eq!(summary.unique_tiles, 2);
        assert_eq!((summary.map_width, summary.map_height), (3, 2));

        tiles_to_image(p("tiles.csv"), p("tilemap.csv"), p("out.png"), Identity, &config).unwrap();
        assert_eq!(open_image(p("out.png")).unwrap(), sample_image());
    }

    #[test]
    fn failed_tilemap_write_leaves_no_tiles_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        save_image(&sample_image(), p("in.png")).unwrap();
        let result = image_to_tiles(p("in.png"), p("tiles.csv"), p("missing/tilemap.csv"), &Config::default());
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!p("tiles.csv").exists());
    }

    #[test]
    fn canvas_and_margin_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        save_image(&sample_image(), p("in.png")).unwrap();

        fit_canvas(p("in.png"), p("canvas.png"), UVec2::new(640, 480), compose::CLEAR).unwrap();
        let canvas = open_image(p("canvas.png")).unwrap();
        assert_eq!(canvas.dimensions(), (640, 480));
        assert_eq!(canvas.get_pixel(0, 0), sample_image().get_pixel(0, 0));
        assert_eq!(canvas.get_pixel(100, 100).0, compose::CLEAR);

        shrink_image(p("in.png"), p("small.png"), None).unwrap();
        let small = open_image(p("small.png")).unwrap();
        assert_eq!(small.dimensions(), (48, 32));
        assert_eq!(small.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn csv_to_mif_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        let config = Config::default();
        save_image(&sample_image(), p("in.png")).unwrap();
        image_to_tiles(p("in.png"), p("tiles.csv"), p("tilemap.csv"), &config).unwrap();

        let tiles = tiles_to_mif(p("tiles.csv"), p("tiles.mif"), 0x07D0, &config).unwrap();
        assert_eq!(tiles.width(), 256);
        assert_eq!(tiles.depth(), 32);
        let map = tilemap_to_mif(p("tilemap.csv"), p("tilemap.mif"), 0x04B0).unwrap();
        assert_eq!(map.depth(), 6);

        let atlas = mif_to_atlas(p("tiles.mif"), 16).unwrap();
        assert_eq!(atlas.len(), 2);
        let doc = MifDocument::read(p("tilemap.mif")).unwrap();
        assert_eq!(doc.words(), vec!["00", "01", "00", "01", "00", "01"]);
    }

    #[test]
    fn sprites_round_trip_through_mif() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        let config = Config::default();
        let red = RgbaImage::from_pixel(16, 16, image::Rgba([248, 0, 0, 255]));
        let clear = RgbaImage::from_pixel(16, 16, image::Rgba([0, 0, 0, 0]));
        save_image(&red, p("a.png")).unwrap();
        save_image(&clear, p("b.png")).unwrap();

        let count = images_to_sprites(&[p("a.png"), p("b.png")], p("sprites.csv"), &config).unwrap();
        assert_eq!(count, 2);
        let mif = sprites_to_mif(p("sprites.csv"), p("sprites.mif"), 0, &config).unwrap();
        assert_eq!(mif.depth(), 512);

        let written = mif_to_sprites(p("sprites.mif"), p("out"), &config).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(open_image(&written[0]).unwrap(), red);
        assert_eq!(open_image(&written[1]).unwrap(), clear);
    }

    #[test]
    fn wrong_sized_sprite_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        save_image(&RgbaImage::new(8, 8), p("small.png")).unwrap();
        let err = images_to_sprites(&[p("small.png")], p("s.csv"), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::InputDimensionMismatch { .. }));
        assert!(!p("s.csv").exists());
    }

    #[test]
    fn reverse_files() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        let words: Vec<String> = (0..40).map(|i| format!("{i:02X}")).collect();
        mif::write_mif(p("in.mif"), 8, &words, 0).unwrap();
        let kept = reverse_groups(p("in.mif"), p("out.mif"), GroupReversal::new(16, Default::default())).unwrap();
        assert_eq!(kept, 32);
        let doc = MifDocument::read(p("out.mif")).unwrap();
        assert_eq!(doc.entries[0].value, "10");
        assert_eq!(doc.header.depth, Some(40));

        assert_eq!(reverse_nibbles(p("in.mif"), p("same.mif")).unwrap(), 40);
        assert_eq!(MifDocument::read(p("same.mif")).unwrap().words(), MifDocument::read(p("in.mif")).unwrap().words());
    }

    #[test]
    fn raw_bytes_to_mif() {
        let dir = tempfile::tempdir().unwrap();
        let p = |name: &str| dir.path().join(name);
        fs::write(p("a.raw"), [1u8, 2, 255]).unwrap();
        let image = raw_to_mif(p("a.raw"), p("a.mif"), 0).unwrap();
        assert_eq!(image.words(), &["01", "02", "FF"]);
    }
}
