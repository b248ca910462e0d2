use image::{Rgba, RgbaImage};
use tilemif_lib::{
    extractor::{self, ExtractorConfig},
    mif::{self, MifDocument},
    pixel::PixelCodec,
    renderer::{MissingTile, RangeRemap, TileRenderer},
    tile::Tilemap,
    transform::GroupReversal,
    Error, PackedPixel,
};

fn background() -> RgbaImage {
    // 4x3 tiles, three distinct patterns, a few pixels not on the 5 bit grid
    return RgbaImage::from_fn(64, 48, |x, y| {
        let (col, row) = (x / 16, y / 16);
        match (col + row) % 3 {
            0 => Rgba([250, 3, 77, 255]),
            1 => Rgba([(x % 16 * 7) as u8, (y % 16 * 5) as u8, 40, 255]),
            _ => Rgba([10, 200, 100, if (x + y) % 2 == 0 { 0 } else { 255 }]),
        }
    });
}

#[test]
fn image_survives_the_trip_through_mif_files() {
    let dir = tempfile::tempdir().unwrap();
    let image = background();
    let codec = PixelCodec::default();

    let extraction = extractor::extract(&image, ExtractorConfig::default()).unwrap();
    assert_eq!(extraction.atlas.len(), 3);
    assert_eq!((extraction.tilemap.width(), extraction.tilemap.height()), (4, 3));
    let packed = extraction.atlas.map_pixels(|&p| codec.encode(p));

    let tiles_path = dir.path().join("tiles.mif");
    let map_path = dir.path().join("tilemap.mif");
    mif::write_mif(&tiles_path, 256, &mif::tile_row_words(&packed), 0x07D0).unwrap();
    mif::write_mif(&map_path, 8, &mif::tilemap_words(&extraction.tilemap).unwrap(), 0x04B0).unwrap();

    let tiles_doc = MifDocument::read(&tiles_path).unwrap();
    let map_doc = MifDocument::read(&map_path).unwrap();
    assert_eq!(tiles_doc.start_address(), Some(0x07D0));
    assert_eq!(map_doc.start_address(), Some(0x04B0));

    let atlas = mif::atlas_from_rows(&tiles_doc, 16).unwrap();
    let tilemap = mif::tilemap_from_words(&map_doc, 4).unwrap();
    assert_eq!(tilemap, extraction.tilemap);

    let rendered = TileRenderer::new(&atlas, MissingTile::Error).render(&tilemap).unwrap();
    assert_eq!(rendered, codec.quantize_image(&image, false));
}

#[test]
fn windowed_tilemap_renders_with_blanks() {
    let atlas = tilemif_lib::TileAtlas::from_tiles(
        16,
        (0..13u16).map(|i| tilemif_lib::Tile::filled(16, PackedPixel(i + 1))),
    )
    .unwrap();
    let tilemap = Tilemap::from_rows(vec![vec![125, 137, 138], vec![0, 130, 9999]]).unwrap();

    let raster = TileRenderer::new(&atlas, MissingTile::Blank(PackedPixel::OPAQUE_BLACK))
        .with_remap(RangeRemap::new(125..138, -125))
        .render_packed(&tilemap)
        .unwrap();
    assert_eq!((raster.width, raster.height), (48, 32));
    let at = |x: u32, y: u32| raster.pixels[(y * raster.width + x) as usize];
    assert_eq!(at(0, 0), PackedPixel(1));
    assert_eq!(at(16, 0), PackedPixel(13));
    assert_eq!(at(32, 0), PackedPixel::OPAQUE_BLACK);
    assert_eq!(at(0, 16), PackedPixel::OPAQUE_BLACK);
    assert_eq!(at(20, 20), PackedPixel(6));
    assert_eq!(at(47, 31), PackedPixel::OPAQUE_BLACK);

    let strict = TileRenderer::new(&atlas, MissingTile::Error)
        .with_remap(RangeRemap::new(125..138, -125))
        .render_packed(&tilemap);
    assert!(matches!(strict, Err(Error::IndexOutOfRange { index: 138, .. })));
}

#[test]
fn sprite_rom_is_rebanked() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sprites.mif");
    let output = dir.path().join("banked.mif");
    let words: Vec<String> = (0..600u32).map(|i| format!("{i:04X}")).collect();
    mif::write_mif(&input, 16, &words, 0).unwrap();

    let doc = MifDocument::read(&input).unwrap();
    let banked = GroupReversal::default().apply_document(&doc).unwrap();
    banked.write(&output).unwrap();

    let back = MifDocument::read(&output).unwrap();
    assert_eq!(back.entries.len(), 512);
    assert_eq!(back.entries[0].address, 0);
    assert_eq!(back.entries[0].value, "0100");
    assert_eq!(back.entries[256].value, "0000");
    assert_eq!(back.entries[511].address, 511);
}
