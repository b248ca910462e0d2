//! The comma separated files exchanged with the rest of the asset pipeline.
//!
//! A tiles file holds `tile_size` rows of `tile_size` hex pixels per tile,
//! tiles back to back. A tilemap file holds one row of decimal tile ids per
//! map row.

use std::{fs, path::Path};

use crate::{
    error::{Error, Result},
    pixel::PackedPixel,
    tile::{PackedAtlas, PackedTile, Tile, TileId, Tilemap},
    utils::write_atomic,
};

/// Non-empty lines with their 1-based line numbers
fn records(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    return text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line.split(',').map(str::trim).collect()));
}

pub fn parse_tiles(text: &str, tile_size: u32) -> Result<PackedAtlas> {
    let n = tile_size as usize;
    let mut rows: Vec<(usize, Vec<PackedPixel>)> = Vec::new();
    for (line, fields) in records(text) {
        if fields.len() != n {
            return Err(Error::malformed(
                line,
                format!("expected {n} pixels but found {}", fields.len()),
            ));
        }
        let row = fields
            .iter()
            .map(|f| {
                PackedPixel::from_hex(f)
                    .ok_or_else(|| Error::malformed(line, format!("{f:?} is not a 16 bit hex word")))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push((line, row));
    }
    if n == 0 || rows.len() % n != 0 {
        let line = rows.last().map_or(0, |(line, _)| *line);
        return Err(Error::malformed(
            line,
            format!("{} rows is not a whole number of {n} row tiles", rows.len()),
        ));
    }

    let mut atlas = PackedAtlas::new(tile_size);
    for chunk in rows.chunks(n) {
        let pixels: Vec<PackedPixel> = chunk.iter().flat_map(|(_, row)| row.iter().copied()).collect();
        let tile = Tile::from_pixels(tile_size, pixels)
            .ok_or_else(|| Error::malformed(chunk[0].0, "incomplete tile"))?;
        atlas.push(tile)?;
    }
    log::debug!("read {} tiles", atlas.len());
    return Ok(atlas);
}

pub fn read_tiles<P: AsRef<Path>>(path: P, tile_size: u32) -> Result<PackedAtlas> {
    let text = fs::read_to_string(path)?;
    return parse_tiles(&text, tile_size);
}

fn tile_rows_csv<'a>(tiles: impl Iterator<Item = &'a PackedTile>) -> String {
    let mut out = String::new();
    for tile in tiles {
        for row in tile.rows() {
            let fields: Vec<String> = row.iter().map(|p| p.to_hex()).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }
    }
    return out;
}

pub fn tiles_to_csv(atlas: &PackedAtlas) -> String {
    return tile_rows_csv(atlas.iter());
}

pub fn write_tiles<P: AsRef<Path>>(path: P, atlas: &PackedAtlas) -> Result<()> {
    return write_atomic(path, tiles_to_csv(atlas).as_bytes());
}

pub fn parse_tilemap(text: &str) -> Result<Tilemap> {
    let mut rows: Vec<Vec<TileId>> = Vec::new();
    let mut width = None;
    for (line, fields) in records(text) {
        let row = fields
            .iter()
            .map(|f| {
                f.parse::<TileId>()
                    .map_err(|_| Error::malformed(line, format!("{f:?} is not a tile id")))
            })
            .collect::<Result<Vec<_>>>()?;
        let expected = *width.get_or_insert(row.len());
        if row.len() != expected {
            return Err(Error::malformed(
                line,
                format!("expected {expected} tile ids but found {}", row.len()),
            ));
        }
        rows.push(row);
    }
    return Tilemap::from_rows(rows);
}

pub fn read_tilemap<P: AsRef<Path>>(path: P) -> Result<Tilemap> {
    let text = fs::read_to_string(path)?;
    return parse_tilemap(&text);
}

pub fn tilemap_to_csv(tilemap: &Tilemap) -> String {
    let mut out = String::new();
    for row in tilemap.rows() {
        let fields: Vec<String> = row.iter().map(|id| id.to_string()).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    return out;
}

pub fn write_tilemap<P: AsRef<Path>>(path: P, tilemap: &Tilemap) -> Result<()> {
    return write_atomic(path, tilemap_to_csv(tilemap).as_bytes());
}

/// A sprite file is a tiles file holding exactly one tile
pub fn read_sprite<P: AsRef<Path>>(path: P, tile_size: u32) -> Result<PackedTile> {
    let atlas = read_tiles(path, tile_size)?;
    if atlas.len() != 1 {
        return Err(Error::malformed(
            0,
            format!("a sprite file holds one tile, found {}", atlas.len()),
        ));
    }
    return atlas
        .get(0)
        .cloned()
        .ok_or_else(|| Error::malformed(0, "empty sprite file"));
}

/// Several sprites back to back, duplicates kept
pub fn write_sprites<P: AsRef<Path>>(path: P, sprites: &[PackedTile]) -> Result<()> {
    return write_atomic(path, tile_rows_csv(sprites.iter()).as_bytes());
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_tiles() -> PackedAtlas {
        let a = Tile::from_pixels(2, vec![PackedPixel(0x8000), PackedPixel(1), PackedPixel(2), PackedPixel(0x7fff)]).unwrap();
        let b = Tile::filled(2, PackedPixel(0x001f));
        return PackedAtlas::from_tiles(2, vec![a, b]).unwrap();
    }

    #[test]
    fn tiles_file_layout() {
        let csv = tiles_to_csv(&two_tiles());
        assert_eq!(csv, "8000,0001\n0002,7fff\n001f,001f\n001f,001f\n");
        let back = parse_tiles(&csv, 2).unwrap();
        assert_eq!(back.tiles(), two_tiles().tiles());
    }

    #[test]
    fn tiles_file_accepts_crlf_and_uppercase() {
        let atlas = parse_tiles("8000,0001\r\n0002,7FFF\r\n", 2).unwrap();
        assert_eq!(atlas.len(), 1);
        assert_eq!(atlas.get(0).unwrap()[3], PackedPixel(0x7fff));
    }

    #[test]
    fn short_row_is_malformed() {
        let mut rows = vec!["0000"; 15].join(",");
        rows.push('\n');
        let err = parse_tiles(&rows, 16).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn partial_tile_is_malformed() {
        let err = parse_tiles("0000,0000\n0000,0000\n0000,0000\n", 2).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 3, .. }));
        let err = parse_tiles("0000,zzzz\n0000,0000\n", 2).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn tilemap_file_round_trip() {
        let tilemap = parse_tilemap("0,1,2\n3,4,125\n").unwrap();
        assert_eq!(tilemap.width(), 3);
        assert_eq!(tilemap.height(), 2);
        assert_eq!(tilemap_to_csv(&tilemap), "0,1,2\n3,4,125\n");
    }

    #[test]
    fn tilemap_file_errors() {
        assert!(matches!(
            parse_tilemap("0,1\n2\n"),
            Err(Error::MalformedRecord { line: 2, .. })
        ));
        assert!(matches!(
            parse_tilemap("0,x\n"),
            Err(Error::MalformedRecord { line: 1, .. })
        ));
    }

    #[test]
    fn sprite_file_holds_one_tile() {
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one.csv");
        let two = dir.path().join("two.csv");
        let atlas = two_tiles();
        write_sprites(&one, &atlas.tiles()[..1]).unwrap();
        write_tiles(&two, &atlas).unwrap();
        assert_eq!(&read_sprite(&one, 2).unwrap(), atlas.get(0).unwrap());
        assert!(read_sprite(&two, 2).is_err());
    }
}
