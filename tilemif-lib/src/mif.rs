//! Reading and writing Memory Initialization Files.
//!
//! ```text
//! WIDTH=16;
//! DEPTH=2;
//! ADDRESS_RADIX=HEX;
//! DATA_RADIX=HEX;
//! CONTENT BEGIN
//! 0004 : 0001;
//! 0005 : 8002;
//! END;
//! ```
//!
//! Addresses are always 4 hex digits, so nothing past `0xFFFF` can be
//! written.

use std::{fmt::Write, fs, ops::Range, path::Path};

use crate::{
    error::{Error, Result},
    pixel::PackedPixel,
    tile::{PackedAtlas, PackedTile, Tile, Tilemap},
    utils::write_atomic,
};

pub const MAX_ADDRESS: usize = 0xFFFF;
/// Bits in one packed pixel word
pub const PIXEL_WIDTH: u32 = 16;
/// Bits in one tilemap word
pub const TILEMAP_WIDTH: u32 = 8;

fn is_hex(s: &str) -> bool {
    return !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit());
}

fn check_addresses(base: usize, len: usize) -> Result<()> {
    if len == 0 {
        if base > MAX_ADDRESS {
            return Err(Error::AddressOverflow { address: base });
        }
        return Ok(());
    }
    let last = base
        .checked_add(len - 1)
        .ok_or(Error::AddressOverflow { address: usize::MAX })?;
    if last > MAX_ADDRESS {
        return Err(Error::AddressOverflow { address: last });
    }
    return Ok(());
}

fn data_line(out: &mut String, address: usize, value: &str) {
    let _ = writeln!(out, "{address:04X} : {value};");
}

/// An ordered run of words about to be written as a MIF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MifImage {
    width: u32,
    start_address: usize,
    words: Vec<String>,
}

impl MifImage {
    /// Validates and normalizes `words` to uppercase, zero padded to the
    /// digit count of `width`.
    pub fn new<S: AsRef<str>>(width: u32, start_address: usize, words: &[S]) -> Result<Self> {
        if width == 0 {
            return Err(Error::parse(0, "WIDTH must be at least 1 bit"));
        }
        let digits = width.div_ceil(4) as usize;
        let mut normalized = Vec::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            let word = word.as_ref().trim();
            if !is_hex(word) {
                return Err(Error::parse(i + 1, format!("{word:?} is not a hex word")));
            }
            if word.len() > digits {
                return Err(Error::parse(
                    i + 1,
                    format!("{word} has more than {digits} digits for WIDTH={width}"),
                ));
            }
            normalized.push(format!("{:0>digits$}", word.to_ascii_uppercase()));
        }
        check_addresses(start_address, normalized.len())?;
        return Ok(Self {
            width,
            start_address,
            words: normalized,
        });
    }

    pub fn width(&self) -> u32 {
        return self.width;
    }

    /// Always the number of words
    pub fn depth(&self) -> usize {
        return self.words.len();
    }

    pub fn start_address(&self) -> usize {
        return self.start_address;
    }

    pub fn words(&self) -> &[String] {
        return &self.words;
    }

    pub fn addresses(&self) -> Range<usize> {
        return self.start_address..self.start_address + self.words.len();
    }

    pub fn to_mif_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "WIDTH={};", self.width);
        let _ = writeln!(out, "DEPTH={};", self.depth());
        out.push_str("ADDRESS_RADIX=HEX;\n");
        out.push_str("DATA_RADIX=HEX;\n");
        out.push_str("CONTENT BEGIN\n");
        for (address, word) in self.addresses().zip(&self.words) {
            data_line(&mut out, address, word);
        }
        out.push_str("END;\n");
        return out;
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        log::info!(
            "writing {} words of {} bits at {:04X} to {}",
            self.depth(),
            self.width,
            self.start_address,
            path.as_ref().display()
        );
        return write_atomic(path, self.to_mif_string().as_bytes());
    }
}

/// Builds and writes a MIF in one go. Nothing is written if any word or
/// address is invalid.
pub fn write_mif<P: AsRef<Path>, S: AsRef<str>>(
    path: P,
    width: u32,
    words: &[S],
    start_address: usize,
) -> Result<MifImage> {
    let image = MifImage::new(width, start_address, words)?;
    image.write(path)?;
    return Ok(image);
}

/// Header fields, informational only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MifHeader {
    pub width: Option<u32>,
    pub depth: Option<usize>,
    pub address_radix: Option<String>,
    pub data_radix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MifEntry {
    pub address: usize,
    /// hex digits as they appear in the file
    pub value: String,
}

/// A parsed MIF. The header lines are kept verbatim so the file can be
/// written back after its data was rearranged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MifDocument {
    pub header_lines: Vec<String>,
    pub header: MifHeader,
    pub entries: Vec<MifEntry>,
}

fn strip_comment(line: &str) -> &str {
    return match line.find("--") {
        Some(idx) => &line[..idx],
        None => line,
    };
}

/// Header values are informational, a bad one is logged and left unset
fn parse_header_field(header: &mut MifHeader, line: &str, line_no: usize) {
    let Some((key, value)) = line.split_once('=') else {
        return;
    };
    let key = key.trim().to_ascii_uppercase();
    let value = value.trim().trim_end_matches(';').trim();
    match key.as_str() {
        "WIDTH" => {
            header.width = value.parse::<u64>().ok().and_then(|v| u32::try_from(v).ok());
            if header.width.is_none() {
                log::warn!("line {line_no}: ignoring WIDTH value {value:?}");
            }
        }
        "DEPTH" => {
            header.depth = value.parse::<usize>().ok();
            if header.depth.is_none() {
                log::warn!("line {line_no}: ignoring DEPTH value {value:?}");
            }
        }
        "ADDRESS_RADIX" => header.address_radix = Some(value.to_string()),
        "DATA_RADIX" => header.data_radix = Some(value.to_string()),
        _ => log::trace!("ignoring header field {key}"),
    }
}

/// `Some` for any line holding both `:` and `;`
pub fn parse_data_line(line: &str, line_no: usize) -> Option<Result<MifEntry>> {
    let line = strip_comment(line);
    if !(line.contains(':') && line.contains(';')) {
        return None;
    }
    let (address, value) = line.split_once(':')?;
    let address = address.trim();
    let value = value.trim().trim_end_matches(';').trim();
    let entry = usize::from_str_radix(address, 16)
        .map_err(|_| Error::parse(line_no, format!("address {address:?} is not hex")))
        .and_then(|address| {
            if is_hex(value) {
                Ok(MifEntry {
                    address,
                    value: value.to_string(),
                })
            } else {
                Err(Error::parse(line_no, format!("data {value:?} is not hex")))
            }
        });
    return Some(entry);
}

impl MifDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let mut header_lines = Vec::new();
        let mut header = MifHeader::default();
        let mut entries = Vec::new();
        let mut in_content = false;
        let mut in_data = false;

        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            if let Some(entry) = parse_data_line(line, line_no) {
                entries.push(entry?);
                in_data = true;
                continue;
            }
            // everything up to the first data line, `BEGIN` included, is header
            if in_data {
                continue;
            }
            if !in_content {
                if line.trim().to_ascii_uppercase().starts_with("CONTENT") {
                    in_content = true;
                } else {
                    parse_header_field(&mut header, strip_comment(line), line_no);
                }
            }
            header_lines.push(line.to_string());
        }

        if let Some(depth) = header.depth {
            if depth != entries.len() {
                log::debug!("DEPTH={depth} but {} data lines were found", entries.len());
            }
        }
        return Ok(Self {
            header_lines,
            header,
            entries,
        });
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        return Self::parse(&text);
    }

    pub fn words(&self) -> Vec<&str> {
        return self.entries.iter().map(|e| e.value.as_str()).collect();
    }

    pub fn start_address(&self) -> Option<usize> {
        return self.entries.first().map(|e| e.address);
    }

    /// Header lines as read, then one canonical line per entry, then `END;`
    pub fn to_mif_string(&self) -> Result<String> {
        let mut out = String::new();
        for line in &self.header_lines {
            out.push_str(line);
            out.push('\n');
        }
        for entry in &self.entries {
            if entry.address > MAX_ADDRESS {
                return Err(Error::AddressOverflow {
                    address: entry.address,
                });
            }
            data_line(&mut out, entry.address, &entry.value);
        }
        out.push_str("END;\n");
        return Ok(out);
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = self.to_mif_string()?;
        return write_atomic(path, text.as_bytes());
    }
}

/// Shorthand for [`MifDocument::read`]
pub fn read_mif<P: AsRef<Path>>(path: P) -> Result<MifDocument> {
    return MifDocument::read(path);
}

/// One word per tile row, the packed pixels of the row concatenated with the
/// leftmost pixel in the most significant position. 16 pixel tiles give 256
/// bit words.
pub fn tile_row_words(atlas: &PackedAtlas) -> Vec<String> {
    return atlas
        .iter()
        .flat_map(|tile| tile.rows())
        .map(|row| row.iter().map(|p| p.to_hex_upper()).collect())
        .collect();
}

/// Word width in bits for [`tile_row_words`]
pub fn tile_row_width(tile_size: u32) -> u32 {
    return tile_size * PIXEL_WIDTH;
}

/// One 8 bit word per cell, row by row
pub fn tilemap_words(tilemap: &Tilemap) -> Result<Vec<String>> {
    return tilemap
        .cells()
        .map(|id| {
            if id > 0xFF {
                return Err(Error::IndexOutOfRange { index: id, len: 0x100 });
            }
            Ok(format!("{id:02X}"))
        })
        .collect();
}

/// One 16 bit word per pixel
pub fn pixel_words(pixels: &[PackedPixel]) -> Vec<String> {
    return pixels.iter().map(|p| p.to_hex_upper()).collect();
}

/// One 8 bit word per byte
pub fn byte_words(bytes: &[u8]) -> Vec<String> {
    return bytes.iter().map(|b| format!("{b:02X}")).collect();
}

/// Splits a wide word into packed pixels, most significant first
pub fn word_pixels(word: &str, line_no: usize) -> Result<Vec<PackedPixel>> {
    if word.len() % 4 != 0 {
        return Err(Error::parse(
            line_no,
            format!("{} digits do not split into 16 bit pixels", word.len()),
        ));
    }
    return word
        .as_bytes()
        .chunks(4)
        .map(|chunk| {
            std::str::from_utf8(chunk)
                .ok()
                .and_then(PackedPixel::from_hex)
                .ok_or_else(|| Error::parse(line_no, format!("{word:?} is not hex")))
        })
        .collect();
}

/// The inverse of [`tile_row_words`]
pub fn atlas_from_rows(doc: &MifDocument, tile_size: u32) -> Result<PackedAtlas> {
    let rows_per_tile = tile_size as usize;
    if doc.entries.len() % rows_per_tile != 0 {
        return Err(Error::malformed(
            doc.entries.len(),
            format!("{} rows is not a whole number of {tile_size} row tiles", doc.entries.len()),
        ));
    }
    let mut atlas = PackedAtlas::new(tile_size);
    for (t, rows) in doc.entries.chunks(rows_per_tile).enumerate() {
        let mut pixels = Vec::with_capacity(rows_per_tile * rows_per_tile);
        for (r, entry) in rows.iter().enumerate() {
            let row = word_pixels(&entry.value, t * rows_per_tile + r + 1)?;
            if row.len() != rows_per_tile {
                return Err(Error::malformed(
                    t * rows_per_tile + r + 1,
                    format!("expected {tile_size} pixels per row but found {}", row.len()),
                ));
            }
            pixels.extend(row);
        }
        let tile = Tile::from_pixels(tile_size, pixels)
            .ok_or_else(|| Error::malformed(t + 1, "incomplete tile"))?;
        atlas.push(tile)?;
    }
    return Ok(atlas);
}

/// The inverse of [`tilemap_words`] for a map `width` cells wide
pub fn tilemap_from_words(doc: &MifDocument, width: usize) -> Result<Tilemap> {
    if width == 0 || doc.entries.len() % width != 0 {
        return Err(Error::malformed(
            doc.entries.len(),
            format!("{} cells do not fill rows of {width}", doc.entries.len()),
        ));
    }
    let mut ids = Vec::with_capacity(doc.entries.len());
    for (i, entry) in doc.entries.iter().enumerate() {
        let id = usize::from_str_radix(&entry.value, 16)
            .map_err(|_| Error::parse(i + 1, format!("{:?} is not hex", entry.value)))?;
        ids.push(id);
    }
    return Tilemap::from_rows(ids.chunks(width).map(|row| row.to_vec()).collect());
}

/// Groups 16 bit words into square sprites of `tile_size` pixels.
///
/// A trailing run too short for a whole sprite is dropped.
pub fn sprites_from_words(doc: &MifDocument, tile_size: u32) -> Result<Vec<PackedTile>> {
    let per_sprite = (tile_size * tile_size) as usize;
    let mut pixels = Vec::with_capacity(doc.entries.len());
    for (i, entry) in doc.entries.iter().enumerate() {
        let pixel = PackedPixel::from_hex(&entry.value)
            .ok_or_else(|| Error::parse(i + 1, format!("{:?} is not a 16 bit word", entry.value)))?;
        pixels.push(pixel);
    }
    let leftover = pixels.len() % per_sprite;
    if leftover != 0 {
        log::warn!("dropping {leftover} trailing words that do not fill a sprite");
    }
    return Ok(pixels
        .chunks_exact(per_sprite)
        .filter_map(|chunk| Tile::from_pixels(tile_size, chunk.to_vec()))
        .collect());
}
