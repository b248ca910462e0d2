use derive_more::{Deref, From, IsVariant};
use image::RgbaImage;

use crate::error::{Error, Result};

/// An 8 bit per channel pixel, `[r, g, b, a]`
pub type Rgba = [u8; 4];

const CHANNEL_MASK: u16 = 0x1F;
const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

/// A 16 bit RGB555T word.
///
/// bit 15 is the transparency flag, then 5 bits each of red, green and blue.
/// The all zero word is *opaque* black, use [`PackedPixel::TRANSPARENT`] when
/// a see-through filler is wanted.
#[derive(Deref, From, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackedPixel(pub u16);

impl PackedPixel {
    pub const TRANSPARENT_BIT: u16 = 0x8000;
    pub const OPAQUE_BLACK: PackedPixel = PackedPixel(0x0000);
    pub const TRANSPARENT: PackedPixel = PackedPixel(Self::TRANSPARENT_BIT);

    pub fn is_transparent(self) -> bool {
        return self.0 & Self::TRANSPARENT_BIT != 0;
    }

    /// The three 5 bit channels, `[r5, g5, b5]`
    pub fn channels(self) -> [u8; 3] {
        return [
            ((self.0 >> 10) & CHANNEL_MASK) as u8,
            ((self.0 >> 5) & CHANNEL_MASK) as u8,
            (self.0 & CHANNEL_MASK) as u8,
        ];
    }

    /// 4 lowercase hex digits, the interchange file spelling
    pub fn to_hex(self) -> String {
        return format!("{:04x}", self.0);
    }

    /// 4 uppercase hex digits, the MIF spelling
    pub fn to_hex_upper(self) -> String {
        return format!("{:04X}", self.0);
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.len() > 4 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return u16::from_str_radix(s, 16).ok().map(PackedPixel);
    }
}

/// What decoding does with the color of a transparent pixel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IsVariant, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransparentColor {
    /// keep the stored 5 bit channels, only alpha becomes 0
    #[default]
    Keep,
    /// transparent pixels decode to `[0, 0, 0, 0]`
    Clear,
}

/// Converts between RGBA8888 and RGB555T
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelCodec {
    /// pixels with alpha strictly below this are marked transparent
    pub alpha_threshold: u8,
    pub transparent_color: TransparentColor,
}

impl Default for PixelCodec {
    fn default() -> Self {
        return Self {
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            transparent_color: TransparentColor::Keep,
        };
    }
}

impl PixelCodec {
    pub fn new(alpha_threshold: u8) -> Self {
        return Self {
            alpha_threshold,
            ..Default::default()
        };
    }

    pub fn with_transparent_color(mut self, transparent_color: TransparentColor) -> Self {
        self.transparent_color = transparent_color;
        return self;
    }

    /// Truncates each channel to 5 bits. No rounding.
    pub fn encode(&self, [r, g, b, a]: Rgba) -> PackedPixel {
        let t: u16 = if a < self.alpha_threshold { 1 } else { 0 };
        let r5 = (r >> 3) as u16;
        let g5 = (g >> 3) as u16;
        let b5 = (b >> 3) as u16;
        return PackedPixel((t << 15) | (r5 << 10) | (g5 << 5) | b5);
    }

    /// Lossy: the low 3 bits of each channel come back as zero and alpha is
    /// either 0 or 255.
    pub fn decode(&self, pixel: PackedPixel) -> Rgba {
        if pixel.is_transparent() && self.transparent_color.is_clear() {
            return [0, 0, 0, 0];
        }
        let [r5, g5, b5] = pixel.channels();
        let a = if pixel.is_transparent() { 0 } else { 255 };
        return [r5 << 3, g5 << 3, b5 << 3, a];
    }

    /// The color the hardware will actually show for `rgba`
    pub fn quantize(&self, rgba: Rgba) -> Rgba {
        return self.decode(self.encode(rgba));
    }

    /// Like [`PixelCodec::quantize`] but alpha is dropped entirely
    pub fn quantize_opaque(&self, [r, g, b, _]: Rgba) -> Rgba {
        let [r, g, b, _] = self.quantize([r, g, b, 255]);
        return [r, g, b, 255];
    }

    /// Row-major packed pixels of a whole image
    pub fn encode_image(&self, image: &RgbaImage) -> Vec<PackedPixel> {
        return image.pixels().map(|p| self.encode(p.0)).collect();
    }

    pub fn decode_image(&self, width: u32, height: u32, pixels: &[PackedPixel]) -> Result<RgbaImage> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(Error::InputDimensionMismatch {
                width,
                height,
                expected: format!("{} packed pixels were given", pixels.len()),
            });
        }
        let bytes: Vec<u8> = pixels.iter().flat_map(|&p| self.decode(p)).collect();
        return RgbaImage::from_raw(width, height, bytes).ok_or_else(|| {
            Error::InputDimensionMismatch {
                width,
                height,
                expected: "a buffer of matching size".to_string(),
            }
        });
    }

    /// A preview of `image` in RGB555T precision
    pub fn quantize_image(&self, image: &RgbaImage, opaque: bool) -> RgbaImage {
        let mut out = image.clone();
        for pixel in out.pixels_mut() {
            pixel.0 = if opaque {
                self.quantize_opaque(pixel.0)
            } else {
                self.quantize(pixel.0)
            };
        }
        return out;
    }
}
