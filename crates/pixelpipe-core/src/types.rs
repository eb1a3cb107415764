//! Core data types shared by every component.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use std::io::Cursor;
use std::path::Path;

use crate::error::RenderError;

/// JPEG output is written at full quality.
const JPEG_QUALITY: u8 = 100;

/// Largest value of a 16-bit channel.
pub const MAX_CHANNEL: u16 = u16::MAX;

/// An RGBA image with four non-premultiplied 16-bit channels.
///
/// Dimensions are fixed at construction and every accessor of
/// `ImageBuffer` is bounds-checked against them.
pub type Image = ImageBuffer<Rgba<u16>, Vec<u16>>;

/// A single non-premultiplied 16-bit pixel.
pub type Pixel = Rgba<u16>;

/// The pixel returned for coordinates outside an image.
pub const TRANSPARENT: Pixel = Rgba([0, 0, 0, 0]);

/// Create a new image filled with a single color.
pub fn solid(width: u32, height: u32, color: Pixel) -> Image {
    ImageBuffer::from_pixel(width, height, color)
}

/// Read a pixel, treating coordinates outside the image as transparent.
#[inline]
pub fn pixel_or_transparent(image: &Image, x: u32, y: u32) -> Pixel {
    image.get_pixel_checked(x, y).copied().unwrap_or(TRANSPARENT)
}

/// Convert any decoded image into the runtime's 16-bit RGBA representation.
pub fn from_dynamic(image: DynamicImage) -> Image {
    image.into_rgba16()
}

/// Encode an image as a 16-bit PNG.
pub fn encode_png(image: &Image) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Encodings supported for written images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Pick the encoding from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

/// Encode an image in `format`. JPEG drops alpha and reduces to 8 bits.
pub fn encode(image: &Image, format: OutputFormat) -> Result<Vec<u8>, image::ImageError> {
    match format {
        OutputFormat::Png => encode_png(image),
        OutputFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba16(image.clone()).to_rgb8();
            let mut buffer = Vec::new();
            JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(&rgb)?;
            Ok(buffer)
        }
    }
}

/// Encode an image for `path`, choosing the format from its extension.
pub fn encode_for_path(image: &Image, path: &Path) -> Result<Vec<u8>, RenderError> {
    let format = OutputFormat::from_path(path)
        .ok_or_else(|| RenderError::UnsupportedOutput(path.to_path_buf()))?;
    Ok(encode(image, format)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_reads_transparent() {
        let img = solid(2, 2, Rgba([1, 2, 3, 4]));
        assert_eq!(pixel_or_transparent(&img, 1, 1), Rgba([1, 2, 3, 4]));
        assert_eq!(pixel_or_transparent(&img, 2, 0), TRANSPARENT);
        assert_eq!(pixel_or_transparent(&img, 0, 5), TRANSPARENT);
    }

    #[test]
    fn test_png_keeps_sixteen_bit_channels() {
        let img = solid(3, 2, Rgba([0x1234, 0xabcd, 0x0001, MAX_CHANNEL]));
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[0..8], b"\x89PNG\r\n\x1a\n");

        let decoded = from_dynamic(image::load_from_memory(&bytes).unwrap());
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(2, 1), img.get_pixel(2, 1));
    }

    #[test]
    fn test_output_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a/out.png")), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::from_path(Path::new("out.JPG")), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_path(Path::new("out.jpeg")), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_path(Path::new("out.gif")), None);
        assert_eq!(OutputFormat::from_path(Path::new("out")), None);
    }

    #[test]
    fn test_encode_for_path_picks_codec() {
        let img = solid(4, 4, Rgba([65535, 0, 0, 65535]));
        let jpeg = encode_for_path(&img, Path::new("x.jpg")).unwrap();
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        assert!(decoded.get_pixel(1, 1)[0] > 240);

        let png = encode_for_path(&img, Path::new("x.png")).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");

        assert!(matches!(
            encode_for_path(&img, Path::new("x.bmp")),
            Err(RenderError::UnsupportedOutput(_))
        ));
    }

    #[test]
    fn test_from_dynamic_widens_eight_bit() {
        let rgb = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(1, 1, image::Rgb([255, 0, 128])));
        let img = from_dynamic(rgb);
        assert_eq!(img.get_pixel(0, 0), &Rgba([65535, 0, 128 * 257, 65535]));
    }
}
