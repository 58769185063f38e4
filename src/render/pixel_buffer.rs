use crate::foundation::core::Canvas;

/// Encoder-facing pixel layout.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum PixelFormat {
    /// Packed 32-bit B, G, R, A bytes per pixel, straight alpha.
    #[default]
    Bgra8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8 => 4,
        }
    }

    /// `ffmpeg` rawvideo `-pix_fmt` name.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            Self::Bgra8 => "bgra",
        }
    }
}

/// A tightly packed, row-major frame buffer ready to hand to a writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout of `data`.
    pub format: PixelFormat,
    /// Pixel bytes, `width * height * bytes_per_pixel` long.
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0u8; byte_len(width, height, format)],
        }
    }

    /// Buffer dimensions.
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Fill every pixel with a straight-alpha RGBA8 color.
    pub fn clear(&mut self, rgba: [u8; 4]) {
        let px = encode_pixel(self.format, rgba);
        for d in self.data.chunks_exact_mut(self.format.bytes_per_pixel()) {
            d.copy_from_slice(&px);
        }
    }

    /// Write one pixel given as straight-alpha RGBA8. Out-of-bounds writes are ignored.
    pub fn put_rgba(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        self.data[i..i + bpp].copy_from_slice(&encode_pixel(self.format, rgba));
    }

    /// Read one pixel as straight-alpha RGBA8.
    pub fn pixel_rgba(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        let px = &self.data[i..i + bpp];
        Some(match self.format {
            PixelFormat::Bgra8 => [px[2], px[1], px[0], px[3]],
        })
    }

    /// Convert to an RGBA8 image (PNG export, inspection).
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            image::Rgba(self.pixel_rgba(x, y).unwrap_or([0, 0, 0, 0]))
        })
    }
}

pub(crate) fn byte_len(width: u32, height: u32, format: PixelFormat) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(format.bytes_per_pixel())
}

fn encode_pixel(format: PixelFormat, rgba: [u8; 4]) -> [u8; 4] {
    match format {
        PixelFormat::Bgra8 => [rgba[2], rgba[1], rgba[0], rgba[3]],
    }
}
