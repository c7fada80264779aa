use bytes::Bytes;
use jpeg_encoder::{ColorType, Encoder};
use watchpost_core::error::{Result, WatchpostError};

use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::Rectangle,
    text::{Alignment, Text},
};

pub const PLACEHOLDER_WIDTH: u32 = 640;
pub const PLACEHOLDER_HEIGHT: u32 = 480;
pub const PLACEHOLDER_TEXT: &str = "Waiting for stream...";
const GENERATED_QUALITY: u8 = 80;

///Packed RGB888 pixels that embedded-graphics can draw on. Lives on the heap, so any frame size
///works without blowing the stack.
pub struct RgbCanvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 3],
        }
    }

    ///Wraps an existing packed RGB buffer. `None` if the length does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() == width as usize * height as usize * 3 {
            Some(Self { width, height, data })
        } else {
            None
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb888> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some(Rgb888::new(self.data[idx], self.data[idx + 1], self.data[idx + 2]))
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Bytes> {
        let (width, height) = match (u16::try_from(self.width), u16::try_from(self.height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(WatchpostError::capture(format!(
                    "{}x{} is too large for jpeg",
                    self.width, self.height
                )))
            }
        };

        let mut jpeg_buffer = Vec::with_capacity(self.data.len() / 8);
        let encoder: Encoder<&mut Vec<u8>> = Encoder::new(&mut jpeg_buffer, quality);
        encoder
            .encode(&self.data, width, height, ColorType::Rgb)
            .map_err(|err| WatchpostError::capture(format!("jpeg encoding failed: {}", err)))?;
        Ok(Bytes::from(jpeg_buffer))
    }
}

impl OriginDimensions for RgbCanvas {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for RgbCanvas {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x >= self.width || y >= self.height {
                continue;
            }
            let idx = (y as usize * self.width as usize + x as usize) * 3;
            self.data[idx] = color.r();
            self.data[idx + 1] = color.g();
            self.data[idx + 2] = color.b();
        }
        Ok(())
    }
}

///Builds solid frames with an optional centered caption.
pub struct FrameGenerator {
    w: u32,
    h: u32,
    text: Option<String>,
}

impl FrameGenerator {
    pub fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            text: None,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_owned());
        self
    }

    pub fn build_canvas(&self) -> RgbCanvas {
        let mut canvas = RgbCanvas::new(self.w, self.h);

        canvas
            .fill_solid(&Rectangle::new(Point::zero(), canvas.size()), Rgb888::BLACK)
            .unwrap_or_else(|never| match never {});

        if let Some(ref txt) = self.text {
            let style = MonoTextStyle::new(&FONT_10X20, Rgb888::WHITE);
            let center = Point::new((self.w / 2) as i32, (self.h / 2) as i32);
            Text::with_alignment(txt, center, style, Alignment::Center)
                .draw(&mut canvas)
                .unwrap_or_else(|never| match never {});
        }
        canvas
    }

    pub fn build_jpeg(self) -> Result<Bytes> {
        self.build_canvas().encode_jpeg(GENERATED_QUALITY)
    }
}

///The frame viewers get while a camera has nothing cached: 640x480 black, "Waiting for stream...".
pub fn placeholder_jpeg() -> Result<Bytes> {
    FrameGenerator::new(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT)
        .with_text(PLACEHOLDER_TEXT)
        .build_jpeg()
}
