use bytes::Bytes;
use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
    text::{renderer::CharacterStyle, Baseline, Text},
};
use image::ImageFormat;
use watchpost_core::{
    error::{Result, WatchpostError},
    labels::class_name,
    Detection,
};

use crate::raster::RgbCanvas;

const BOX_COLOR: Rgb888 = Rgb888::new(255, 56, 56);
const BOX_STROKE: u32 = 2;
const ANNOTATED_QUALITY: u8 = 80;

///Decodes `jpeg`, draws every detection on it and re-encodes. CPU bound; call from a blocking
///thread.
pub fn annotate(jpeg: &[u8], detections: &[Detection]) -> Result<Bytes> {
    let decoded = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .map_err(|err| WatchpostError::detection(format!("cannot decode frame: {}", err)))?;
    let rgb = decoded.into_rgb8();
    let (width, height) = rgb.dimensions();

    let mut canvas = RgbCanvas::from_raw(width, height, rgb.into_raw())
        .ok_or_else(|| WatchpostError::detection("decoded frame has an unexpected layout"))?;
    draw_detections(&mut canvas, detections);
    canvas.encode_jpeg(ANNOTATED_QUALITY)
}

pub fn draw_detections(canvas: &mut RgbCanvas, detections: &[Detection]) {
    for detection in detections {
        draw_detection(canvas, detection);
    }
}

fn draw_detection(canvas: &mut RgbCanvas, detection: &Detection) {
    let [x1, y1, x2, y2] = detection.bbox;
    let top_left = Point::new(x1.max(0.0) as i32, y1.max(0.0) as i32);
    let size = Size::new((x2 - x1).max(0.0) as u32, (y2 - y1).max(0.0) as u32);

    let stroke = PrimitiveStyleBuilder::new()
        .stroke_color(BOX_COLOR)
        .stroke_width(BOX_STROKE)
        .stroke_alignment(StrokeAlignment::Inside)
        .build();
    Rectangle::new(top_left, size)
        .into_styled(stroke)
        .draw(canvas)
        .unwrap_or_else(|never| match never {});

    let label = format!(
        "{} {:.2}",
        class_name(detection.class_id).unwrap_or("?"),
        detection.confidence
    );
    let mut style = MonoTextStyle::new(&FONT_6X10, Rgb888::WHITE);
    style.set_background_color(Some(BOX_COLOR));

    //caption sits above the box unless that would leave the frame
    let (anchor, baseline) = if top_left.y >= 12 {
        (Point::new(top_left.x, top_left.y - 1), Baseline::Bottom)
    } else {
        (Point::new(top_left.x, top_left.y + BOX_STROKE as i32), Baseline::Top)
    };
    Text::with_baseline(&label, anchor, style, baseline)
        .draw(canvas)
        .unwrap_or_else(|never| match never {});
}
