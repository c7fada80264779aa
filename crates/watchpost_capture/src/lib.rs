//!Capture side of the pipeline: pulling JPEG frames out of camera streams, and the raster helpers
//!used to draw detections and placeholder frames.

mod child_process_stream;
mod jpeg_stream_splitter;

///Drawing detections onto frames
pub mod annotate;

///ffmpeg backed capture sessions
pub mod ffmpeg;

///Heap backed canvas and synthetic frames
pub mod raster;

pub use annotate::annotate;
pub use ffmpeg::{FfmpegCapture, FfmpegSettings};
pub use raster::{placeholder_jpeg, FrameGenerator, RgbCanvas};
pub use jpeg_stream_splitter::split_jpegs;
