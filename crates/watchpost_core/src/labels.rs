//! COCO class labels, as emitted by the detection service.

use std::fmt;

use crate::error::{Result, WatchpostError};

const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

pub fn class_name(id: u32) -> Option<&'static str> {
    COCO_CLASSES.get(id as usize).copied()
}

pub fn class_id(name: &str) -> Option<u32> {
    let name = name.trim();
    COCO_CLASSES
        .iter()
        .position(|c| c.eq_ignore_ascii_case(name))
        .map(|idx| idx as u32)
}

///The detection class whose presence triggers alert evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetClass(u32);

impl TargetClass {
    pub const PERSON: TargetClass = TargetClass(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }

    ///Accepts a class name ("person") or a numeric class id ("0").
    pub fn parse(value: &str) -> Result<Self> {
        if let Ok(id) = value.trim().parse::<u32>() {
            return Ok(Self(id));
        }
        class_id(value)
            .map(Self)
            .ok_or_else(|| WatchpostError::config(format!("unknown target class '{value}'")))
    }
}

impl Default for TargetClass {
    fn default() -> Self {
        Self::PERSON
    }
}

impl fmt::Display for TargetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match class_name(self.0) {
            Some(name) => f.write_str(name),
            None => write!(f, "class {}", self.0),
        }
    }
}
