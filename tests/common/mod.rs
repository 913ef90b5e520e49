#![allow(dead_code)]

use std::path::{Path, PathBuf};

use detection_workbench::Frame;
use image::{GrayImage, Luma, Rgb, RgbImage};

/// One-stage Haar cascade that fires on a bright square centred in a dark
/// 24x24 window.
pub const BRIGHT_SQUARE_CASCADE: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>24</height>
  <width>24</width>
  <stageParams><maxWeakCount>2</maxWeakCount></stageParams>
  <featureParams><maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>2</maxWeakCount>
      <stageThreshold>1.5</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>0 -1 0 1.</internalNodes>
          <leafValues>-1. 1.</leafValues></_>
        <_>
          <internalNodes>0 -1 1 0.05</internalNodes>
          <leafValues>1. -1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>0 0 24 24 -1.</_>
        <_>6 6 12 12 4.</_></rects></_>
    <_>
      <rects>
        <_>0 0 24 3 1.</_></rects></_></features></cascade>
</opencv_storage>
"#;

pub fn write_cascade(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, BRIGHT_SQUARE_CASCADE).expect("write cascade");
    path
}

/// 200x200 black frame with a white 60x60 square at (70, 70).
pub fn square_frame() -> Frame {
    Frame::Gray(GrayImage::from_fn(200, 200, |x, y| {
        let inside = (70..130).contains(&x) && (70..130).contains(&y);
        Luma([if inside { 255 } else { 0 }])
    }))
}

pub fn rgb_frame(width: u32, height: u32) -> Frame {
    Frame::Rgb(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    }))
}
