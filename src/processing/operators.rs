//! Pixel operators behind the filter options.
//!
//! Every operator is pure: it borrows a frame and returns a new one.
//! Threshold operators follow OpenCV's semantics (`v > t`), work on every
//! colour channel and leave alpha untouched. Operators that only make sense
//! on intensity (adaptive threshold, Sobel, triangle, Canny) convert to gray
//! first and return a gray frame.

use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;
use imageproc::edges;
use imageproc::filter::box_filter;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::frame::Frame;

/// Neighbourhood radius of the adaptive threshold (11x11 window).
pub const ADAPTIVE_RADIUS: u32 = 5;
/// Constant subtracted from the local mean.
pub const ADAPTIVE_C: i32 = 2;
/// Largest binomial kernel; bigger requests are clamped to it.
pub const MAX_BINOMIAL_KERNEL: usize = 31;

fn level(value: i16) -> u8 {
    value.clamp(0, 255) as u8
}

pub fn grayscale_histogram_equalization(frame: &Frame) -> Frame {
    Frame::Gray(equalize_histogram(&frame.to_gray()))
}

/// Equalize luma in YCbCr and keep chroma. Gray frames are equalized
/// directly.
pub fn color_histogram_equalization(frame: &Frame) -> Frame {
    match frame {
        Frame::Gray(gray) => Frame::Gray(equalize_histogram(gray)),
        Frame::Rgb(rgb) => Frame::Rgb(equalize_luma(rgb)),
        Frame::Rgba(rgba) => {
            let rgb = frame.to_rgb();
            let equalized = equalize_luma(&rgb);
            let mut out = rgba.clone();
            for (dst, src) in out.pixels_mut().zip(equalized.pixels()) {
                dst.0[..3].copy_from_slice(&src.0);
            }
            Frame::Rgba(out)
        }
    }
}

fn equalize_luma(rgb: &RgbImage) -> RgbImage {
    let (w, h) = rgb.dimensions();
    let mut luma = GrayImage::new(w, h);
    let mut chroma = Vec::with_capacity((w * h) as usize);
    for (x, y, px) in rgb.enumerate_pixels() {
        let [r, g, b] = px.0.map(f32::from);
        let y_val = 0.299 * r + 0.587 * g + 0.114 * b;
        let cb = (b - y_val) * 0.564 + 128.0;
        let cr = (r - y_val) * 0.713 + 128.0;
        luma.put_pixel(x, y, Luma([y_val.round().clamp(0.0, 255.0) as u8]));
        chroma.push((cb, cr));
    }

    let luma = equalize_histogram(&luma);
    let mut out = RgbImage::new(w, h);
    for ((x, y, px), (cb, cr)) in out.enumerate_pixels_mut().zip(chroma) {
        let y_val = f32::from(luma.get_pixel(x, y)[0]);
        let r = y_val + 1.403 * (cr - 128.0);
        let g = y_val - 0.714 * (cr - 128.0) - 0.344 * (cb - 128.0);
        let b = y_val + 1.773 * (cb - 128.0);
        *px = Rgb([r, g, b].map(|c| c.round().clamp(0.0, 255.0) as u8));
    }
    out
}

/// `v > t ? 255 : 0`
pub fn binary_threshold(frame: &Frame, threshold: i16) -> Frame {
    let t = level(threshold);
    frame.map_samples(|v| if v > t { 255 } else { 0 })
}

/// `v > t ? v : 0`
pub fn zero_threshold(frame: &Frame, threshold: i16) -> Frame {
    let t = level(threshold);
    frame.map_samples(|v| if v > t { v } else { 0 })
}

/// `v > t ? t : v`
pub fn truncate_threshold(frame: &Frame, threshold: i16) -> Frame {
    let t = level(threshold);
    frame.map_samples(|v| v.min(t))
}

/// Mean adaptive threshold over an 11x11 window. Pixels brighter than
/// `mean - 2` become `max_value`, the rest 0.
pub fn adaptive_threshold(frame: &Frame, max_value: i16) -> Frame {
    let gray = frame.to_gray();
    let mean = box_filter(&gray, ADAPTIVE_RADIUS, ADAPTIVE_RADIUS);
    let max_value = level(max_value);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, px) in out.enumerate_pixels_mut() {
        let v = i32::from(gray.get_pixel(x, y)[0]);
        let m = i32::from(mean.get_pixel(x, y)[0]);
        px[0] = if v > m - ADAPTIVE_C { max_value } else { 0 };
    }
    Frame::Gray(out)
}

/// Gradient magnitude approximated as `|gx| / 2 + |gy| / 2`.
pub fn sobel(frame: &Frame) -> Frame {
    let gray = frame.to_gray();
    let gx = horizontal_sobel(&gray);
    let gy = vertical_sobel(&gray);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, px) in out.enumerate_pixels_mut() {
        let ax = i32::from(gx.get_pixel(x, y)[0]).abs().min(255);
        let ay = i32::from(gy.get_pixel(x, y)[0]).abs().min(255);
        px[0] = (ax / 2 + ay / 2).min(255) as u8;
    }
    Frame::Gray(out)
}

/// Threshold level picked by the triangle method on a gray histogram.
///
/// The tail is chosen by where the peak sits: a peak in the dark half
/// looks for the bright tail, otherwise the dark one. The bin farthest below
/// the peak-to-tail line is moved a fifth of the peak-to-tail span further
/// towards the tail.
pub fn triangle_level(gray: &GrayImage) -> u8 {
    let mut hist = [0u64; 256];
    for px in gray.pixels() {
        hist[px[0] as usize] += 1;
    }
    let Some(first) = hist.iter().position(|&c| c > 0) else {
        return 0;
    };
    let last = hist.iter().rposition(|&c| c > 0).unwrap_or(first);
    let peak = (0..256)
        .max_by_key(|&i| (hist[i], std::cmp::Reverse(i)))
        .unwrap_or(first);

    let tail = if peak < 128 { last } else { first };
    if tail == peak {
        return peak as u8;
    }

    let (p, t) = (peak as f64, tail as f64);
    let (hp, ht) = (hist[peak] as f64, hist[tail] as f64);
    let (lo, hi) = (peak.min(tail), peak.max(tail));
    let mut best = peak;
    let mut best_gap = f64::MIN;
    for i in lo..=hi {
        let line = hp + (ht - hp) * (i as f64 - p) / (t - p);
        let gap = line - hist[i] as f64;
        if gap > best_gap {
            best_gap = gap;
            best = i;
        }
    }

    let span = (t - p).abs();
    let offset = 0.2 * span * (t - p).signum();
    (best as f64 + offset).round().clamp(lo as f64, hi as f64) as u8
}

/// Binary threshold at the triangle level, on the gray frame.
pub fn triangle_threshold(frame: &Frame) -> Frame {
    let gray = frame.to_gray();
    let t = triangle_level(&gray);
    let mut out = gray;
    for px in out.pixels_mut() {
        px[0] = if px[0] > t { 255 } else { 0 };
    }
    Frame::Gray(out)
}

/// Row of Pascal's triangle, normalised to sum 1.
fn binomial_kernel(size: usize) -> Vec<f32> {
    let mut row = vec![1.0f64];
    for _ in 1..size {
        let mut next = vec![1.0f64; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    let sum: f64 = row.iter().sum();
    row.into_iter().map(|c| (c / sum) as f32).collect()
}

/// Separable binomial blur. Even sizes are rounded up to odd and sizes above
/// [`MAX_BINOMIAL_KERNEL`] are clamped; a size of 1 or less returns the frame
/// unchanged.
pub fn binomial_blur(frame: &Frame, kernel_size: i16) -> Frame {
    if kernel_size <= 1 {
        return frame.clone();
    }
    let size = ((kernel_size as usize) | 1).min(MAX_BINOMIAL_KERNEL);
    let kernel = binomial_kernel(size);
    match frame {
        Frame::Gray(img) => Frame::Gray(separable_blur(img, &kernel)),
        Frame::Rgb(img) => Frame::Rgb(separable_blur(img, &kernel)),
        Frame::Rgba(img) => Frame::Rgba(separable_blur(img, &kernel)),
    }
}

fn separable_blur<P>(image: &ImageBuffer<P, Vec<u8>>, kernel: &[f32]) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = image.dimensions();
    let channels = P::CHANNEL_COUNT as usize;
    let radius = (kernel.len() / 2) as i64;
    let src = image.as_raw();
    let index = |x: i64, y: i64, c: usize| -> usize {
        let x = x.clamp(0, w as i64 - 1) as usize;
        let y = y.clamp(0, h as i64 - 1) as usize;
        (y * w as usize + x) * channels + c
    };

    let mut horizontal = vec![0.0f32; src.len()];
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    acc += weight * f32::from(src[index(x + k as i64 - radius, y, c)]);
                }
                horizontal[index(x, y, c)] = acc;
            }
        }
    }

    let mut out = vec![0u8; src.len()];
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    acc += weight * horizontal[index(x, y + k as i64 - radius, c)];
                }
                out[index(x, y, c)] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    ImageBuffer::from_raw(w, h, out).unwrap_or_else(|| image.clone())
}

pub fn canny(frame: &Frame, low: i16, high: i16) -> Frame {
    let gray = frame.to_gray();
    Frame::Gray(edges::canny(&gray, f32::from(low), f32::from(high)))
}

pub fn flip(frame: &Frame, horizontal: bool, vertical: bool) -> Frame {
    frame.flipped(horizontal, vertical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gray_frame(values: &[u8]) -> Frame {
        Frame::Gray(GrayImage::from_raw(values.len() as u32, 1, values.to_vec()).unwrap())
    }

    fn samples(frame: &Frame) -> Vec<u8> {
        match frame {
            Frame::Gray(img) => img.as_raw().clone(),
            Frame::Rgb(img) => img.as_raw().clone(),
            Frame::Rgba(img) => img.as_raw().clone(),
        }
    }

    #[test]
    fn threshold_family_matches_opencv_rules() {
        let frame = gray_frame(&[10, 100, 101, 250]);
        assert_eq!(samples(&binary_threshold(&frame, 100)), vec![0, 0, 255, 255]);
        assert_eq!(samples(&zero_threshold(&frame, 100)), vec![0, 0, 101, 250]);
        assert_eq!(samples(&truncate_threshold(&frame, 100)), vec![10, 100, 100, 100]);
    }

    #[test]
    fn threshold_keeps_alpha() {
        let frame = Frame::Rgba(image::RgbaImage::from_pixel(1, 1, Rgba([200, 50, 120, 77])));
        assert_eq!(samples(&binary_threshold(&frame, 100)), vec![255, 0, 255, 77]);
    }

    #[test]
    fn binomial_kernel_rows() {
        let k = binomial_kernel(5);
        let expected = [1.0, 4.0, 6.0, 4.0, 1.0].map(|c: f32| c / 16.0);
        for (a, b) in k.iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn binomial_blur_small_kernel_is_identity_and_flat_stays_flat() {
        let frame = gray_frame(&[0, 255, 0, 255]);
        assert_eq!(binomial_blur(&frame, 1), frame);
        assert_eq!(binomial_blur(&frame, 0), frame);

        let flat = Frame::Rgb(RgbImage::from_pixel(9, 9, Rgb([30, 60, 90])));
        assert_eq!(binomial_blur(&flat, 4), flat);

        let blurred = binomial_blur(&frame, 3);
        assert_eq!(samples(&blurred), vec![64, 128, 128, 191]);
    }

    #[test]
    fn oversized_binomial_kernel_is_clamped() {
        let frame = Frame::Gray(GrayImage::from_fn(40, 8, |x, _| Luma([(x * 6) as u8])));
        let widest = binomial_blur(&frame, MAX_BINOMIAL_KERNEL as i16);
        assert_eq!(binomial_blur(&frame, i16::MAX), widest);
        assert_eq!(binomial_blur(&frame, 32), widest);
        assert_ne!(widest, frame);

        let k = binomial_kernel(MAX_BINOMIAL_KERNEL);
        assert!(k.iter().all(|w| w.is_finite() && *w > 0.0));
    }

    #[test]
    fn triangle_splits_background_from_object() {
        let mut img = GrayImage::from_pixel(100, 100, Luma([30]));
        for y in 40..60 {
            for x in 40..60 {
                img.put_pixel(x, y, Luma([200]));
            }
        }
        let level = triangle_level(&img);
        assert!(level > 30 && level < 200, "level {level}");

        let Frame::Gray(out) = triangle_threshold(&Frame::Gray(img)) else {
            panic!("triangle threshold returns gray");
        };
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(50, 50)[0], 255);
    }

    #[test]
    fn gray_only_operators_return_gray() {
        let frame = Frame::Rgb(RgbImage::from_pixel(16, 16, Rgb([90, 120, 30])));
        for out in [
            sobel(&frame),
            adaptive_threshold(&frame, 255),
            canny(&frame, 10, 30),
            grayscale_histogram_equalization(&frame),
        ] {
            assert_eq!(out.channels(), 1);
            assert_eq!(out.dimensions(), (16, 16));
        }
        assert_eq!(color_histogram_equalization(&frame).channels(), 3);
    }

    #[test]
    fn sobel_of_flat_image_is_black() {
        let frame = Frame::Gray(GrayImage::from_pixel(8, 8, Luma([77])));
        assert!(samples(&sobel(&frame)).iter().all(|&v| v == 0));
    }
}
