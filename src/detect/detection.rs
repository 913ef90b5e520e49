use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut, Canvas};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Axis-aligned region in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    /// Clip to a `width x height` frame. `None` when nothing is left.
    pub fn clipped_to(&self, width: u32, height: u32) -> Option<Rect> {
        self.intersection(&Rect::new(0, 0, width, height))
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// 8-bit RGB colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const GREEN: Color = Color([0, 255, 0]);
    /// Fixed colour used for circle markers.
    pub const CIRCLE: Color = Color([98, 190, 239]);

    pub fn luma(&self) -> u8 {
        let [r, g, b] = self.0;
        ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
    }

    /// Deterministic colour for a label.
    ///
    /// Bytes of the label feed the channels in turn (blue, green, red). The
    /// result is pushed away from black and from flat grays.
    pub fn for_label(label: &str) -> Color {
        let mut bgr = [0u32; 3];
        for (i, byte) in label.bytes().enumerate() {
            let slot = &mut bgr[i % 3];
            *slot = (*slot * 31 + byte as u32) % 256;
        }
        let [mut b, mut g, mut r] = bgr;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        if max - min < 60 {
            // Too close to the gray axis: saturate one channel, darken the next.
            let half = min / 2;
            match label.len() % 3 {
                0 => (b, g) = (255, half),
                1 => (g, r) = (255, half),
                _ => (r, b) = (255, half),
            }
        }
        if r + g + b < 150 {
            r += 60;
            g += 60;
            b += 60;
        }
        Color([r as u8, g as u8, b as u8])
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::GREEN
    }
}

/// Marker drawn for a detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Circle,
}

/// One detected region.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub rect: Rect,
    pub label: String,
    /// Raw score. `0.0` means the producer has no native confidence.
    pub confidence: f32,
    pub render_enabled: bool,
    pub show_confidence: bool,
    pub color: Color,
    pub shape: ShapeKind,
}

impl Detection {
    pub fn new(rect: Rect, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            rect,
            label: label.into(),
            confidence,
            render_enabled: true,
            show_confidence: true,
            color: Color::GREEN,
            shape: ShapeKind::Rectangle,
        }
    }

    pub fn with_shape(mut self, shape: ShapeKind) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_render_enabled(mut self, enabled: bool) -> Self {
        self.render_enabled = enabled;
        self
    }

    /// Text drawn next to the marker, e.g. `person: 87%`.
    pub fn caption(&self) -> String {
        if self.show_confidence && self.confidence > 0.0 {
            format!("{}: {}%", self.label, (self.confidence * 100.0) as i32)
        } else {
            self.label.clone()
        }
    }

    /// Draw the marker onto `frame`. Disabled detections are skipped.
    pub fn render(&self, frame: &mut Frame) {
        if !self.render_enabled || self.rect.is_empty() {
            return;
        }
        let color = match self.shape {
            ShapeKind::Rectangle => self.color,
            ShapeKind::Circle => Color::CIRCLE,
        };
        match frame {
            Frame::Gray(img) => draw_marker(img, self.shape, self.rect, image::Luma([color.luma()])),
            Frame::Rgb(img) => draw_marker(img, self.shape, self.rect, image::Rgb(color.0)),
            Frame::Rgba(img) => {
                let [r, g, b] = color.0;
                draw_marker(img, self.shape, self.rect, image::Rgba([r, g, b, 255]))
            }
        }
    }
}

const STROKE: u32 = 2;

fn draw_marker<C>(canvas: &mut C, shape: ShapeKind, rect: Rect, color: C::Pixel)
where
    C: Canvas,
{
    match shape {
        ShapeKind::Rectangle => {
            for inset in 0..STROKE {
                let (w, h) = (
                    rect.width.saturating_sub(2 * inset),
                    rect.height.saturating_sub(2 * inset),
                );
                if w == 0 || h == 0 {
                    break;
                }
                let r = imageproc::rect::Rect::at(rect.x + inset as i32, rect.y + inset as i32)
                    .of_size(w, h);
                draw_hollow_rect_mut(canvas, r, color);
            }
        }
        ShapeKind::Circle => {
            let center = (
                rect.x + (rect.width / 2) as i32,
                rect.y + (rect.height / 2) as i32,
            );
            let radius = ((rect.width + rect.height) as f32 * 0.25).round() as i32;
            for inset in 0..STROKE as i32 {
                if radius - inset <= 0 {
                    break;
                }
                draw_hollow_circle_mut(canvas, center, radius - inset, color);
            }
        }
    }
}
