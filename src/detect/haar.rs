//! Haar cascade region classifier.
//!
//! Reads OpenCV's cascade XML format (`opencv_storage/cascade`, boosted
//! stages of Haar feature trees) and runs the classic multi-scale sliding
//! window search over an image pyramid. Candidate windows are merged with the
//! same neighbour grouping OpenCV applies, so `min_neighbors` has the same
//! meaning as in `detectMultiScale`.
//!
//! Tilted features, LBP/HOG cascades and the pre-2.4 `opencv-haar-classifier`
//! layout are rejected at load time.

use std::borrow::Cow;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::detect::detection::Rect;
use crate::detect::error::DetectorError;

/// Neighbour grouping tolerance.
pub const GROUP_EPS: f64 = 0.2;

/// Multi-scale search parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanParams {
    /// Pyramid step between scales. Values `<= 1.0` are bumped to 1.01.
    pub scale_factor: f32,
    /// A grouped region needs more than this many raw hits to be reported.
    /// `0` disables grouping.
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
    /// Defaults to the image size.
    pub max_size: Option<(u32, u32)>,
}

impl ScanParams {
    /// Whole-frame search used by stand-alone and primary detectors.
    pub const fn standalone() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 6,
            min_size: (50, 50),
            max_size: None,
        }
    }

    /// Search inside a primary region (eyes inside a face, ...).
    pub const fn dependent() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 3,
            min_size: (0, 0),
            max_size: None,
        }
    }
}

impl Default for ScanParams {
    fn default() -> Self {
        Self::standalone()
    }
}

/// Anything that can locate object regions in a gray image.
pub trait RegionClassifier: Send {
    fn detect_multi_scale(&self, image: &GrayImage, params: &ScanParams) -> Vec<Rect>;
}

// ---- model ----

#[derive(Debug, Clone)]
struct FeatureRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    weight: f32,
}

#[derive(Debug, Clone)]
struct HaarFeature {
    rects: Vec<FeatureRect>,
}

#[derive(Debug, Clone)]
struct TreeNode {
    /// `> 0` is a node index, `<= 0` is a negated leaf index.
    left: i32,
    right: i32,
    feature: usize,
    threshold: f32,
}

#[derive(Debug, Clone)]
struct WeakTree {
    nodes: Vec<TreeNode>,
    leaves: Vec<f32>,
}

#[derive(Debug, Clone)]
struct Stage {
    threshold: f32,
    trees: Vec<WeakTree>,
}

/// Boosted Haar cascade loaded from an OpenCV XML file.
#[derive(Debug, Clone)]
pub struct HaarCascade {
    window: (u32, u32),
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    pub fn from_file(path: &Path) -> Result<Self, DetectorError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DetectorError::model_load(path, None, e))?;
        Self::parse(&text).map_err(|reason| DetectorError::model_load(path, None, reason))
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let doc = roxmltree::Document::parse(text).map_err(|e| format!("invalid xml: {e}"))?;
        let cascade = doc
            .descendants()
            .find(|n| n.has_tag_name("cascade"))
            .ok_or_else(|| "missing <cascade> element".to_string())?;
        if cascade.attribute("type_id") == Some("opencv-haar-classifier") {
            return Err("legacy opencv-haar-classifier layout is not supported".into());
        }

        let stage_type = text_of(cascade, "stageType")?;
        if stage_type != "BOOST" {
            return Err(format!("unsupported stage type {stage_type}"));
        }
        let feature_type = text_of(cascade, "featureType")?;
        if feature_type != "HAAR" {
            return Err(format!("unsupported feature type {feature_type}"));
        }
        if let Some(params) = child(cascade, "featureParams") {
            if let Ok(cat) = text_of(params, "maxCatCount") {
                if parse_num::<u32>(cat)? != 0 {
                    return Err("categorical features are not supported".into());
                }
            }
        }

        let window = (
            parse_num::<u32>(text_of(cascade, "width")?)?,
            parse_num::<u32>(text_of(cascade, "height")?)?,
        );
        if window.0 < 3 || window.1 < 3 {
            return Err(format!("window {}x{} is too small", window.0, window.1));
        }

        let features = child(cascade, "features")
            .ok_or_else(|| "missing <features>".to_string())?
            .children()
            .filter(|n| n.is_element())
            .map(|n| parse_feature(n, window))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = child(cascade, "stages")
            .ok_or_else(|| "missing <stages>".to_string())?
            .children()
            .filter(|n| n.is_element())
            .map(|n| parse_stage(n, features.len()))
            .collect::<Result<Vec<_>, _>>()?;
        if stages.is_empty() {
            return Err("cascade has no stages".into());
        }

        Ok(Self {
            window,
            stages,
            features,
        })
    }

    /// Native detection window (width, height).
    pub fn window_size(&self) -> (u32, u32) {
        self.window
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn classify_window(&self, integral: &IntegralImage, x: u32, y: u32) -> bool {
        let (w, h) = self.window;
        let area = ((w - 2) * (h - 2)) as f64;
        let sum = integral.sum(x + 1, y + 1, w - 2, h - 2) as f64;
        let sqsum = integral.sqsum(x + 1, y + 1, w - 2, h - 2) as f64;
        let mut nf = area * sqsum - sum * sum;
        nf = if nf > 0.0 { nf.sqrt() } else { 1.0 };
        let inv_norm = 1.0 / nf;

        for stage in &self.stages {
            let mut total = 0.0f64;
            for tree in &stage.trees {
                let mut idx = 0usize;
                let leaf = loop {
                    let node = &tree.nodes[idx];
                    let value = self.features[node.feature].eval(integral, x, y) * inv_norm;
                    let next = if value < node.threshold as f64 {
                        node.left
                    } else {
                        node.right
                    };
                    if next <= 0 {
                        break (-next) as usize;
                    }
                    idx = next as usize;
                };
                total += tree.leaves[leaf] as f64;
            }
            if total < stage.threshold as f64 {
                return false;
            }
        }
        true
    }
}

impl HaarFeature {
    fn eval(&self, integral: &IntegralImage, x: u32, y: u32) -> f64 {
        self.rects
            .iter()
            .map(|r| r.weight as f64 * integral.sum(x + r.x, y + r.y, r.width, r.height) as f64)
            .sum()
    }
}

impl RegionClassifier for HaarCascade {
    fn detect_multi_scale(&self, image: &GrayImage, params: &ScanParams) -> Vec<Rect> {
        let (img_w, img_h) = image.dimensions();
        let (win_w, win_h) = self.window;
        let (max_w, max_h) = params.max_size.unwrap_or((img_w, img_h));
        let step_factor = (params.scale_factor as f64).max(1.01);

        let mut candidates = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let scaled_win = (
                (win_w as f64 * factor).round() as u32,
                (win_h as f64 * factor).round() as u32,
            );
            if scaled_win.0 > max_w || scaled_win.1 > max_h {
                break;
            }
            let scaled_img = (
                (img_w as f64 / factor).round() as u32,
                (img_h as f64 / factor).round() as u32,
            );
            if scaled_img.0 < win_w || scaled_img.1 < win_h {
                break;
            }

            if scaled_win.0 >= params.min_size.0 && scaled_win.1 >= params.min_size.1 {
                let level: Cow<'_, GrayImage> = if scaled_img == (img_w, img_h) {
                    Cow::Borrowed(image)
                } else {
                    Cow::Owned(imageops::resize(
                        image,
                        scaled_img.0,
                        scaled_img.1,
                        FilterType::Triangle,
                    ))
                };
                let integral = IntegralImage::new(&level);
                let step = if factor > 2.0 { 1 } else { 2 };
                for y in (0..=scaled_img.1 - win_h).step_by(step) {
                    for x in (0..=scaled_img.0 - win_w).step_by(step) {
                        if self.classify_window(&integral, x, y) {
                            candidates.push(Rect::new(
                                (x as f64 * factor).round() as i32,
                                (y as f64 * factor).round() as i32,
                                scaled_win.0,
                                scaled_win.1,
                            ));
                        }
                    }
                }
            }
            factor *= step_factor;
        }

        log::trace!(
            "haar scan {}x{}: {} raw candidates",
            img_w,
            img_h,
            candidates.len()
        );
        group_rectangles(candidates, params.min_neighbors, GROUP_EPS)
    }
}

// ---- integral image ----

struct IntegralImage {
    stride: usize,
    sum: Vec<i64>,
    sqsum: Vec<i64>,
}

impl IntegralImage {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0i64; stride * (h + 1)];
        let mut sqsum = vec![0i64; stride * (h + 1)];
        let raw = image.as_raw();
        for y in 0..h {
            let mut row = 0i64;
            let mut row_sq = 0i64;
            for x in 0..w {
                let v = raw[y * w + x] as i64;
                row += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row;
                sqsum[idx] = sqsum[idx - stride] + row_sq;
            }
        }
        Self { stride, sum, sqsum }
    }

    fn sum(&self, x: u32, y: u32, w: u32, h: u32) -> i64 {
        Self::area(&self.sum, self.stride, x, y, w, h)
    }

    fn sqsum(&self, x: u32, y: u32, w: u32, h: u32) -> i64 {
        Self::area(&self.sqsum, self.stride, x, y, w, h)
    }

    fn area(table: &[i64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> i64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0]
            + table[y0 * stride + x0]
    }
}

// ---- grouping ----

fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let delta = eps
        * (a.width.min(b.width) as f64 + a.height.min(b.height) as f64)
        * 0.5;
    (a.x - b.x).abs() as f64 <= delta
        && (a.y - b.y).abs() as f64 <= delta
        && (a.right() - b.right()).abs() as f64 <= delta
        && (a.bottom() - b.bottom()).abs() as f64 <= delta
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Cluster similar rectangles, average each cluster and keep clusters with
/// more than `min_neighbors` members. Clusters sitting inside a stronger
/// neighbour are dropped.
pub fn group_rectangles(rects: Vec<Rect>, min_neighbors: u32, eps: f64) -> Vec<Rect> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects;
    }

    let mut parent: Vec<usize> = (0..rects.len()).collect();
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if similar(&rects[i], &rects[j], eps) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b.max(a)] = a.min(b);
                }
            }
        }
    }

    // Cluster ids in order of first appearance.
    let mut class_of_root = vec![usize::MAX; rects.len()];
    let mut sums: Vec<[i64; 4]> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    for (i, r) in rects.iter().enumerate() {
        let root = find(&mut parent, i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = sums.len();
            sums.push([0; 4]);
            counts.push(0);
        }
        let cls = class_of_root[root];
        sums[cls][0] += r.x as i64;
        sums[cls][1] += r.y as i64;
        sums[cls][2] += r.width as i64;
        sums[cls][3] += r.height as i64;
        counts[cls] += 1;
    }

    let averaged: Vec<Rect> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let n = n as f64;
            Rect::new(
                (s[0] as f64 / n).round() as i32,
                (s[1] as f64 / n).round() as i32,
                (s[2] as f64 / n).round() as u32,
                (s[3] as f64 / n).round() as u32,
            )
        })
        .collect();

    let mut out = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }
        let swallowed = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f64 * eps).round() as i32;
            let dy = (r2.height as f64 * eps).round() as i32;
            r1.x >= r2.x - dx
                && r1.y >= r2.y - dy
                && r1.right() <= r2.right() + dx
                && r1.bottom() <= r2.bottom() + dy
                && (n2 > n1.max(3) || n1 < 3)
        });
        if !swallowed {
            out.push(*r1);
        }
    }
    out
}

// ---- xml helpers ----

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(name))
}

fn text_of<'a>(node: roxmltree::Node<'a, '_>, name: &str) -> Result<&'a str, String> {
    child(node, name)
        .and_then(|c| c.text())
        .map(str::trim)
        .ok_or_else(|| format!("missing <{name}>"))
}

fn parse_num<T: std::str::FromStr>(raw: &str) -> Result<T, String> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| format!("invalid number '{raw}'"))
}

fn parse_list<T: std::str::FromStr>(raw: &str) -> Result<Vec<T>, String> {
    raw.split_whitespace().map(parse_num::<T>).collect()
}

fn parse_feature(node: roxmltree::Node<'_, '_>, window: (u32, u32)) -> Result<HaarFeature, String> {
    if let Ok(tilted) = text_of(node, "tilted") {
        if parse_num::<i32>(tilted)? != 0 {
            return Err("tilted haar features are not supported".into());
        }
    }
    let rects = child(node, "rects")
        .ok_or_else(|| "feature without <rects>".to_string())?
        .children()
        .filter(|n| n.is_element())
        .map(|r| {
            let values: Vec<f32> = parse_list(r.text().unwrap_or_default())?;
            if values.len() != 5 {
                return Err(format!("feature rect needs 5 values, got {}", values.len()));
            }
            if !values[4].is_finite() {
                return Err("feature rect weight is not finite".into());
            }
            let limits = [window.0, window.1, window.0, window.1];
            if values[..4]
                .iter()
                .zip(limits)
                .any(|(v, limit)| !v.is_finite() || *v < 0.0 || f64::from(*v) > f64::from(limit))
            {
                return Err("feature rect lies outside the detection window".into());
            }
            let rect = FeatureRect {
                x: values[0] as u32,
                y: values[1] as u32,
                width: values[2] as u32,
                height: values[3] as u32,
                weight: values[4],
            };
            if u64::from(rect.x) + u64::from(rect.width) > u64::from(window.0)
                || u64::from(rect.y) + u64::from(rect.height) > u64::from(window.1)
            {
                return Err("feature rect lies outside the detection window".into());
            }
            Ok(rect)
        })
        .collect::<Result<Vec<_>, _>>()?;
    if rects.is_empty() {
        return Err("feature without rectangles".into());
    }
    Ok(HaarFeature { rects })
}

fn parse_stage(node: roxmltree::Node<'_, '_>, feature_count: usize) -> Result<Stage, String> {
    let threshold = parse_num::<f32>(text_of(node, "stageThreshold")?)?;
    let trees = child(node, "weakClassifiers")
        .ok_or_else(|| "stage without <weakClassifiers>".to_string())?
        .children()
        .filter(|n| n.is_element())
        .map(|weak| parse_tree(weak, feature_count))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage { threshold, trees })
}

fn parse_tree(node: roxmltree::Node<'_, '_>, feature_count: usize) -> Result<WeakTree, String> {
    let raw: Vec<f64> = parse_list(text_of(node, "internalNodes")?)?;
    let leaves: Vec<f32> = parse_list(text_of(node, "leafValues")?)?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err("internalNodes must hold groups of 4 values".into());
    }

    let nodes: Vec<TreeNode> = raw
        .chunks(4)
        .map(|c| TreeNode {
            left: c[0] as i32,
            right: c[1] as i32,
            feature: c[2] as usize,
            threshold: c[3] as f32,
        })
        .collect();

    for (i, n) in nodes.iter().enumerate() {
        if n.feature >= feature_count {
            return Err(format!("node refers to missing feature {}", n.feature));
        }
        for next in [n.left, n.right] {
            let ok = if next > 0 {
                (next as usize) > i && (next as usize) < nodes.len()
            } else {
                ((-next) as usize) < leaves.len()
            };
            if !ok {
                return Err(format!("tree node {i} has an invalid child {next}"));
            }
        }
    }
    Ok(WeakTree { nodes, leaves })
}
