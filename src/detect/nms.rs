use crate::detect::detection::Rect;

/// IoU threshold applied to YOLO-style candidate boxes.
pub const NMS_IOU_THRESHOLD: f32 = 0.4;

/// Intersection over union of two pixel rectangles.
pub fn iou(a: &Rect, b: &Rect) -> f32 {
    let inter = a.intersection(b).map(|r| r.area()).unwrap_or(0) as f32;
    let union = a.area() as f32 + b.area() as f32 - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy non-max suppression.
///
/// Returns indices into `boxes`, highest score first. A box is kept when its
/// IoU with every already kept box is at most `iou_threshold`.
pub fn non_max_suppression(boxes: &[Rect], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep: Vec<usize> = Vec::new();
    for i in order {
        if keep
            .iter()
            .all(|&k| iou(&boxes[k], &boxes[i]) <= iou_threshold)
        {
            keep.push(i);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = Rect::new(0, 0, 10, 10);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &Rect::new(20, 20, 5, 5)), 0.0);
        // 5x10 overlap over 150 union.
        let b = Rect::new(5, 0, 10, 10);
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn keeps_best_box_per_cluster() {
        let boxes = [
            Rect::new(0, 0, 100, 100),
            Rect::new(4, 4, 100, 100),
            Rect::new(300, 300, 50, 50),
            Rect::new(2, 0, 100, 100),
        ];
        let scores = [0.6, 0.9, 0.7, 0.8];
        assert_eq!(non_max_suppression(&boxes, &scores, NMS_IOU_THRESHOLD), vec![1, 2]);
    }

    #[test]
    fn light_overlap_survives() {
        let boxes = [Rect::new(0, 0, 10, 10), Rect::new(5, 0, 10, 10)];
        let scores = [0.9, 0.8];
        // IoU 0.33 <= 0.4
        assert_eq!(non_max_suppression(&boxes, &scores, NMS_IOU_THRESHOLD), vec![0, 1]);
    }
}
