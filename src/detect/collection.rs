use crate::detect::detection::{Color, Detection};
use crate::frame::Frame;

/// Ordered detections produced by one `detect` call.
///
/// Insertion order is kept until `sort_by_confidence` is called.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionCollection {
    detections: Vec<Detection>,
}

impl DetectionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, detection: Detection) {
        self.detections.push(detection);
    }

    /// Append every detection of `other`, keeping its order.
    pub fn extend(&mut self, other: DetectionCollection) {
        self.detections.extend(other.detections);
    }

    /// Highest confidence first. Equal scores keep their relative order.
    pub fn sort_by_confidence(&mut self) {
        self.detections
            .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Detection> {
        self.detections.get(index)
    }

    pub fn last(&self) -> Option<&Detection> {
        self.detections.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Detection> {
        self.detections.iter_mut()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    /// Out-of-range indices are ignored.
    pub fn set_render_status(&mut self, index: usize, enabled: bool) {
        if let Some(det) = self.detections.get_mut(index) {
            det.render_enabled = enabled;
        }
    }

    pub fn set_show_confidence(&mut self, show: bool) {
        for det in &mut self.detections {
            det.show_confidence = show;
        }
    }

    /// Colour every detection by its label.
    pub fn apply_label_colors(&mut self) {
        for det in &mut self.detections {
            det.color = Color::for_label(&det.label);
        }
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.detections.iter().any(|d| d.label == label)
    }

    /// True when at least one detection with `label` will be drawn.
    pub fn is_label_rendered(&self, label: &str) -> bool {
        self.detections
            .iter()
            .any(|d| d.label == label && d.render_enabled)
    }

    /// Distinct labels in first-seen order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for det in &self.detections {
            if !labels.contains(&det.label) {
                labels.push(det.label.clone());
            }
        }
        labels
    }

    pub fn render(&self, frame: &mut Frame) {
        for det in self.detections.iter().filter(|d| d.render_enabled) {
            det.render(frame);
        }
    }

    /// Status-bar text for the most recent detection.
    pub fn status_line(&self) -> Option<String> {
        self.last().map(|d| {
            format!(
                "Detected {} at: <{} {}> - <{} {}>",
                d.label,
                d.rect.x,
                d.rect.y,
                d.rect.right(),
                d.rect.bottom()
            )
        })
    }
}

impl IntoIterator for DetectionCollection {
    type Item = Detection;
    type IntoIter = std::vec::IntoIter<Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.into_iter()
    }
}

impl<'a> IntoIterator for &'a DetectionCollection {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

impl FromIterator<Detection> for DetectionCollection {
    fn from_iter<T: IntoIterator<Item = Detection>>(iter: T) -> Self {
        Self {
            detections: iter.into_iter().collect(),
        }
    }
}

/// Order class names for a toggle list: labels present in `current` first,
/// by their best confidence, then the rest alphabetically.
pub fn order_labels_by_presence(labels: &[String], current: &DetectionCollection) -> Vec<String> {
    let mut ranked = current.clone();
    ranked.sort_by_confidence();
    let mut ordered: Vec<String> = ranked
        .labels()
        .into_iter()
        .filter(|label| labels.contains(label))
        .collect();

    let mut absent: Vec<String> = labels
        .iter()
        .filter(|label| !current.contains_label(label))
        .cloned()
        .collect();
    absent.sort();
    absent.dedup();
    ordered.extend(absent);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detection::Rect;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection::new(Rect::new(1, 2, 3, 4), label, confidence)
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let mut c: DetectionCollection =
            vec![det("a", 0.2), det("b", 0.9), det("c", 0.2), det("d", 0.5)]
                .into_iter()
                .collect();
        c.sort_by_confidence();
        let order: Vec<_> = c.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(order, ["b", "d", "a", "c"]);
    }

    #[test]
    fn render_status_ignores_out_of_range() {
        let mut c: DetectionCollection = vec![det("a", 0.0)].into_iter().collect();
        c.set_render_status(5, false);
        assert!(c.is_label_rendered("a"));
        c.set_render_status(0, false);
        assert!(!c.is_label_rendered("a"));
        assert!(c.contains_label("a"));
    }

    #[test]
    fn status_line_uses_last_detection() {
        let mut c = DetectionCollection::new();
        assert_eq!(c.status_line(), None);
        c.push(det("face", 0.0));
        c.push(Detection::new(Rect::new(10, 20, 30, 40), "eye", 0.0));
        assert_eq!(
            c.status_line().as_deref(),
            Some("Detected eye at: <10 20> - <40 60>")
        );
    }

    #[test]
    fn present_labels_come_first() {
        let c: DetectionCollection = vec![det("dog", 0.7), det("cat", 0.6)].into_iter().collect();
        let labels: Vec<String> = ["zebra", "cat", "apple", "dog"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            order_labels_by_presence(&labels, &c),
            ["dog", "cat", "apple", "zebra"]
        );
    }

    #[test]
    fn present_labels_follow_best_confidence() {
        let c: DetectionCollection = vec![
            det("ant", 0.3),
            det("bee", 0.5),
            det("ant", 0.9),
            det("wasp", 0.8),
            det("moth", 0.99),
        ]
        .into_iter()
        .collect();
        let labels: Vec<String> = ["wasp", "bee", "ant", "fly", "beetle"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            order_labels_by_presence(&labels, &c),
            ["ant", "wasp", "bee", "beetle", "fly"]
        );
    }

    #[test]
    fn labels_are_distinct_in_first_seen_order() {
        let c: DetectionCollection = vec![det("b", 0.1), det("a", 0.1), det("b", 0.3)]
            .into_iter()
            .collect();
        assert_eq!(c.labels(), ["b", "a"]);
    }
}
