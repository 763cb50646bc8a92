use image::{ImageBuffer, Luma};

/// Per-pixel object probability at model input resolution.
pub type Mask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Same box with `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(self) -> Self {
        Self {
            x1: self.x1.min(self.x2),
            y1: self.y1.min(self.y2),
            x2: self.x1.max(self.x2),
            y2: self.y1.max(self.y2),
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

/// One box row of a model's output, aligned by index with its mask.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxPrediction {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: u32,
}

/// Aligned box and mask arrays as produced by a segmentation model.
///
/// The two arrays are expected to have the same length but are not required
/// to; see [`pair_detections`].
#[derive(Clone, Debug, Default)]
pub struct RawSegmentation {
    pub boxes: Vec<BoxPrediction>,
    pub masks: Vec<Mask>,
}

/// One model-predicted object instance.
#[derive(Clone, Debug)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub mask: Option<Mask>,
}

impl Detection {
    pub fn without_mask(class_id: u32, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Align boxes and masks by index.
///
/// An index that has a mask but no box is dropped. An index that has a box
/// but no mask still yields a detection, without a mask.
pub fn pair_detections(raw: RawSegmentation) -> Vec<Detection> {
    let RawSegmentation { boxes, masks } = raw;
    if masks.len() > boxes.len() {
        log::debug!(
            "dropping {} masks with no matching box",
            masks.len() - boxes.len()
        );
    }
    let mut masks = masks.into_iter();
    boxes
        .into_iter()
        .map(|prediction| Detection {
            class_id: prediction.class_id,
            confidence: prediction.confidence,
            bbox: prediction.bbox,
            mask: masks.next(),
        })
        .collect()
}

/// Display names for class ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class_id: u32) -> String {
        self.names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(class_id: u32) -> BoxPrediction {
        BoxPrediction {
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
            class_id,
        }
    }

    fn mask() -> Mask {
        Mask::from_pixel(4, 4, Luma([1.0]))
    }

    #[test]
    fn extra_masks_are_dropped() {
        let raw = RawSegmentation {
            boxes: vec![prediction(0), prediction(1)],
            masks: vec![mask(), mask(), mask()],
        };
        let detections = pair_detections(raw);
        assert_eq!(detections.len(), 2);
        assert!(detections.iter().all(|d| d.mask.is_some()));
    }

    #[test]
    fn extra_boxes_keep_detection_without_mask() {
        let raw = RawSegmentation {
            boxes: vec![prediction(0), prediction(1), prediction(2)],
            masks: vec![mask(), mask()],
        };
        let detections = pair_detections(raw);
        assert_eq!(detections.len(), 3);
        assert!(detections[0].mask.is_some());
        assert!(detections[1].mask.is_some());
        assert!(detections[2].mask.is_none());
        assert_eq!(detections[2].class_id, 2);
    }

    #[test]
    fn normalized_box_orders_corners() {
        let bbox = BoundingBox::new(30.0, 40.0, 10.0, 5.0).normalized();
        assert_eq!(bbox, BoundingBox::new(10.0, 5.0, 30.0, 40.0));
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn unknown_class_name_is_synthesized() {
        let names = ClassNames::new(vec!["person".into()]);
        assert_eq!(names.name(0), "person");
        assert_eq!(names.name(4), "class 4");
        assert_eq!(names.len(), 1);
        assert!(ClassNames::default().is_empty());
    }
}
