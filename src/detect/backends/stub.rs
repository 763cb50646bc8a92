use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{Luma, RgbImage};
use serde::Deserialize;

use crate::detect::backend::SegmentationModel;
use crate::detect::result::{BoundingBox, BoxPrediction, ClassNames, Mask, RawSegmentation};

/// One scripted object, in frame pixel coordinates.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ScriptedObject {
    pub class_id: u32,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]`.
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    /// Emit a mask for this object. Defaults to true.
    #[serde(default = "default_true")]
    pub mask: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct StubFixture {
    #[serde(default)]
    class_names: Vec<String>,
    objects: Vec<ScriptedObject>,
}

/// Stub backend that replays the same scripted objects on every frame.
///
/// Masks are filled ellipses inscribed in each box, rendered at the
/// configured model input resolution.
pub struct StubSegmenter {
    objects: Vec<ScriptedObject>,
    class_names: ClassNames,
    mask_width: u32,
    mask_height: u32,
}

impl StubSegmenter {
    pub fn new(objects: Vec<ScriptedObject>, class_names: ClassNames) -> Self {
        Self {
            objects,
            class_names,
            mask_width: 160,
            mask_height: 160,
        }
    }

    /// Load objects (and optionally class names) from a JSON fixture.
    ///
    /// Class names from the fixture take precedence over `fallback_names`
    /// when present.
    pub fn from_fixture<P: AsRef<Path>>(path: P, fallback_names: ClassNames) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read stub fixture {}", path.display()))?;
        let fixture: StubFixture = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid stub fixture {}: {}", path.display(), e))?;
        let names = if fixture.class_names.is_empty() {
            fallback_names
        } else {
            ClassNames::new(fixture.class_names)
        };
        Ok(Self::new(fixture.objects, names))
    }

    pub fn with_mask_size(mut self, width: u32, height: u32) -> Self {
        self.mask_width = width.max(1);
        self.mask_height = height.max(1);
        self
    }

    fn ellipse_mask(&self, bbox: BoundingBox, frame_width: u32, frame_height: u32) -> Mask {
        let sx = self.mask_width as f32 / frame_width.max(1) as f32;
        let sy = self.mask_height as f32 / frame_height.max(1) as f32;
        let bbox = bbox.normalized();
        let cx = (bbox.x1 + bbox.x2) * 0.5 * sx;
        let cy = (bbox.y1 + bbox.y2) * 0.5 * sy;
        let rx = (bbox.width() * 0.5 * sx).max(0.5);
        let ry = (bbox.height() * 0.5 * sy).max(0.5);
        Mask::from_fn(self.mask_width, self.mask_height, |x, y| {
            let dx = (x as f32 + 0.5 - cx) / rx;
            let dy = (y as f32 + 0.5 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                Luma([1.0])
            } else {
                Luma([0.0])
            }
        })
    }
}

impl SegmentationModel for StubSegmenter {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    fn infer(&mut self, frame: &RgbImage) -> Result<RawSegmentation> {
        let (width, height) = frame.dimensions();
        let mut raw = RawSegmentation::default();
        // Masks trail boxes: an object without a mask must come after every
        // object with one, otherwise index pairing would misalign them.
        let mut ordered: Vec<&ScriptedObject> = self.objects.iter().collect();
        ordered.sort_by_key(|object| !object.mask);
        for object in ordered {
            let [x1, y1, x2, y2] = object.bbox;
            let bbox = BoundingBox::new(x1, y1, x2, y2);
            raw.boxes.push(BoxPrediction {
                bbox,
                confidence: object.confidence,
                class_id: object.class_id,
            });
            if object.mask {
                raw.masks.push(self.ellipse_mask(bbox, width, height));
            }
        }
        Ok(raw)
    }
}
