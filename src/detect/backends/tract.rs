#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{Luma, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::SegmentationModel;
use crate::detect::result::{BoundingBox, BoxPrediction, ClassNames, Mask, RawSegmentation};

const MAX_DETECTIONS: usize = 300;

/// Tract-based backend for YOLO segmentation ONNX exports.
///
/// Expects two outputs: `[1, 4 + classes + coeffs, anchors]` box rows and
/// `[1, coeffs, mask_h, mask_w]` mask prototypes. Frames are stretched to the
/// model input size, so boxes map back to the frame with a plain scale.
pub struct TractSegmenter {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    class_names: ClassNames,
    width: u32,
    height: u32,
    min_confidence: f32,
    iou_threshold: f32,
}

struct Candidate {
    prediction: BoxPrediction,
    /// Box in model input coordinates, used for mask cropping.
    input_box: BoundingBox,
    coefficients: Vec<f32>,
}

impl TractSegmenter {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        width: u32,
        height: u32,
        class_names: ClassNames,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            class_names,
            width,
            height,
            min_confidence: 0.05,
            iou_threshold: 0.7,
        })
    }

    /// Floor below which candidates are discarded before NMS.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    fn build_input(&self, frame: &RgbImage) -> Tensor {
        let resized = imageops::resize(frame, self.width, self.height, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode_candidates(
        &self,
        rows: &tract_ndarray::ArrayView3<f32>,
        coeff_count: usize,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<Candidate>> {
        let channels = rows.shape()[1];
        let anchors = rows.shape()[2];
        let class_count = channels
            .checked_sub(4 + coeff_count)
            .filter(|count| *count > 0)
            .ok_or_else(|| {
                anyhow!(
                    "box output has {} channels, expected more than {}",
                    channels,
                    4 + coeff_count
                )
            })?;

        let sx = frame_width as f32 / self.width as f32;
        let sy = frame_height as f32 / self.height as f32;

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let (class_id, score) = (0..class_count)
                .map(|c| (c, rows[(0, 4 + c, i)]))
                .fold((0, f32::NEG_INFINITY), |best, current| {
                    if current.1 > best.1 {
                        current
                    } else {
                        best
                    }
                });
            if score.is_nan() || score < self.min_confidence {
                continue;
            }
            let cx = rows[(0, 0, i)];
            let cy = rows[(0, 1, i)];
            let w = rows[(0, 2, i)];
            let h = rows[(0, 3, i)];
            let input_box = BoundingBox::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0);
            let bbox = BoundingBox::new(
                input_box.x1 * sx,
                input_box.y1 * sy,
                input_box.x2 * sx,
                input_box.y2 * sy,
            );
            let coefficients = (0..coeff_count)
                .map(|k| rows[(0, 4 + class_count + k, i)])
                .collect();
            candidates.push(Candidate {
                prediction: BoxPrediction {
                    bbox,
                    confidence: score,
                    class_id: class_id as u32,
                },
                input_box,
                coefficients,
            });
        }
        Ok(candidates)
    }

    fn build_mask(&self, protos: &tract_ndarray::ArrayView4<f32>, candidate: &Candidate) -> Mask {
        let coeff_count = protos.shape()[1];
        let mask_h = protos.shape()[2];
        let mask_w = protos.shape()[3];
        let px = mask_w as f32 / self.width as f32;
        let py = mask_h as f32 / self.height as f32;
        let crop = BoundingBox::new(
            candidate.input_box.x1 * px,
            candidate.input_box.y1 * py,
            candidate.input_box.x2 * px,
            candidate.input_box.y2 * py,
        );

        let low_res = Mask::from_fn(mask_w as u32, mask_h as u32, |x, y| {
            let (fx, fy) = (x as f32 + 0.5, y as f32 + 0.5);
            if fx < crop.x1 || fx > crop.x2 || fy < crop.y1 || fy > crop.y2 {
                return Luma([0.0]);
            }
            let logit: f32 = (0..coeff_count)
                .map(|k| candidate.coefficients[k] * protos[(0, k, y as usize, x as usize)])
                .sum();
            Luma([sigmoid(logit)])
        });
        imageops::resize(&low_res, self.width, self.height, FilterType::Triangle)
    }
}

impl SegmentationModel for TractSegmenter {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    fn infer(&mut self, frame: &RgbImage) -> Result<RawSegmentation> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        if outputs.len() < 2 {
            return Err(anyhow!(
                "segmentation model produced {} outputs, expected 2",
                outputs.len()
            ));
        }

        let rows = outputs[0]
            .to_array_view::<f32>()
            .context("box output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("box output must be rank 3")?;
        let protos = outputs[1]
            .to_array_view::<f32>()
            .context("mask prototype tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix4>()
            .context("mask prototype output must be rank 4")?;

        let (frame_width, frame_height) = frame.dimensions();
        let candidates =
            self.decode_candidates(&rows, protos.shape()[1], frame_width, frame_height)?;
        let kept = non_max_suppression(candidates, self.iou_threshold);

        let mut raw = RawSegmentation::default();
        for candidate in &kept {
            raw.masks.push(self.build_mask(&protos, candidate));
            raw.boxes.push(candidate.prediction);
        }
        Ok(raw)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.width, self.height);
        self.infer(&blank).map(|_| ())
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Class-aware greedy NMS, highest confidence first.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.prediction
            .confidence
            .total_cmp(&a.prediction.confidence)
    });
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.prediction.class_id == candidate.prediction.class_id
                && k.prediction.bbox.iou(&candidate.prediction.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
            if kept.len() == MAX_DETECTIONS {
                break;
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(class_id: u32, confidence: f32, x: f32) -> Candidate {
        let bbox = BoundingBox::new(x, 0.0, x + 10.0, 10.0);
        Candidate {
            prediction: BoxPrediction {
                bbox,
                confidence,
                class_id,
            },
            input_box: bbox,
            coefficients: Vec::new(),
        }
    }

    #[test]
    fn nms_keeps_best_of_overlapping_same_class() {
        let kept = non_max_suppression(
            vec![candidate(0, 0.6, 0.0), candidate(0, 0.9, 1.0), candidate(1, 0.5, 0.0)],
            0.5,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].prediction.confidence, 0.9);
        assert_eq!(kept[1].prediction.class_id, 1);
    }

    #[test]
    fn sigmoid_is_centered() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
    }
}
