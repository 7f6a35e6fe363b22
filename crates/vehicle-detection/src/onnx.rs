//! YOLO-style ONNX detector

use crate::{ClassMap, Detection, DetectionError, Detector, DetectorConfig};
use frame_source::VideoFrame;
use ndarray::{Array4, ArrayViewD, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, error, info};

/// Detector backed by an onnxruntime session.
///
/// Expects a single `[1, 3, S, S]` float input normalized to 0..1 and a
/// `[1, 4 + classes, anchors]` output with center-format boxes.
pub struct OnnxDetector {
    session: Session,
    class_map: ClassMap,
    confidence_threshold: f32,
    nms_iou_threshold: f32,
    input_size: u32,
}

impl OnnxDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectionError> {
        let path = config
            .model_path
            .as_deref()
            .ok_or_else(|| DetectionError::ModelLoad("No model path configured".into()))?;

        info!("Loading detection model from {}", path);
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| {
                error!("Failed to load detection model: {}", e);
                DetectionError::ModelLoad(e.to_string())
            })?;

        Ok(Self {
            session,
            class_map: config.class_map(),
            confidence_threshold: config.confidence_threshold,
            nms_iou_threshold: config.nms_iou_threshold,
            input_size: config.input_size,
        })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Array4<f32>, DetectionError> {
        let img = frame
            .to_rgb_image()
            .ok_or_else(|| DetectionError::InvalidFrame("Pixel buffer size mismatch".into()))?;

        let size = self.input_size;
        let resized =
            image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);

        let mut input = Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                input[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
            }
        }
        Ok(input)
    }

    fn decode(&self, output: ArrayViewD<'_, f32>, frame: &VideoFrame) -> Vec<Detection> {
        // [1, 4 + classes, anchors] -> [4 + classes, anchors]
        let output = output.index_axis(Axis(0), 0);
        let shape = output.shape();
        if shape.len() != 2 || shape[0] <= 4 {
            return Vec::new();
        }
        let (rows, anchors) = (shape[0], shape[1]);

        let scale_x = frame.width as f32 / self.input_size as f32;
        let scale_y = frame.height as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let (class_id, score) = (4..rows)
                .map(|row| (row - 4, output[[row, anchor]]))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

            if score < self.confidence_threshold {
                continue;
            }

            let cx = output[[0, anchor]] * scale_x;
            let cy = output[[1, anchor]] * scale_y;
            let w = output[[2, anchor]] * scale_x;
            let h = output[[3, anchor]] * scale_y;

            candidates.push(Detection {
                class_id: class_id as u32,
                category: self.class_map.category(class_id as u32),
                confidence: score,
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
            });
        }

        non_max_suppression(candidates, self.nms_iou_threshold)
    }
}

impl Detector for OnnxDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<Vec<Detection>, DetectionError> {
        let input = self.preprocess(frame)?;
        let tensor =
            Tensor::from_array(input).map_err(|e| DetectionError::Inference(e.to_string()))?;

        let inputs = ort::inputs![tensor].map_err(|e| DetectionError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let output = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let detections = self.decode(output, frame);
        debug!("Model returned {} detections", detections.len());
        Ok(detections)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a[2] * a[3] + b[2] * b[3] - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Greedy per-class suppression, highest confidence first
fn non_max_suppression(mut candidates: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(class_id: u32, confidence: f32, bbox: [f32; 4]) -> Detection {
        Detection {
            class_id,
            category: None,
            confidence,
            bbox,
        }
    }

    #[test]
    fn test_iou() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &[20.0, 20.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping_same_class() {
        let kept = non_max_suppression(
            vec![
                boxed(2, 0.6, [0.0, 0.0, 10.0, 10.0]),
                boxed(2, 0.9, [1.0, 1.0, 10.0, 10.0]),
                boxed(7, 0.5, [1.0, 1.0, 10.0, 10.0]),
            ],
            0.45,
        );

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].class_id, 7);
    }
}
