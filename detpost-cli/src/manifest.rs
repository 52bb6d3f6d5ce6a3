//! JSON dataset manifest and a network that replays recorded outputs.
//!
//! The manifest lists images, their regions, and the outputs a detector
//! produced for them. Outputs are replayed in image order, so the replay
//! network only supports sequential passes.

use detpost::io::load_bgr_image;
use detpost::{
    BBox, Dataset, DatasetResults, DetPostError, DetPostResult, Image, Matrix, Network,
    NetworkInputs, NetworkOutputs, RegionProposal, RoiInput,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub classes: Vec<String>,
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ImageEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub proposals: Vec<[f32; 4]>,
    #[serde(default)]
    pub ground_truth: Vec<GroundTruth>,
    pub outputs: RecordedOutputs,
}

#[derive(Debug, Deserialize)]
pub struct GroundTruth {
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub class: u32,
}

/// Network outputs for one image, one inner vector per RoI.
#[derive(Clone, Debug, Deserialize)]
pub struct RecordedOutputs {
    pub cls_prob: Vec<Vec<f32>>,
    #[serde(default)]
    pub cls_score: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub bbox_pred: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub key_pred: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub rois: Option<Vec<Vec<f32>>>,
}

fn width_of(rows: &[Vec<f32>], fallback: usize) -> usize {
    rows.first().map_or(fallback, Vec::len)
}

impl RecordedOutputs {
    fn to_outputs(&self, num_classes: usize) -> DetPostResult<NetworkOutputs> {
        let cols = width_of(&self.cls_prob, num_classes);
        let mut out = NetworkOutputs::new(Matrix::from_rows(&self.cls_prob, cols)?)?;
        if let Some(rows) = &self.cls_score {
            out = out.with_cls_score(Matrix::from_rows(rows, width_of(rows, cols))?)?;
        }
        if let Some(rows) = &self.bbox_pred {
            out = out.with_bbox_pred(Matrix::from_rows(rows, width_of(rows, 4 * cols))?)?;
        }
        if let Some(rows) = &self.key_pred {
            out = out.with_key_pred(Matrix::from_rows(rows, width_of(rows, 4 * cols))?)?;
        }
        if let Some(rows) = &self.rois {
            out = out.with_rois(Matrix::from_rows(rows, width_of(rows, 5))?)?;
        }
        Ok(out)
    }
}

/// Replays recorded outputs, one image per forward call.
pub struct ReplayNet {
    queue: VecDeque<RecordedOutputs>,
    num_classes: usize,
}

impl ReplayNet {
    pub fn new(manifest: &Manifest) -> Self {
        Self {
            queue: manifest.images.iter().map(|e| e.outputs.clone()).collect(),
            num_classes: manifest.classes.len(),
        }
    }
}

impl Network for ReplayNet {
    fn forward(&mut self, inputs: &NetworkInputs<'_>) -> DetPostResult<NetworkOutputs> {
        let recorded = self
            .queue
            .pop_front()
            .ok_or_else(|| DetPostError::Network {
                reason: "no recorded outputs left".to_string(),
            })?;
        let outputs = recorded.to_outputs(self.num_classes)?;
        if let RoiInput::Rois(rois) = &inputs.roi_input {
            if rois.rows() != outputs.num_rois() {
                return Err(DetPostError::Network {
                    reason: format!(
                        "recorded outputs have {} rows but {} rois were sent; \
                         record with dedup_boxes <= 0 or match the deduplicated rois",
                        outputs.num_rois(),
                        rois.rows()
                    ),
                });
            }
        }
        Ok(outputs)
    }
}

/// Dataset backed by a manifest; image paths resolve against `root`.
pub struct ManifestDataset {
    manifest: Manifest,
    root: PathBuf,
}

impl ManifestDataset {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&text)?;
        if manifest.classes.is_empty() {
            return Err("manifest must list at least the background class".into());
        }
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { manifest, root })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn entry(&self, index: usize) -> DetPostResult<&ImageEntry> {
        self.manifest
            .images
            .get(index)
            .ok_or(DetPostError::IndexOutOfBounds {
                index,
                len: self.manifest.images.len(),
                context: "image",
            })
    }
}

#[derive(Debug, Serialize)]
struct ClassSummary<'a> {
    class: &'a str,
    detections: usize,
}

impl Dataset for ManifestDataset {
    fn num_images(&self) -> usize {
        self.manifest.images.len()
    }

    fn num_classes(&self) -> usize {
        self.manifest.classes.len()
    }

    fn class_name(&self, class: usize) -> Option<&str> {
        self.manifest.classes.get(class).map(String::as_str)
    }

    fn image_path(&self, index: usize) -> DetPostResult<PathBuf> {
        Ok(self.root.join(&self.entry(index)?.path))
    }

    fn load_image(&self, index: usize) -> DetPostResult<Image> {
        load_bgr_image(self.image_path(index)?)
    }

    fn regions(&self, index: usize) -> DetPostResult<Vec<RegionProposal>> {
        let entry = self.entry(index)?;
        let gt = entry
            .ground_truth
            .iter()
            .map(|g| RegionProposal::ground_truth(BBox::from_array(g.bbox), g.class));
        let proposals = entry
            .proposals
            .iter()
            .map(|&b| RegionProposal::new(BBox::from_array(b)));
        Ok(gt.chain(proposals).collect())
    }

    /// Writes per-class detection counts to `summary.json`.
    fn evaluate(&self, results: &DatasetResults, output_dir: &Path) -> DetPostResult<()> {
        let summary: Vec<ClassSummary<'_>> = (1..results.num_classes())
            .map(|class| ClassSummary {
                class: self.class_name(class).unwrap_or("?"),
                detections: (0..results.num_images())
                    .filter_map(|image| results.get(class, image))
                    .map(|set| set.len())
                    .sum(),
            })
            .collect();
        let json = serde_json::to_string_pretty(&summary).map_err(|err| DetPostError::Dataset {
            reason: err.to_string(),
        })?;
        fs::write(output_dir.join("summary.json"), json).map_err(|err| DetPostError::Dataset {
            reason: err.to_string(),
        })
    }
}
