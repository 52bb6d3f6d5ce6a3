//! Test doubles for the network and dataset contracts.

#![allow(dead_code)]

use detpost::{
    DatasetResults, DetPostError, DetPostResult, Image, Matrix, Network, NetworkInputs,
    NetworkOutputs, RegionProposal, RoiInput,
};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Deterministic network: each RoI votes for one class picked from its `x1`.
///
/// Class `1 + (x1 / 10) % (C - 1)` scores 0.8, background 0.1, others 0.05.
/// Box deltas are zero; keypoint deltas halve the box extent.
pub struct FakeNet {
    pub num_classes: usize,
    pub with_keys: bool,
    pub with_cls_score: bool,
    /// RoIs returned in RPN mode, in pyramid coordinates.
    pub rpn_rois: Vec<[f32; 5]>,
    pub seen_rois: Vec<usize>,
}

impl FakeNet {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            with_keys: false,
            with_cls_score: false,
            rpn_rois: Vec::new(),
            seen_rois: Vec::new(),
        }
    }
}

pub fn vote_class(x1: f32, num_classes: usize) -> usize {
    1 + (x1.max(0.0) as usize / 10) % (num_classes - 1)
}

impl Network for FakeNet {
    fn forward(&mut self, inputs: &NetworkInputs<'_>) -> DetPostResult<NetworkOutputs> {
        let rois = match &inputs.roi_input {
            RoiInput::Rois(rois) => rois.clone(),
            RoiInput::ImInfo(_) => Matrix::from_rows(&self.rpn_rois, 5)?,
        };
        self.seen_rois.push(rois.rows());

        let c = self.num_classes;
        let mut prob = Vec::with_capacity(rois.rows() * c);
        for r in 0..rois.rows() {
            let row = rois.row(r).ok_or(DetPostError::Network {
                reason: "row".to_string(),
            })?;
            let voted = vote_class(row[1], c);
            for class in 0..c {
                prob.push(match class {
                    0 => 0.1,
                    k if k == voted => 0.8,
                    _ => 0.05,
                });
            }
        }
        let cls_prob = Matrix::new(prob.clone(), rois.rows(), c)?;
        let deltas = Matrix::new(vec![0.0; rois.rows() * 4 * c], rois.rows(), 4 * c)?;
        let mut out = NetworkOutputs::new(cls_prob)?.with_bbox_pred(deltas)?;
        if self.with_keys {
            let half = 0.5f32.ln();
            let keys: Vec<f32> = (0..rois.rows() * c)
                .flat_map(|_| [0.0, 0.0, half, half])
                .collect();
            out = out.with_key_pred(Matrix::new(keys, rois.rows(), 4 * c)?)?;
        }
        if self.with_cls_score {
            let raw = prob.iter().map(|p| p * 10.0).collect();
            out = out.with_cls_score(Matrix::new(raw, rois.rows(), c)?)?;
        }
        if matches!(inputs.roi_input, RoiInput::ImInfo(_)) {
            out = out.with_rois(rois)?;
        }
        Ok(out)
    }
}

/// In-memory dataset of synthetic images.
pub struct MemoryDataset {
    pub images: Vec<Option<(usize, usize)>>,
    pub regions: Vec<Vec<RegionProposal>>,
    pub classes: Vec<String>,
    pub evaluated: Mutex<Option<usize>>,
}

impl MemoryDataset {
    pub fn new(classes: &[&str]) -> Self {
        Self {
            images: Vec::new(),
            regions: Vec::new(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            evaluated: Mutex::new(None),
        }
    }

    /// Adds a `width x height` gray image; `None` simulates an unreadable file.
    pub fn push(&mut self, size: Option<(usize, usize)>, regions: Vec<RegionProposal>) {
        self.images.push(size);
        self.regions.push(regions);
    }
}

impl detpost::Dataset for MemoryDataset {
    fn num_images(&self) -> usize {
        self.images.len()
    }

    fn num_classes(&self) -> usize {
        self.classes.len()
    }

    fn class_name(&self, class: usize) -> Option<&str> {
        self.classes.get(class).map(String::as_str)
    }

    fn image_path(&self, index: usize) -> DetPostResult<PathBuf> {
        Ok(PathBuf::from(format!("memory/{index}.png")))
    }

    fn load_image(&self, index: usize) -> DetPostResult<Image> {
        match self.images.get(index).copied().flatten() {
            Some((w, h)) => Image::from_u8(&vec![128u8; w * h * 3], w, h),
            None => Err(DetPostError::ImageIo {
                reason: format!("cannot read image {index}"),
            }),
        }
    }

    fn regions(&self, index: usize) -> DetPostResult<Vec<RegionProposal>> {
        self.regions
            .get(index)
            .cloned()
            .ok_or(DetPostError::Dataset {
                reason: format!("no regions for image {index}"),
            })
    }

    fn evaluate(&self, results: &DatasetResults, _output_dir: &Path) -> DetPostResult<()> {
        let total = (0..results.num_images()).map(|i| results.image_count(i)).sum();
        *self.evaluated.lock().map_err(|_| DetPostError::Dataset {
            reason: "poisoned".to_string(),
        })? = Some(total);
        Ok(())
    }
}

/// Creates a fresh scratch directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("detpost-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
