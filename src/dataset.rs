//! Dataset contract and the whole-dataset detection loop.
//!
//! Images are processed independently and each image's slot in
//! [`DatasetResults`] is written exactly once, so the `rayon` variant only
//! needs one network instance per worker and a final scatter by index.

use crate::aggregate::{DatasetResults, DetectionSet};
use crate::config::TestConfig;
use crate::detect::detect_image;
use crate::image::Image;
use crate::net::Network;
use crate::roi::{detection_proposals, RegionProposal};
use crate::trace::{trace_event, trace_span};
use crate::util::DetPostResult;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Image collection with annotations and an evaluation entry point.
pub trait Dataset {
    fn num_images(&self) -> usize;

    /// Class count including background at index `0`.
    fn num_classes(&self) -> usize;

    fn class_name(&self, class: usize) -> Option<&str>;

    fn image_path(&self, index: usize) -> DetPostResult<PathBuf>;

    /// Loads image `index` as a 3-channel image in the configured channel order.
    fn load_image(&self, index: usize) -> DetPostResult<Image>;

    /// Region records for image `index`: ground-truth boxes carry their class,
    /// plain proposals carry class `0`.
    fn regions(&self, index: usize) -> DetPostResult<Vec<RegionProposal>>;

    /// Consumes the final detections, writing any artifacts into `output_dir`.
    fn evaluate(&self, results: &DatasetResults, output_dir: &Path) -> DetPostResult<()>;
}

fn detect_one<N, D>(
    net: &mut N,
    dataset: &D,
    index: usize,
    cfg: &TestConfig,
) -> DetPostResult<Vec<DetectionSet>>
where
    N: Network + ?Sized,
    D: Dataset + ?Sized,
{
    let start = Instant::now();
    let image = dataset.load_image(index)?;
    let proposals = if cfg.has_rpn {
        None
    } else {
        Some(detection_proposals(&dataset.regions(index)?))
    };
    let sets = detect_image(net, &image, proposals.as_deref(), cfg)?;
    trace_event!(
        "image_detected",
        index = index,
        kept = sets.iter().map(DetectionSet::len).sum::<usize>(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1e3
    );
    Ok(sets)
}

/// Runs detection over every image sequentially.
///
/// Any failure aborts the pass; no partial results are returned.
pub fn detect_dataset<N, D>(
    net: &mut N,
    dataset: &D,
    cfg: &TestConfig,
) -> DetPostResult<DatasetResults>
where
    N: Network + ?Sized,
    D: Dataset + ?Sized,
{
    cfg.validate()?;
    let num_images = dataset.num_images();
    let _span = trace_span!("test_net", images = num_images).entered();

    let mut results = DatasetResults::new(dataset.num_classes(), num_images);
    for index in 0..num_images {
        let sets = detect_one(net, dataset, index, cfg)?;
        results.insert_image(index, sets)?;
    }
    Ok(results)
}

/// Runs detection over every image in parallel, one network per worker.
///
/// `make_net` is called once per rayon worker split; results are scattered
/// into place by image index.
#[cfg(feature = "rayon")]
pub fn detect_dataset_par<N, D, F>(
    make_net: F,
    dataset: &D,
    cfg: &TestConfig,
) -> DetPostResult<DatasetResults>
where
    N: Network,
    D: Dataset + Sync + ?Sized,
    F: Fn() -> DetPostResult<N> + Sync + Send,
{
    use rayon::prelude::*;

    cfg.validate()?;
    let num_images = dataset.num_images();
    let _span = trace_span!("test_net", images = num_images, parallel = true).entered();

    let per_image: Vec<DetPostResult<Vec<DetectionSet>>> = (0..num_images)
        .into_par_iter()
        .map_init(&make_net, |net, index| match net {
            Ok(net) => detect_one(net, dataset, index, cfg),
            Err(err) => Err(err.clone()),
        })
        .collect();

    let mut results = DatasetResults::new(dataset.num_classes(), num_images);
    for (index, sets) in per_image.into_iter().enumerate() {
        results.insert_image(index, sets?)?;
    }
    Ok(results)
}

/// Detects, persists `detections.bin` into `output_dir`, then evaluates.
pub fn test_net<N, D>(
    net: &mut N,
    dataset: &D,
    cfg: &TestConfig,
    output_dir: &Path,
) -> DetPostResult<DatasetResults>
where
    N: Network + ?Sized,
    D: Dataset + ?Sized,
{
    let results = detect_dataset(net, dataset, cfg)?;
    finish(dataset, results, output_dir)
}

/// Parallel counterpart of [`test_net`].
#[cfg(feature = "rayon")]
pub fn test_net_par<N, D, F>(
    make_net: F,
    dataset: &D,
    cfg: &TestConfig,
    output_dir: &Path,
) -> DetPostResult<DatasetResults>
where
    N: Network,
    D: Dataset + Sync + ?Sized,
    F: Fn() -> DetPostResult<N> + Sync + Send,
{
    let results = detect_dataset_par(make_net, dataset, cfg)?;
    finish(dataset, results, output_dir)
}

fn finish<D: Dataset + ?Sized>(
    dataset: &D,
    results: DatasetResults,
    output_dir: &Path,
) -> DetPostResult<DatasetResults> {
    let path = results.save(output_dir)?;
    trace_event!("detections_saved", path = &*path.to_string_lossy());
    dataset.evaluate(&results, output_dir)?;
    Ok(results)
}
