mod manifest;

use clap::Parser;
use detpost::TestConfig;
use manifest::{ManifestDataset, ReplayNet};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "detpost CLI (replays recorded network outputs)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct TestConfigJson {
    pixel_means: [f32; 3],
    scales: Vec<u32>,
    max_size: u32,
    size_stride: usize,
    has_rpn: bool,
    svm: bool,
    bbox_reg: bool,
    nms: f32,
    dedup_boxes: f32,
    max_per_image: usize,
    score_thresh: f32,
}

impl Default for TestConfigJson {
    fn default() -> Self {
        let cfg = TestConfig::default();
        Self {
            pixel_means: cfg.pixel_means,
            scales: cfg.scales,
            max_size: cfg.max_size,
            size_stride: cfg.size_stride,
            has_rpn: cfg.has_rpn,
            svm: cfg.svm,
            bbox_reg: cfg.bbox_reg,
            nms: cfg.nms,
            dedup_boxes: cfg.dedup_boxes,
            max_per_image: cfg.max_per_image,
            score_thresh: cfg.score_thresh,
        }
    }
}

impl From<TestConfigJson> for TestConfig {
    fn from(value: TestConfigJson) -> Self {
        Self {
            pixel_means: value.pixel_means,
            scales: value.scales,
            max_size: value.max_size,
            size_stride: value.size_stride,
            has_rpn: value.has_rpn,
            svm: value.svm,
            bbox_reg: value.bbox_reg,
            nms: value.nms,
            dedup_boxes: value.dedup_boxes,
            max_per_image: value.max_per_image,
            score_thresh: value.score_thresh,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    manifest_path: String,
    output_dir: String,
    test: TestConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_path: String::new(),
            output_dir: "output".to_string(),
            test: TestConfigJson::default(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("detpost=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.manifest_path.is_empty() {
        return Err("manifest_path must be set in the config".into());
    }

    let test_cfg = TestConfig::from(config.test);
    test_cfg.validate()?;

    let dataset = ManifestDataset::load(Path::new(&config.manifest_path))?;
    let mut net = ReplayNet::new(dataset.manifest());
    let output_dir = PathBuf::from(&config.output_dir);
    fs::create_dir_all(&output_dir)?;

    let results = detpost::test_net(&mut net, &dataset, &test_cfg, &output_dir)?;
    tracing::info!(
        images = results.num_images(),
        classes = results.num_classes(),
        output_dir = %output_dir.display(),
        "test pass finished"
    );
    println!(
        "wrote {} and summary.json to {}",
        detpost::aggregate::DETECTIONS_FILE,
        output_dir.display()
    );

    Ok(())
}
