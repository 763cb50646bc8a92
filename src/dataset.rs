//! Train/validation split for YOLO-style datasets.
//!
//! Images live in one directory, labels (`<stem>.txt`) in another. Only
//! images with a matching label are eligible. Eligible stems are shuffled
//! and the first `floor(n * ratio)` go to `train`, the rest to `val`:
//!
//! ```text
//! <output>/images/{train,val}/<stem>.<ext>
//! <output>/labels/{train,val}/<stem>.txt
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const DEFAULT_TRAIN_RATIO: f64 = 0.7;
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

#[derive(Clone, Debug)]
pub struct SplitConfig {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub output_dir: PathBuf,
    pub train_ratio: f64,
    /// Fixed shuffle seed; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl SplitConfig {
    pub fn new(
        images_dir: impl Into<PathBuf>,
        labels_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            images_dir: images_dir.into(),
            labels_dir: labels_dir.into(),
            output_dir: output_dir.into(),
            train_ratio: DEFAULT_TRAIN_RATIO,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.train_ratio) {
            bail!("train ratio must be within [0, 1], got {}", self.train_ratio);
        }
        if !self.images_dir.is_dir() {
            bail!("image directory {} does not exist", self.images_dir.display());
        }
        if !self.labels_dir.is_dir() {
            bail!("label directory {} does not exist", self.labels_dir.display());
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subset {
    Train,
    Val,
}

impl Subset {
    pub fn dir_name(self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Val => "val",
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One image with its label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplePair {
    pub stem: String,
    pub image: PathBuf,
    pub label: PathBuf,
}

/// Shuffled assignment of pairs to subsets, before anything is copied.
#[derive(Clone, Debug)]
pub struct SplitPlan {
    pub images_found: usize,
    pub missing_labels: Vec<String>,
    pub train: Vec<SamplePair>,
    pub val: Vec<SamplePair>,
}

impl SplitPlan {
    pub fn total(&self) -> usize {
        self.train.len() + self.val.len()
    }

    fn assignments(&self) -> impl Iterator<Item = (Subset, &SamplePair)> {
        self.train
            .iter()
            .map(|pair| (Subset::Train, pair))
            .chain(self.val.iter().map(|pair| (Subset::Val, pair)))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitSummary {
    pub images_found: usize,
    pub skipped_missing_label: usize,
    pub train: usize,
    pub val: usize,
    pub copy_failures: usize,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files in `dir` keyed by stem. When two files share a stem the
/// lexically first one wins.
fn collect_images(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("read image directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut images: BTreeMap<String, PathBuf> = BTreeMap::new();
    for path in paths {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            log::warn!("skipping image with non UTF-8 name: {}", path.display());
            continue;
        };
        if let Some(existing) = images.get(&stem) {
            log::warn!(
                "duplicate image stem '{}': keeping {}, ignoring {}",
                stem,
                existing.display(),
                path.display()
            );
            continue;
        }
        images.insert(stem, path);
    }
    Ok(images)
}

/// Scan inputs, pair images with labels and shuffle into train/val.
pub fn plan_split(cfg: &SplitConfig) -> Result<SplitPlan> {
    cfg.validate()?;

    let images = collect_images(&cfg.images_dir)?;
    let images_found = images.len();
    log::info!("found {} images in {}", images_found, cfg.images_dir.display());

    let mut pairs = Vec::with_capacity(images_found);
    let mut missing_labels = Vec::new();
    for (stem, image) in images {
        let label = cfg.labels_dir.join(format!("{stem}.txt"));
        if label.is_file() {
            pairs.push(SamplePair { stem, image, label });
        } else {
            log::warn!("no label for {}, skipping", stem);
            missing_labels.push(stem);
        }
    }
    if pairs.is_empty() {
        return Err(anyhow!(
            "no image/label pairs found in {} and {}",
            cfg.images_dir.display(),
            cfg.labels_dir.display()
        ));
    }

    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    pairs.shuffle(&mut rng);

    let split_at = ((pairs.len() as f64) * cfg.train_ratio).floor() as usize;
    let val = pairs.split_off(split_at.min(pairs.len()));
    log::info!(
        "{} valid pairs: {} train, {} val",
        pairs.len() + val.len(),
        pairs.len(),
        val.len()
    );

    Ok(SplitPlan {
        images_found,
        missing_labels,
        train: pairs,
        val,
    })
}

fn subset_dirs(output: &Path, subset: Subset) -> (PathBuf, PathBuf) {
    (
        output.join("images").join(subset.dir_name()),
        output.join("labels").join(subset.dir_name()),
    )
}

fn copy_pair(pair: &SamplePair, image_dir: &Path, label_dir: &Path) -> Result<()> {
    let image_name = pair
        .image
        .file_name()
        .ok_or_else(|| anyhow!("image path {} has no file name", pair.image.display()))?;
    let image_dest = image_dir.join(image_name);
    std::fs::copy(&pair.image, &image_dest)
        .with_context(|| format!("copy {}", pair.image.display()))?;
    if let Err(err) = std::fs::copy(&pair.label, label_dir.join(format!("{}.txt", pair.stem))) {
        // An image without its label is useless for training.
        if let Err(remove_err) = std::fs::remove_file(&image_dest) {
            log::warn!("could not remove {}: {}", image_dest.display(), remove_err);
        }
        return Err(err).with_context(|| format!("copy {}", pair.label.display()));
    }
    Ok(())
}

/// Create the output tree and copy every planned pair.
///
/// A pair that fails to copy is logged and counted; the rest still go
/// through. `on_pair` runs once per pair, success or not.
pub fn execute_split(
    cfg: &SplitConfig,
    plan: &SplitPlan,
    mut on_pair: impl FnMut(Subset, &SamplePair),
) -> Result<SplitSummary> {
    for subset in [Subset::Train, Subset::Val] {
        let (image_dir, label_dir) = subset_dirs(&cfg.output_dir, subset);
        for dir in [&image_dir, &label_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create output directory {}", dir.display()))?;
        }
    }

    let mut summary = SplitSummary {
        images_found: plan.images_found,
        skipped_missing_label: plan.missing_labels.len(),
        ..SplitSummary::default()
    };
    for (subset, pair) in plan.assignments() {
        let (image_dir, label_dir) = subset_dirs(&cfg.output_dir, subset);
        match copy_pair(pair, &image_dir, &label_dir) {
            Ok(()) => match subset {
                Subset::Train => summary.train += 1,
                Subset::Val => summary.val += 1,
            },
            Err(err) => {
                log::error!("failed to copy {} to {}: {:#}", pair.stem, subset, err);
                summary.copy_failures += 1;
            }
        }
        on_pair(subset, pair);
    }
    Ok(summary)
}

/// Plan and execute in one go.
pub fn split_dataset(cfg: &SplitConfig) -> Result<SplitSummary> {
    let plan = plan_split(cfg)?;
    execute_split(cfg, &plan, |_, _| {})
}
