//! split_dataset - partition a YOLO dataset into train and val subsets
//!
//! Every image with a same-named `.txt` label is eligible. Eligible pairs
//! are shuffled and copied under `<output>/images/{train,val}` and
//! `<output>/labels/{train,val}`.

use anyhow::{bail, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use segcam::dataset::{execute_split, plan_split, SplitConfig, DEFAULT_TRAIN_RATIO};
use segcam::ui::Ui;

#[derive(Parser, Debug)]
#[command(
    name = "split_dataset",
    about = "Split paired images and labels into train/val subsets"
)]
struct Args {
    /// Directory containing the images
    #[arg(long, value_name = "DIR")]
    images: PathBuf,

    /// Directory containing the `.txt` labels
    #[arg(long, value_name = "DIR")]
    labels: PathBuf,

    /// Output root for images/{train,val} and labels/{train,val}
    #[arg(long, value_name = "DIR")]
    output: PathBuf,

    /// Fraction of pairs assigned to train
    #[arg(long, default_value_t = DEFAULT_TRAIN_RATIO)]
    ratio: f64,

    /// Shuffle seed for a reproducible split
    #[arg(long)]
    seed: Option<u64>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, env = "SEGCAM_UI", default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let cfg = SplitConfig {
        images_dir: args.images,
        labels_dir: args.labels,
        output_dir: args.output,
        train_ratio: args.ratio,
        seed: args.seed,
    };

    let plan = {
        let _stage = ui.stage("Scan dataset");
        plan_split(&cfg)?
    };
    println!("images found:      {}", plan.images_found);
    println!("missing labels:    {}", plan.missing_labels.len());
    println!(
        "valid pairs:       {} (train {}, val {})",
        plan.total(),
        plan.train.len(),
        plan.val.len()
    );

    let summary = {
        let mut progress = ui.progress("Copy files", plan.total() as u64);
        execute_split(&cfg, &plan, |_, _| progress.inc())?
    };

    let root = cfg.output_dir.display();
    println!("output:            {}", root);
    println!("  images/train     {}", summary.train);
    println!("  images/val       {}", summary.val);
    println!("  labels/train     {}", summary.train);
    println!("  labels/val       {}", summary.val);
    if summary.copy_failures > 0 {
        bail!("{} pairs failed to copy", summary.copy_failures);
    }
    Ok(())
}
