use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SvmVariant {
    Standard,
    Fuzzy,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    Iou,
    Distance,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ManipulatorKind {
    Identity,
    SmoothStep,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Raw,
    Histogram,
    Haar,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    Linear,
    Gaussian,
    Intersection,
    Chi2,
}

/// Tracker configuration, loaded from a TOML file. Every field has a
/// default so a partial file is enough.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub seed: u64,
    pub search_radius: f32,

    pub svm_c: f64,
    pub svm_budget_size: usize,
    pub svm_variant: SvmVariant,
    pub process_old: bool,
    pub optimize_all: bool,

    pub loss: LossKind,
    pub manipulator: ManipulatorKind,

    pub feature: FeatureKind,
    pub kernel: KernelKind,
    /// Bandwidth for the gaussian kernel.
    pub sigma: f64,

    pub frame_width: u32,
    pub frame_height: u32,

    pub sequence_base_path: String,
    pub sequence_name: String,
    pub results_path: String,

    pub quiet_mode: bool,
    pub debug_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 0,
            search_radius: 30.0,
            svm_c: 1.0,
            svm_budget_size: 0,
            svm_variant: SvmVariant::Standard,
            process_old: true,
            optimize_all: false,
            loss: LossKind::Iou,
            manipulator: ManipulatorKind::Identity,
            feature: FeatureKind::Haar,
            kernel: KernelKind::Gaussian,
            sigma: 0.2,
            frame_width: 320,
            frame_height: 240,
            sequence_base_path: String::new(),
            sequence_name: String::new(),
            results_path: String::new(),
            quiet_mode: false,
            debug_mode: false,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, Error> {
        toml::from_str(toml_str).map_err(|err| Error::Config(err.to_string()))
    }

    /// Frame diagonal, the largest translation the frame can express.
    pub fn frame_diagonal(&self) -> f32 {
        let w = self.frame_width as f32;
        let h = self.frame_height as f32;
        (w * w + h * h).sqrt()
    }
}
