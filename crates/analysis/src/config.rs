//! Analysis configuration and the immutable per-run settings built from it.

use crate::classifier::{BdtTrackClassifier, TrackClassifier};
use crate::errors::{AnalysisError, Result};
use crate::fit::{LinearTrackFitter, TrackFitter};
use crate::range::EnergyFromRangeTable;
use crate::recombination::RecombinationModel;
use crate::selection::{HitSelectionConfig, HitSelectionPolicy};
use larreco_bdt::BdtModel;
use larreco_types::{FiducialVolume, Point};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fiducial volume
    pub fiducial: FiducialConfig,
    /// Track fitting
    pub track_fit: TrackFitConfig,
    /// Recombination model (Birks fit)
    pub recombination: RecombinationModel,
    /// Energy-from-range tables
    pub energy_from_range: EnergyFromRangeConfig,
    /// Track classifier
    pub classifier: ClassifierConfig,
    /// Which hits receive the recombination correction
    pub hit_selection: HitSelectionConfig,
    /// Monte Carlo truth
    pub truth: TruthConfig,
}

/// Detector bounds and the margins cut from them (cm)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiducialConfig {
    pub detector_min: [f32; 3],
    pub detector_max: [f32; 3],
    pub x_margin: f32,
    pub y_margin: f32,
    pub z_margin: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackFitConfig {
    /// Half-width, in hits, of the local fit window
    pub sliding_fit_window: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyFromRangeConfig {
    pub proton: EnergyFromRangeTable,
    pub pion_muon: EnergyFromRangeTable,
}

/// Classifier model source. An inline model takes precedence over a path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_path: Option<PathBuf>,
    pub model: Option<BdtModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthConfig {
    pub add_mc_information: bool,
    /// Truth particles above this containment fraction count as contained
    pub containment_fraction_lower_bound: f32,
}

impl Default for FiducialConfig {
    fn default() -> Self {
        Self {
            detector_min: [0.0, -116.5, 0.0],
            detector_max: [256.35, 116.5, 1036.8],
            x_margin: 10.0,
            y_margin: 20.0,
            z_margin: 10.0,
        }
    }
}

impl FiducialConfig {
    pub fn volume(&self) -> FiducialVolume {
        FiducialVolume::from_detector(
            Point::from(self.detector_min),
            Point::from(self.detector_max),
            Point::new(self.x_margin, self.y_margin, self.z_margin),
        )
    }
}

impl Default for TrackFitConfig {
    fn default() -> Self {
        Self {
            sliding_fit_window: 25,
        }
    }
}

impl Default for TruthConfig {
    fn default() -> Self {
        Self {
            add_mc_information: true,
            containment_fraction_lower_bound: 0.9,
        }
    }
}

impl ClassifierConfig {
    pub fn load_model(&self) -> Result<BdtModel> {
        match (&self.model, &self.model_path) {
            (Some(model), path) => {
                if path.is_some() {
                    warn!("Both an inline classifier model and a model path are set, using the inline model");
                }
                model.validate()?;
                Ok(model.clone())
            }
            (None, Some(path)) => Ok(BdtModel::from_json_file(path)?),
            (None, None) => Err(AnalysisError::Config(
                "No classifier model configured".to_string(),
            )),
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file. A relative classifier model path is
    /// taken relative to the file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;

        if let (Some(model_path), Some(dir)) = (&config.classifier.model_path, path.parent()) {
            if model_path.is_relative() {
                config.classifier.model_path = Some(dir.join(model_path));
            }
        }

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Apply `LARRECO_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, returning the keys that took effect.
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut applied = Vec::new();

        if let Some(val) = lookup("LARRECO_ADD_MC_INFORMATION") {
            match val.parse() {
                Ok(v) => {
                    self.truth.add_mc_information = v;
                    applied.push("truth.add_mc_information".to_string());
                }
                Err(_) => warn!("Ignoring LARRECO_ADD_MC_INFORMATION={}", val),
            }
        }

        if let Some(val) = lookup("LARRECO_SLIDING_FIT_WINDOW") {
            match val.parse() {
                Ok(v) => {
                    self.track_fit.sliding_fit_window = v;
                    applied.push("track_fit.sliding_fit_window".to_string());
                }
                Err(_) => warn!("Ignoring LARRECO_SLIDING_FIT_WINDOW={}", val),
            }
        }

        if let Some(val) = lookup("LARRECO_MAX_DEDX") {
            match val.parse() {
                Ok(v) => {
                    self.recombination.max_dedx = v;
                    applied.push("recombination.max_dedx".to_string());
                }
                Err(_) => warn!("Ignoring LARRECO_MAX_DEDX={}", val),
            }
        }

        if !applied.is_empty() {
            info!("Environment overrides applied: {:?}", applied);
        }
        applied
    }

    /// Validate configuration, returning warnings
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let fiducial = &self.fiducial;
        if (0..3).any(|axis| fiducial.detector_min[axis] >= fiducial.detector_max[axis]) {
            warnings.push("Detector bounds are inverted or empty".to_string());
        }
        if fiducial.volume().is_empty() {
            warnings.push("Fiducial margins leave an empty volume".to_string());
        }

        if self.track_fit.sliding_fit_window == 0 {
            warnings.push("Sliding fit window is 0".to_string());
        }

        let recombination = &self.recombination;
        if !(recombination.alpha > 0.0) {
            warnings.push(format!("Recombination alpha {} is not positive", recombination.alpha));
        }
        if !(recombination.beta > 0.0) {
            warnings.push(format!("Recombination beta {} is not positive", recombination.beta));
        }
        if !(recombination.max_dedx > 0.0) {
            warnings.push("Max dE/dx is not positive, no hit will be corrected".to_string());
        }

        for (name, table) in [
            ("proton", &self.energy_from_range.proton),
            ("pion_muon", &self.energy_from_range.pion_muon),
        ] {
            if table.is_empty() {
                warnings.push(format!(
                    "Energy-from-range table {name} is empty, charge will be used instead"
                ));
            }
            for (a, b) in table.overlaps() {
                warnings.push(format!(
                    "Energy-from-range table {name}: entries {a} and {b} overlap, entry {a} wins"
                ));
            }
            for i in table.malformed() {
                warnings.push(format!("Energy-from-range table {name}: entry {i} is malformed"));
            }
        }

        if self.classifier.model.is_none() && self.classifier.model_path.is_none() {
            warnings.push("No classifier model configured".to_string());
        }

        if let HitSelectionConfig::ExcludeEnds { fraction } = self.hit_selection {
            if !(0.0..=0.5).contains(&fraction) {
                warnings.push(format!("Hit selection fraction {fraction} is clamped to [0, 0.5]"));
            }
        }

        if !(0.0..=1.0).contains(&self.truth.containment_fraction_lower_bound) {
            warnings.push("Containment fraction lower bound should be between 0 and 1".to_string());
        }

        if warnings.is_empty() {
            info!("Configuration validation passed");
        } else {
            warn!("Configuration validation warnings: {:?}", warnings);
        }

        warnings
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| AnalysisError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }
}

/// Everything the engine needs for a run, fixed before the first event.
pub struct AnalysisSettings {
    config: AnalysisConfig,
    fiducial: FiducialVolume,
    classifier: Box<dyn TrackClassifier>,
    hit_selection: Box<dyn HitSelectionPolicy>,
    fitter: Box<dyn TrackFitter>,
}

impl AnalysisSettings {
    /// Build settings, loading the classifier model the configuration names.
    pub fn from_config(config: AnalysisConfig) -> Result<Self> {
        let model = config.classifier.load_model()?;
        info!(
            "Track classifier model {} ({} trees)",
            model.model_hash()?,
            model.trees.len()
        );
        let classifier = BdtTrackClassifier::new(model)?;
        Self::with_classifier(config, Box::new(classifier))
    }

    /// Build settings around an already constructed classifier.
    pub fn with_classifier(
        config: AnalysisConfig,
        classifier: Box<dyn TrackClassifier>,
    ) -> Result<Self> {
        config.validate();

        let recombination = &config.recombination;
        if !(recombination.alpha > 0.0 && recombination.alpha.is_finite()) {
            return Err(AnalysisError::InvalidParameters(format!(
                "recombination alpha must be positive, got {}",
                recombination.alpha
            )));
        }
        if !(recombination.beta > 0.0 && recombination.beta.is_finite()) {
            return Err(AnalysisError::InvalidParameters(format!(
                "recombination beta must be positive, got {}",
                recombination.beta
            )));
        }
        if config.track_fit.sliding_fit_window == 0 {
            return Err(AnalysisError::InvalidParameters(
                "sliding fit window must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            fiducial: config.fiducial.volume(),
            hit_selection: config.hit_selection.build(),
            fitter: Box::new(LinearTrackFitter),
            classifier,
            config,
        })
    }

    pub fn with_fitter(mut self, fitter: Box<dyn TrackFitter>) -> Self {
        self.fitter = fitter;
        self
    }

    pub fn with_hit_selection(mut self, policy: Box<dyn HitSelectionPolicy>) -> Self {
        self.hit_selection = policy;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn fiducial(&self) -> &FiducialVolume {
        &self.fiducial
    }

    pub fn classifier(&self) -> &dyn TrackClassifier {
        self.classifier.as_ref()
    }

    pub fn hit_selection(&self) -> &dyn HitSelectionPolicy {
        self.hit_selection.as_ref()
    }

    pub fn fitter(&self) -> &dyn TrackFitter {
        self.fitter.as_ref()
    }

    pub fn recombination(&self) -> &RecombinationModel {
        &self.config.recombination
    }

    pub fn proton_table(&self) -> &EnergyFromRangeTable {
        &self.config.energy_from_range.proton
    }

    pub fn pion_muon_table(&self) -> &EnergyFromRangeTable {
        &self.config.energy_from_range.pion_muon
    }

    pub fn sliding_fit_window(&self) -> usize {
        self.config.track_fit.sliding_fit_window
    }

    pub fn add_mc_information(&self) -> bool {
        self.config.truth.add_mc_information
    }

    pub fn containment_fraction_lower_bound(&self) -> f32 {
        self.config.truth.containment_fraction_lower_bound
    }
}
