//! Nireject - robustness study of bad-channel detection
//!
//! This crate provides the three pieces of a label-robustness experiment:
//! - Augmentation-aware train/test splitting
//! - Replayable label perturbation (noise, partial labeling, contamination)
//! - The Nireject detector under three supervision regimes with
//!   directional tail priors
//!
//! # Modules
//!
//! - [`dataset`] - Observation table and polars ingestion boundary
//! - [`split`] - Overlap, stratified and grouped splitting with standardization
//! - [`perturbation`] - Label shuffling, partial labeling and contamination control
//! - [`detector`] - Nireject detector, tail priors and configuration
//!
//! The core emits `tracing` events and installs no subscriber.

// Core error handling
pub mod error;

// Data and sampling
pub mod dataset;
pub mod split;
pub mod perturbation;

// Detection
pub mod detector;

pub use error::{NirejectError, Result};

/// Prelude for convenient imports
pub mod prelude {
    // Error handling
    pub use crate::error::{NirejectError, Result};

    // Data
    pub use crate::dataset::{Dataset, NO_AUGMENTATION};

    // Splitting
    pub use crate::split::{DataSplitter, Partition, SamplingConfig, Split, SplitMode};

    // Perturbation
    pub use crate::perturbation::{
        NoiseStrategy, PairMap, PerturbationConfig, PerturbationEngine, PerturbationRecord,
    };

    // Detection
    pub use crate::detector::{
        Detector, DetectorConfig, FitOptions, InductiveDetector, Nireject, SemiSupervisedNireject,
        SupervisedNireject, UnsupervisedNireject,
    };
}
