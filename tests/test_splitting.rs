//! Integration tests for splitting: ratios, disjointness and group integrity

use nireject::dataset::Dataset;
use nireject::split::{DataSplitter, SamplingConfig, SplitMode};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};

const FEATURES: [&str; 5] = ["snr", "cov", "flatline", "sci", "spikes"];

fn features() -> Vec<String> {
    FEATURES.iter().map(|s| s.to_string()).collect()
}

/// 40 original rows (every fifth anomalous) in 8 sessions, plus one AAFT
/// variant per row
fn frame() -> DataFrame {
    let n = 40;
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); FEATURES.len()];
    let mut labels = Vec::new();
    let mut signal_ids = Vec::new();
    let mut augmentation = Vec::new();
    let mut sessions = Vec::new();

    for tag in ["None", "AAFT"] {
        for i in 0..n {
            let anomalous = i % 5 == 0;
            let jitter = if tag == "AAFT" { 0.05 } else { 0.0 };
            for (j, column) in columns.iter_mut().enumerate() {
                let base = ((i * (j + 3)) % 13) as f64;
                column.push(base + if anomalous { 8.0 } else { 0.0 } + jitter);
            }
            labels.push(i64::from(anomalous));
            signal_ids.push(format!("sig{:02}", i));
            augmentation.push(tag.to_string());
            sessions.push(format!("session{}", i / 5));
        }
    }

    df!(
        "snr" => &columns[0],
        "cov" => &columns[1],
        "flatline" => &columns[2],
        "sci" => &columns[3],
        "spikes" => &columns[4],
        "labels" => labels,
        "signal_id" => signal_ids,
        "augmentation" => augmentation,
        "session" => sessions
    )
    .unwrap()
}

fn dataset() -> Dataset {
    Dataset::from_dataframe(&frame(), &features()).unwrap()
}

fn anomaly_rate(labels: &ndarray::Array1<i64>) -> f64 {
    labels.iter().filter(|&&l| l == 1).count() as f64 / labels.len() as f64
}

// ============================================================================
// Stratified split
// ============================================================================

#[test]
fn test_end_to_end_stratified_split() {
    let data = dataset();
    let split = DataSplitter::new(SplitMode::Stratified, 0.6)
        .with_seed(42)
        .with_standardize(false)
        .split(&data, &features())
        .unwrap();

    assert_eq!(split.train.len(), 16);
    assert_eq!(split.test.len(), 24);

    let train: HashSet<_> = split.train.idx.iter().collect();
    assert!(split.test.idx.iter().all(|i| !train.contains(i)));

    for labels in [&split.train.labels, &split.test.labels] {
        let rate = anomaly_rate(labels);
        assert!((rate - 0.2).abs() <= 0.02, "anomaly rate {} off 0.2", rate);
    }
}

#[test]
fn test_split_ratio_within_tolerance() {
    let data = dataset();
    for (seed, fraction) in [(1, 0.2), (2, 0.4), (3, 0.5), (4, 0.75)] {
        let split = DataSplitter::new(SplitMode::Stratified, fraction)
            .with_seed(seed)
            .split(&data, &features())
            .unwrap();
        let total = (split.train.len() + split.test.len()) as f64;
        let observed = split.test.len() as f64 / total;
        assert!(
            (observed - fraction).abs() <= 0.1 * fraction,
            "fraction {} gave {}",
            fraction,
            observed
        );
    }
}

#[test]
fn test_same_seed_same_partition() {
    let data = dataset();
    let splitter = DataSplitter::new(SplitMode::Stratified, 0.4).with_seed(7);
    let a = splitter.split(&data, &features()).unwrap();
    let b = splitter.split(&data, &features()).unwrap();
    assert_eq!(a.train.idx, b.train.idx);
    assert_eq!(a.test.idx, b.test.idx);
    assert_eq!(a.train.features, b.train.features);
}

#[test]
fn test_full_fraction_degenerates_to_overlap() {
    let data = dataset();
    let split = DataSplitter::new(SplitMode::Stratified, 1.0)
        .with_seed(3)
        .split(&data, &features())
        .unwrap();
    assert_eq!(split.train.len(), split.test.len());
    assert!(split.is_overlapping());
}

#[test]
fn test_overlap_mode() {
    let data = dataset();
    let split = DataSplitter::new(SplitMode::Overlap, 0.3)
        .split(&data, &features())
        .unwrap();
    assert_eq!(split.train.idx, split.test.idx);
    assert_eq!(split.train.len(), 40);
}

// ============================================================================
// Augmentation and groups
// ============================================================================

#[test]
fn test_augmented_rows_follow_their_original() {
    let data = dataset();
    let split = DataSplitter::new(SplitMode::Stratified, 0.4)
        .with_seed(11)
        .with_augmentation(vec!["AAFT".to_string()])
        .split(&data, &features())
        .unwrap();

    let aug = split.augmented("AAFT").unwrap();
    assert_eq!(aug.train.signal_ids, split.train.signal_ids);
    assert_eq!(aug.test.signal_ids, split.test.signal_ids);
    assert_eq!(aug.train.labels, split.train.labels);

    let primary_train: HashSet<_> = split.train.signal_ids.iter().collect();
    let aug_train: HashSet<_> = aug.train.signal_ids.iter().collect();
    assert!(primary_train.symmetric_difference(&aug_train).next().is_none());
    assert!(aug.train.idx.iter().all(|&i| i >= 40));
}

#[test]
fn test_grouped_split_keeps_sessions_whole() {
    let data = dataset();
    let session_of: HashMap<usize, String> = data
        .index()
        .iter()
        .copied()
        .zip(data.group_column("session").unwrap().iter().cloned())
        .collect();

    let split = DataSplitter::new(SplitMode::Grouped, 0.5)
        .with_seed(5)
        .with_groups(vec!["session".to_string()])
        .split(&data, &features())
        .unwrap();

    let train: HashSet<_> = split.train.idx.iter().map(|i| &session_of[i]).collect();
    let test: HashSet<_> = split.test.idx.iter().map(|i| &session_of[i]).collect();
    assert!(train.is_disjoint(&test));
    assert_eq!(split.test.len(), 20);
}

#[test]
fn test_grouped_split_aligns_augmentation() {
    let data = dataset();
    let split = DataSplitter::new(SplitMode::Grouped, 0.5)
        .with_seed(9)
        .with_groups(vec!["session".to_string()])
        .with_augmentation(vec!["AAFT".to_string()])
        .split(&data, &features())
        .unwrap();

    let aug = split.augmented("AAFT").unwrap();
    assert_eq!(aug.train.signal_ids, split.train.signal_ids);
    assert_eq!(aug.test.signal_ids, split.test.signal_ids);
    assert_eq!(aug.test.labels, split.test.labels);

    let train: HashSet<_> = aug.train.idx.iter().collect();
    assert!(aug.test.idx.iter().all(|i| !train.contains(i)));
    assert!(aug.train.idx.iter().chain(&aug.test.idx).all(|&i| i >= 40));
}

#[test]
fn test_duplicate_primary_signal_ids_rejected() {
    let mut frame = frame();
    // rename sig01 to sig00 on every row so two primary rows share an id
    let renamed: Vec<String> = frame
        .column("signal_id")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|s| s.unwrap().replace("sig01", "sig00"))
        .collect();
    frame.with_column(Series::new("signal_id".into(), renamed)).unwrap();
    let data = Dataset::from_dataframe(&frame, &features()).unwrap();

    let err = DataSplitter::new(SplitMode::Stratified, 0.5)
        .with_seed(0)
        .with_augmentation(vec!["AAFT".to_string()])
        .split(&data, &features())
        .unwrap_err();
    assert!(err.to_string().contains("'sig00'"));
}

// ============================================================================
// Configuration and failures
// ============================================================================

#[test]
fn test_repeat_from_config() {
    let data = dataset();
    let config = SamplingConfig::new()
        .with_features(features())
        .with_test_size(0.5)
        .with_seeds(vec![42])
        .with_repeats(3);

    let splits = DataSplitter::repeat(&data, &config).unwrap();
    assert_eq!(splits.len(), 3);
    let seeds: HashSet<_> = splits.iter().map(|s| s.seed).collect();
    assert_eq!(seeds.len(), 3);
    assert!(splits.iter().all(|s| s.split.test.len() == 20));
}

#[test]
fn test_unknown_feature_rejected() {
    let data = dataset();
    let err = DataSplitter::new(SplitMode::Stratified, 0.5)
        .split(&data, &["missing".to_string()])
        .unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_empty_test_partition_rejected() {
    let data = dataset();
    let err = DataSplitter::new(SplitMode::Stratified, 0.0)
        .with_seed(1)
        .split(&data, &features())
        .unwrap_err();
    assert!(err.to_string().contains("test_fraction=0"));
}
