//! Tests for reading the pre-processed dataset archive

use ndarray::{Array1, Array3};
use ndarray_npy::NpzWriter;
use std::fs::File;
use std::path::Path;
use stress_classifier::core::WindowSpec;
use stress_classifier::dataset::{load_dataset, DatasetError};

fn write_archive(path: &Path, x: &Array3<f64>, y: &Array1<i64>, suffix: &str) {
    let mut npz = NpzWriter::new(File::create(path).unwrap());
    npz.add_array(format!("X{suffix}"), x).unwrap();
    npz.add_array(format!("Y{suffix}"), y).unwrap();
    npz.finish().unwrap();
}

fn fixture(segments: usize) -> (Array3<f64>, Array1<i64>) {
    let x = Array3::from_shape_fn((segments, 120, 6), |(s, p, c)| {
        (s as f64) + (p as f64) / 1000.0 + (c as f64) * 10.0
    });
    let y = Array1::from_iter((0..segments).map(|i| [1, 1, 2, 4, 0][i % 5]));
    (x, y)
}

#[test]
fn test_load_and_view() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.npz");
    let (x, y) = fixture(5);
    write_archive(&path, &x, &y, "");

    let dataset = load_dataset(&path).unwrap();
    assert_eq!(dataset.num_segments(), 5);
    assert_eq!(dataset.points_per_segment(), 120);

    let view = dataset.to_view(&WindowSpec::default());
    assert_eq!(view.metadata.total_points, 600);
    assert_eq!(view.metadata.total_duration_seconds, 50);
    assert_eq!(view.labels.len(), 5);
    assert_eq!(view.labels[3].label_name, "meditation");
    assert_eq!(view.labels[4].label_name, "transient/not_defined");

    // Column 4 is EDA
    assert!((view.signals.eda[0] - 40.0).abs() < 1e-9);
    assert!((view.signals.temp[120] - 51.0).abs() < 1e-9);

    let baseline = view
        .label_statistics
        .iter()
        .find(|s| s.label_id == 1)
        .unwrap();
    assert_eq!(baseline.count, 2);
    assert!((baseline.percentage - 40.0).abs() < 1e-9);
}

#[test]
fn test_numpy_style_entry_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.npz");
    let (x, y) = fixture(3);
    write_archive(&path, &x, &y, ".npy");

    let dataset = load_dataset(&path).unwrap();
    assert_eq!(dataset.num_segments(), 3);
}

#[test]
fn test_wrong_channel_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.npz");
    let x = Array3::<f64>::zeros((2, 120, 4));
    let y = Array1::from_vec(vec![1_i64, 2]);
    write_archive(&path, &x, &y, "");

    assert!(matches!(load_dataset(&path), Err(DatasetError::Shape(_))));
}

#[test]
fn test_absent_archive() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_dataset(&dir.path().join("missing.npz")).unwrap_err();
    assert!(matches!(err, DatasetError::NotFound(_)));
}

#[test]
fn test_missing_labels_lists_every_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed.npz");
    let (x, y) = fixture(2);
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("X", &x).unwrap();
    npz.add_array("labels", &y).unwrap();
    npz.finish().unwrap();

    match load_dataset(&path) {
        Err(DatasetError::Read(msg)) => {
            assert!(msg.contains("cannot read `Y`"), "{msg}");
            assert!(msg.contains("Y as i64"), "{msg}");
            assert!(msg.contains("Y.npy as u8"), "{msg}");
        }
        other => panic!("expected read error, got {other:?}"),
    }
}
