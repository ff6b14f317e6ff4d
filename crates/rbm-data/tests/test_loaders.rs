//! File-level loader tests.

use std::io::Write;

use ndarray::{array, Array2};
use ndarray_npy::write_npy;
use rbm_core::dataset::DataSource;
use rbm_core::error::RbmError;
use rbm_data::{load_idx_images, load_lattice_csv, load_mnist_train, load_npy, LatticeEncoding};

#[test]
fn test_lattice_file_batches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state0.data");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "s0,s1,s2,s3,s4,s5,s6,s7,s8").unwrap();
    for i in 0..5 {
        let row: Vec<String> = (0..9).map(|j| if (i + j) % 2 == 0 { "1" } else { "-1" }.to_string()).collect();
        writeln!(file, "{}", row.join(",")).unwrap();
    }
    drop(file);

    let data = load_lattice_csv(&path, 3, LatticeEncoding::Spin).unwrap();
    assert_eq!(data.len(), 5);
    assert_eq!(data.n_visible(), 9);

    let sizes: Vec<usize> = data.batches(2, false).map(|b| b.unwrap().nrows()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(data.samples()[[1, 0]], 0.0);
    assert_eq!(data.samples()[[1, 1]], 1.0);
}

#[test]
fn test_missing_lattice_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_lattice_csv(dir.path().join("nope"), 4, LatticeEncoding::Binary).unwrap_err();
    assert!(matches!(err, RbmError::Io { .. }));
}

#[test]
fn test_mnist_directory_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = Vec::new();
    for v in [2051u32, 1, 28, 28] {
        bytes.extend_from_slice(&v.to_be_bytes());
    }
    bytes.extend((0..784).map(|i| (i % 256) as u8));
    std::fs::write(dir.path().join("train-images-idx3-ubyte"), &bytes).unwrap();

    let data = load_mnist_train(dir.path()).unwrap();
    assert_eq!(data.n_visible(), 784);
    assert_eq!(data.len(), 1);
    assert!((data.samples()[[0, 255]] - 1.0).abs() < 1e-7);

    let same = load_idx_images(dir.path().join("train-images-idx3-ubyte")).unwrap();
    assert_eq!(same.samples(), data.samples());
}

#[test]
fn test_npy_element_types() {
    let dir = tempfile::tempdir().unwrap();

    let f32_path = dir.path().join("f32.npy");
    write_npy(&f32_path, &array![[0.0f32, 0.5], [1.0, 0.25]]).unwrap();
    assert_eq!(load_npy(&f32_path).unwrap().samples()[[0, 1]], 0.5);

    let f64_path = dir.path().join("f64.npy");
    write_npy(&f64_path, &array![[0.75f64, 0.5]]).unwrap();
    assert_eq!(load_npy(&f64_path).unwrap().samples()[[0, 0]], 0.75);

    let u8_path = dir.path().join("u8.npy");
    write_npy(&u8_path, &array![[0u8, 255], [51, 0]]).unwrap();
    let data = load_npy(&u8_path).unwrap();
    assert_eq!(data.samples()[[0, 1]], 1.0);
    assert!((data.samples()[[1, 0]] - 0.2).abs() < 1e-6);

    let bool_path = dir.path().join("bool.npy");
    write_npy(&bool_path, &array![[true, false, true]]).unwrap();
    assert_eq!(
        load_npy(&bool_path).unwrap().samples(),
        &array![[1.0f32, 0.0, 1.0]]
    );
}

#[test]
fn test_npy_rejects_out_of_range_and_unsupported() {
    let dir = tempfile::tempdir().unwrap();

    let wide = dir.path().join("wide.npy");
    write_npy(&wide, &array![[2.0f32, -1.0]]).unwrap();
    assert!(matches!(load_npy(&wide).unwrap_err(), RbmError::InvalidData(_)));

    let ints = dir.path().join("ints.npy");
    write_npy(&ints, &Array2::<i64>::zeros((2, 2))).unwrap();
    assert!(load_npy(&ints).is_err());
}
