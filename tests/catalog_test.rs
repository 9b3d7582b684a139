mod helpers;

use coursefinder::catalog::{Catalog, CourseRecord};
use coursefinder::error::RetrievalError;
use tempfile::TempDir;

#[test]
fn loads_rows_in_file_order() {
    let tmp = TempDir::new().unwrap();
    let records = vec![
        CourseRecord::new("Rust 101", "Learn Rust", "rust"),
        CourseRecord::new("SQL Basics", "Query data, joins and indexes", "sql, databases"),
        CourseRecord::new("Go", "Concurrency \"the Go way\"", "go"),
    ];
    let path = helpers::write_catalog(tmp.path(), &records);

    let catalog = Catalog::load(&path).unwrap();
    assert_eq!(catalog.records(), records.as_slice());
}

#[test]
fn ignores_extra_columns_and_reorders_by_header() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dataset.csv");
    std::fs::write(
        &path,
        "Skills,University,Course Name,Difficulty Level,Course Description\n\
         python,MIT,Intro to CS,Beginner,Programming basics\n",
    )
    .unwrap();

    let catalog = Catalog::load(&path).unwrap();
    assert_eq!(catalog.len(), 1);
    let course = catalog.get(0).unwrap();
    assert_eq!(course.name, "Intro to CS");
    assert_eq!(course.description, "Programming basics");
    assert_eq!(course.skills, "python");
}

#[test]
fn missing_cells_become_empty_strings() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dataset.csv");
    std::fs::write(
        &path,
        "Course Name,Course Description,Skills\n\
         Only a name\n\
         Name and desc,Some description\n\
         ,,skills only\n",
    )
    .unwrap();

    let catalog = Catalog::load(&path).unwrap();
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.get(0).unwrap(), &CourseRecord::new("Only a name", "", ""));
    assert_eq!(
        catalog.get(1).unwrap(),
        &CourseRecord::new("Name and desc", "Some description", "")
    );
    assert_eq!(catalog.get(2).unwrap(), &CourseRecord::new("", "", "skills only"));
    assert_eq!(catalog.get(0).unwrap().embedding_text(), "Only a name  ");
}

#[test]
fn header_only_file_is_empty_catalog() {
    let tmp = TempDir::new().unwrap();
    let path = helpers::write_catalog(tmp.path(), &[]);
    let catalog = Catalog::load(&path).unwrap();
    assert!(catalog.is_empty());
}

#[test]
fn missing_file_is_dataset_error() {
    let tmp = TempDir::new().unwrap();
    let err = Catalog::load(tmp.path().join("nope.csv")).unwrap_err();
    assert!(matches!(err, RetrievalError::DatasetLoad { .. }));
}

#[test]
fn missing_required_column_is_dataset_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dataset.csv");
    std::fs::write(&path, "Course Name,Skills\nRust,rust\n").unwrap();

    let err = Catalog::load(&path).unwrap_err();
    assert_eq!(err.kind(), "dataset_load_error");
    assert!(err.to_string().contains("Course Description"));
}

#[test]
fn invalid_utf8_is_dataset_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dataset.csv");
    let mut bytes = b"Course Name,Course Description,Skills\n".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe, b',', b'x', b',', b'y', b'\n']);
    std::fs::write(&path, bytes).unwrap();

    let err = Catalog::load(&path).unwrap_err();
    assert!(matches!(err, RetrievalError::DatasetLoad { .. }));
}
