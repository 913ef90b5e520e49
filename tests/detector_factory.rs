mod common;

use detection_workbench::builder::{build_cascade_detector, save_detector, CascadeEntry};
use detection_workbench::{
    CascadeClassifierDetector, CascadeClassifierGroup, Detector, DetectorCatalog, DetectorError,
    DetectorFactory, DetectorKind, ObjectToggler, Serializable, ShapeKind,
};

#[test]
fn cascade_config_yields_one_detection_with_label() {
    let dir = tempfile::tempdir().unwrap();
    common::write_cascade(dir.path(), "square.xml");
    let yaml = dir.path().join("square.yaml");
    std::fs::write(
        &yaml,
        "type: CASCADE\nobjectLabel: square\ncascadeFilePath: square.xml\n",
    )
    .unwrap();

    let mut detector =
        DetectorFactory::create_detector_from_file(&yaml).expect("cascade detector");
    assert_eq!(detector.kind(), DetectorKind::Cascade);
    assert_eq!(detector.source_path(), Some(yaml.as_path()));

    let found = detector.detect(&common::square_frame()).unwrap();
    assert_eq!(found.len(), 1, "{found:?}");
    let hit = found.get(0).unwrap();
    assert_eq!(hit.label, "square");
    assert_eq!(hit.confidence, 0.0);
    assert_eq!(hit.caption(), "square");
}

#[test]
fn missing_cascade_file_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = dir.path().join("ghost.yaml");
    std::fs::write(
        &yaml,
        "type: CASCADE\nobjectLabel: ghost\ncascadeFilePath: nowhere.xml\n",
    )
    .unwrap();
    assert!(DetectorFactory::create_detector_from_file(&yaml).is_none());
    assert!(DetectorFactory::try_create_detector_from_file(&yaml).is_err());
}

#[test]
fn oversized_feature_rect_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let xml = common::BRIGHT_SQUARE_CASCADE.replace("6 6 12 12 4.", "4294967295 0 4294967295 3 1.");
    std::fs::write(dir.path().join("huge.xml"), xml).unwrap();
    let yaml = dir.path().join("huge.yaml");
    std::fs::write(
        &yaml,
        "type: CASCADE\nobjectLabel: huge\ncascadeFilePath: huge.xml\n",
    )
    .unwrap();
    assert!(DetectorFactory::create_detector_from_file(&yaml).is_none());
}

#[test]
fn group_round_trip_keeps_enabled_map_and_primary() {
    let dir = tempfile::tempdir().unwrap();
    let face = common::write_cascade(dir.path(), "face.xml");
    let eye = common::write_cascade(dir.path(), "eye.xml");
    let smile = common::write_cascade(dir.path(), "smile.xml");

    let entries = [
        CascadeEntry::new("face", face),
        CascadeEntry::new("eye", eye).with_shape(ShapeKind::Circle),
        CascadeEntry::new("smile", smile),
    ];
    let mut group = build_cascade_detector(&entries, Some("eye")).unwrap();
    assert_eq!(group.kind(), DetectorKind::CascadeGroup);
    group
        .as_object_toggler_mut()
        .expect("group toggles objects")
        .enable_object("smile", false);

    let saved = save_detector(group.as_ref(), dir.path(), "portrait").unwrap();
    assert_eq!(saved, dir.path().join("portrait.yaml"));

    let restored = DetectorFactory::create_detector_from_file(&saved).expect("group");
    assert_eq!(restored.name(), "eye");
    let toggler = restored.as_object_toggler().unwrap();
    assert_eq!(toggler.object_labels(), ["face", "eye", "smile"]);
    assert!(toggler.is_object_enabled("face"));
    assert!(toggler.is_object_enabled("eye"));
    assert!(!toggler.is_object_enabled("smile"));
    assert!(!toggler.is_object_enabled("nose"));

    let group = CascadeClassifierGroup::deserialize(&saved).unwrap();
    assert_eq!(group.primary_label(), "eye");
    assert_eq!(group.object_shape("eye"), Some(ShapeKind::Circle));
    assert_eq!(group.object_shape("face"), Some(ShapeKind::Rectangle));
    assert_eq!(group.object_shape("smile"), Some(ShapeKind::Rectangle));
}

#[test]
fn catalog_lists_saved_detectors() {
    let dir = tempfile::tempdir().unwrap();
    let cascade = common::write_cascade(dir.path(), "square.xml");
    let detector = build_cascade_detector(&[CascadeEntry::new("square", cascade)], None).unwrap();
    save_detector(detector.as_ref(), dir.path(), "squares").unwrap();
    std::fs::write(dir.path().join("broken.yaml"), "type: [").unwrap();

    let catalog = DetectorCatalog::scan(dir.path()).unwrap();
    assert_eq!(catalog.names(), ["squares"]);
    let mut loaded = catalog.load("squares").expect("load from catalog");
    assert_eq!(loaded.detect(&common::square_frame()).unwrap().len(), 1);
    assert!(catalog.load("broken").is_none());
}

#[test]
fn builder_rejects_empty_input() {
    assert!(build_cascade_detector(&[], None).is_err());
    let dir = tempfile::tempdir().unwrap();
    let cascade = common::write_cascade(dir.path(), "square.xml");
    let detector = build_cascade_detector(&[CascadeEntry::new("square", cascade)], None).unwrap();
    assert!(save_detector(detector.as_ref(), dir.path(), "  ").is_err());
}

#[test]
fn serialize_into_missing_directory_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let cascade = common::write_cascade(dir.path(), "square.xml");
    let detector = CascadeClassifierDetector::new(&cascade, "square").unwrap();

    let target = dir.path().join("missing").join("sub").join("square.yaml");
    let err = detector.serialize(&target).unwrap_err();
    assert!(matches!(err, DetectorError::Io { .. }), "{err:?}");
    assert!(!target.exists());
}

#[test]
fn deserialize_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");

    let err = CascadeClassifierDetector::deserialize(&missing)
        .err()
        .expect("missing file");
    assert!(matches!(err, DetectorError::Io { .. }), "{err:?}");
    let err = CascadeClassifierGroup::deserialize(&missing)
        .err()
        .expect("missing file");
    assert!(matches!(err, DetectorError::Io { .. }), "{err:?}");
}
