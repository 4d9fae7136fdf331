//! Loading dictionaries from disk and validating against them.

use std::fs;
use std::path::Path;

use openmath::codec;
use openmath_cd::{parse_cdg, validate, CdError, Outcome, Registry, SearchPath};

const ARITH1: &str = r#"<CD xmlns="http://www.openmath.org/OpenMathCD">
  <CDName>arith1</CDName>
  <CDStatus>official</CDStatus>
  <CDDefinition><Name>plus</Name><Role>application</Role></CDDefinition>
  <CDDefinition><Name>times</Name><Role>application</Role></CDDefinition>
</CD>"#;

const FNS1: &str = r#"<CD xmlns="http://www.openmath.org/OpenMathCD">
  <CDName>fns1</CDName>
  <CDStatus>official</CDStatus>
  <CDDefinition><Name>lambda</Name><Role>binder</Role></CDDefinition>
</CD>"#;

const OLD1: &str = r#"<CD><CDName>old1</CDName><CDStatus>obsolete</CDStatus>
  <CDDefinition><Name>thing</Name></CDDefinition></CD>"#;

fn write(dir: &Path, name: &str, text: &str) {
    if let Some(parent) = dir.join(name).parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    fs::write(dir.join(name), text).expect("write fixture");
}

#[test]
fn load_dir_recurses_and_skips_bad_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "arith1.ocd", ARITH1);
    write(dir.path(), "nested/deeper/FNS1.OCD", FNS1);
    write(dir.path(), "broken.ocd", "<CD><CDName>");
    write(dir.path(), "notes.txt", "not a dictionary");

    let mut registry = Registry::new();
    let added = registry.load_dir(dir.path()).expect("load");
    assert_eq!(added, 2);
    assert!(registry.get("arith1").is_some());
    assert!(registry.get("fns1").is_some());

    // Already loaded files are not loaded twice.
    assert_eq!(registry.load_dir(dir.path()).expect("reload"), 0);
    assert_eq!(registry.len(), 2);
}

#[test]
fn search_path_reads_top_level_files_only() {
    let first = tempfile::tempdir().expect("temp dir");
    let second = tempfile::tempdir().expect("temp dir");
    write(first.path(), "arith1.ocd", ARITH1);
    write(first.path(), "sub/fns1.ocd", FNS1);
    write(second.path(), "old1.ocd", OLD1);

    let env = second.path().display().to_string();
    let path = SearchPath::with_env_value([first.path(), first.path()], &format!(" ;{env}"));
    let registry = Registry::from_search_path(&path);
    let names: Vec<_> = registry.dictionaries().iter().map(|cd| cd.name.as_str()).collect();
    assert_eq!(names, ["arith1", "old1"]);
}

#[test]
fn load_file_reports_io_and_parse_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "bad.ocd", "<OMOBJ/>");
    let mut registry = Registry::new();
    assert!(matches!(
        registry.load_file(&dir.path().join("absent.ocd")),
        Err(CdError::Io { .. })
    ));
    assert!(matches!(
        registry.load_file(&dir.path().join("bad.ocd")),
        Err(CdError::Malformed(_))
    ));
    assert!(registry.is_empty());
}

#[test]
fn validates_decoded_objects() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "arith1.ocd", ARITH1);
    write(dir.path(), "fns1.ocd", FNS1);
    write(dir.path(), "old1.ocd", OLD1);
    let mut registry = Registry::new();
    registry.load_dir(dir.path()).expect("load");

    let good = codec::parse(
        r#"<OMOBJ><OMBIND><OMS cd="fns1" name="lambda"/><OMBVAR><OMV name="x"/></OMBVAR>
           <OMA><OMS cd="arith1" name="times"/><OMV name="x"/><OMV name="x"/></OMA></OMBIND></OMOBJ>"#,
    )
    .expect("decodes");
    assert_eq!(validate(&good, &registry).outcome(), Outcome::Ok);

    let obsolete = codec::parse(r#"{"kind":"OMS","cd":"old1","name":"thing"}"#).expect("decodes");
    assert_eq!(validate(&obsolete, &registry).outcome(), Outcome::Warning);

    let misused = codec::parse(
        r#"<OMA><OMS cd="arith1" name="plus"/><OMBIND><OMS cd="arith1" name="plus"/>
           <OMBVAR><OMV name="y"/></OMBVAR><OMV name="y"/></OMBIND></OMA>"#,
    )
    .expect("decodes");
    let report = validate(&misused, &registry);
    assert_eq!(report.outcome(), Outcome::Error);
    assert_eq!(report.failure_count(), 1);
}

#[test]
fn group_restricts_validation() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "arith1.ocd", ARITH1);
    write(dir.path(), "fns1.ocd", FNS1);
    let mut registry = Registry::new();
    registry.load_dir(dir.path()).expect("load");

    let group = parse_cdg(
        r#"<CDGroup xmlns="http://www.openmath.org/OpenMathCDG">
  <CDGroupName>arithmetic</CDGroupName>
  <CDGroupMember><CDName>arith1</CDName></CDGroupMember>
  <CDGroupMember><CDName>nums1</CDName></CDGroupMember>
</CDGroup>"#,
    )
    .expect("parses");
    assert_eq!(group.missing(&registry), ["nums1"]);
    let selected = group.select(&registry);
    assert_eq!(selected.len(), 1);

    let lambda = codec::parse(r#"{"kind":"OMS","cd":"fns1","name":"lambda"}"#).expect("decodes");
    assert_eq!(validate(&lambda, &registry).outcome(), Outcome::Ok);
    assert_eq!(validate(&lambda, &selected).outcome(), Outcome::Warning);
}
