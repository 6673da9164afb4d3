//! Bundle assembly tests

use connect_models::AppMode;
use nbpublish::bundle::archive::{list_members, read_member};
use nbpublish::bundle::checksum::checksum;
use nbpublish::bundle::{make_source_bundle, make_static_bundle, Manifest, MANIFEST_NAME};
use nbpublish::errors::PublishError;

use crate::support::{pip_environment, write_notebook};

fn manifest_of(bundle: &[u8]) -> Manifest {
    let data = read_member(bundle, MANIFEST_NAME).unwrap().unwrap();
    Manifest::from_json(&data).unwrap()
}

#[test]
fn test_source_bundle_members_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let notebook = write_notebook(dir.path());
    let environment = pip_environment();

    let bundle = make_source_bundle("dummy.ipynb", &notebook, &environment, &[], dir.path()).unwrap();
    assert_eq!(bundle.mode(), AppMode::JupyterStatic);

    let members = list_members(bundle.as_bytes()).unwrap();
    assert_eq!(members, vec!["manifest.json", "dummy.ipynb", "requirements.txt"]);

    let manifest = manifest_of(bundle.as_bytes());
    assert_eq!(manifest.version, 1);
    assert_eq!(manifest.metadata.appmode, AppMode::JupyterStatic);
    assert_eq!(manifest.metadata.entrypoint, "dummy.ipynb");
    assert_eq!(manifest.locale.as_deref(), Some("en_US.UTF-8"));

    let python = manifest.python.as_ref().unwrap();
    assert_eq!(python.version, "3.11.4");
    assert_eq!(python.package_manager.name, "pip");
    assert_eq!(python.package_manager.version, "23.1.2");
    assert_eq!(python.package_manager.package_file, "requirements.txt");

    assert_eq!(
        manifest.files.get("requirements.txt").unwrap().checksum,
        "5f2a5e862fe7afe3def4a57bb5cfb214"
    );
    assert_eq!(
        manifest.files.get("dummy.ipynb").unwrap().checksum,
        checksum(&notebook)
    );
}

#[test]
fn test_static_bundle_has_two_members_and_no_python() {
    let html = b"<html><body>dummy</body></html>";
    let bundle = make_static_bundle("dummy.html", html).unwrap();
    assert_eq!(bundle.mode(), AppMode::Static);

    let members = list_members(bundle.as_bytes()).unwrap();
    assert_eq!(members, vec!["manifest.json", "dummy.html"]);

    let raw = read_member(bundle.as_bytes(), MANIFEST_NAME).unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert!(json.get("python").is_none());
    assert_eq!(json["metadata"]["appmode"], "static");
    assert_eq!(json["metadata"]["entrypoint"], "dummy.html");
    assert_eq!(json["files"]["dummy.html"]["checksum"], checksum(html));

    assert_eq!(read_member(bundle.as_bytes(), "dummy.html").unwrap().unwrap(), html);
}

#[test]
fn test_manifest_files_match_archive_members() {
    let dir = tempfile::tempdir().unwrap();
    let notebook = write_notebook(dir.path());
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data/input.csv"), "a,b\n1,2\n").unwrap();
    std::fs::write(dir.path().join("helper.py"), "X = 1\n").unwrap();

    let extras = vec!["helper.py".to_string(), "data/input.csv".to_string()];
    let source = make_source_bundle("dummy.ipynb", &notebook, &pip_environment(), &extras, dir.path())
        .unwrap();
    let static_bundle = make_static_bundle("dummy.html", b"<html></html>").unwrap();

    for bundle in [source.as_bytes(), static_bundle.as_bytes()] {
        let members: Vec<String> = list_members(bundle)
            .unwrap()
            .into_iter()
            .filter(|m| m != MANIFEST_NAME)
            .collect();
        let files: Vec<String> = manifest_of(bundle).files.paths().map(str::to_string).collect();
        assert_eq!(members, files);
    }

    let members = list_members(source.as_bytes()).unwrap();
    assert_eq!(
        members,
        vec!["manifest.json", "dummy.ipynb", "requirements.txt", "helper.py", "data/input.csv"]
    );
    assert_eq!(
        read_member(source.as_bytes(), "data/input.csv").unwrap().unwrap(),
        b"a,b\n1,2\n"
    );
}

#[test]
fn test_missing_extra_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let notebook = write_notebook(dir.path());
    let extras = vec!["missing.csv".to_string()];

    let err = make_source_bundle("dummy.ipynb", &notebook, &pip_environment(), &extras, dir.path())
        .unwrap_err();
    assert!(matches!(err, PublishError::Io(_)));
}

#[test]
fn test_extra_file_outside_base_dir_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let notebook = write_notebook(dir.path());
    let extras = vec!["../secret.txt".to_string()];

    let err = make_source_bundle("dummy.ipynb", &notebook, &pip_environment(), &extras, dir.path())
        .unwrap_err();
    assert!(matches!(err, PublishError::Validation(_)));
}

#[test]
fn test_extra_file_names_are_normalized_in_manifest_and_archive() {
    let dir = tempfile::tempdir().unwrap();
    let notebook = write_notebook(dir.path());
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(dir.path().join("data.csv"), "x\n1\n").unwrap();
    std::fs::write(dir.path().join("data/more.csv"), "y\n2\n").unwrap();

    let extras = vec!["./data.csv".to_string(), "data//./more.csv".to_string()];
    let bundle = make_source_bundle("dummy.ipynb", &notebook, &pip_environment(), &extras, dir.path())
        .unwrap();

    let members = list_members(bundle.as_bytes()).unwrap();
    assert_eq!(
        members,
        vec!["manifest.json", "dummy.ipynb", "requirements.txt", "data.csv", "data/more.csv"]
    );
    let files: Vec<String> = manifest_of(bundle.as_bytes())
        .files
        .paths()
        .map(str::to_string)
        .collect();
    assert_eq!(files, members[1..].to_vec());
    assert_eq!(
        manifest_of(bundle.as_bytes()).files.get("data.csv").unwrap().checksum,
        checksum(b"x\n1\n")
    );
}

#[test]
fn test_duplicate_extra_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let notebook = write_notebook(dir.path());
    std::fs::write(dir.path().join("data.csv"), "x\n").unwrap();

    for extras in [
        vec!["data.csv".to_string(), "data.csv".to_string()],
        vec!["data.csv".to_string(), "./data.csv".to_string()],
    ] {
        let err = make_source_bundle("dummy.ipynb", &notebook, &pip_environment(), &extras, dir.path())
            .unwrap_err();
        assert!(matches!(err, PublishError::Validation(_)), "{:?}", extras);
    }
}

#[test]
fn test_extra_file_cannot_shadow_generated_members() {
    let dir = tempfile::tempdir().unwrap();
    let notebook = write_notebook(dir.path());
    std::fs::write(dir.path().join("manifest.json"), "{}").unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "pandas\n").unwrap();

    for name in ["manifest.json", "./manifest.json", "dummy.ipynb", "requirements.txt"] {
        let extras = vec![name.to_string()];
        let err = make_source_bundle("dummy.ipynb", &notebook, &pip_environment(), &extras, dir.path())
            .unwrap_err();
        assert!(matches!(err, PublishError::Validation(_)), "{}", name);
    }
}
