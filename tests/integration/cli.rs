use predicates::prelude::*;

use crate::common::TestProject;

#[test]
fn test_zero_parallelism_is_rejected() {
    let project = TestProject::new().unwrap();
    project.write("app.yaml", "image: dockerfile:///app\n").unwrap();

    project
        .buildref()
        .args(["resolve", "-f", "app.yaml", "-P", "0"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("parallelism"));
}

#[test]
fn test_missing_filename_is_rejected() {
    let project = TestProject::new().unwrap();

    project
        .buildref()
        .arg("resolve")
        .assert()
        .failure()
        .stderr(predicate::str::contains("filename"));
}

#[test]
fn test_allow_no_files() {
    let project = TestProject::new().unwrap();

    project
        .buildref()
        .args(["resolve", "--allow-no-files"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_stdin_without_references_passes_through() {
    let project = TestProject::new().unwrap();

    project
        .buildref()
        .args(["resolve", "-f", "-"])
        .write_stdin("name: demo\nlink: foo://bar\n")
        .assert()
        .success()
        .stdout("name: demo\nlink: foo://bar\n");
}

#[test]
fn test_directory_without_references_to_stdout() {
    let project = TestProject::new().unwrap();
    project.write("deploy/a.yaml", "a: 1\n").unwrap();
    project.write("deploy/b.json", r#"{"b": "two"}"#).unwrap();

    project
        .buildref()
        .args(["resolve", "-f", "deploy"])
        .assert()
        .success()
        .stdout("a: 1\n---\n{\"b\": \"two\"}");
}

#[test]
fn test_authority_typo_is_reported() {
    let project = TestProject::new().unwrap();
    project.write("app.yaml", "image: dockerfile://app\n").unwrap();

    project
        .buildref()
        .args(["resolve", "-f", "app.yaml", "--image", "registry.local/app"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("dockerfile:///"));
}

#[test]
fn test_missing_image_is_reported() {
    let project = TestProject::new().unwrap();
    project.write("app.yaml", "image: dockerfile:///app\n").unwrap();

    project
        .buildref()
        .args(["resolve", "-f", "app.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("image"));
}

#[test]
fn test_parse_error_names_file() {
    let project = TestProject::new().unwrap();
    project.write("broken.yaml", "a: [unclosed\n").unwrap();

    project
        .buildref()
        .args(["resolve", "-f", "broken.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.yaml"));
}

#[test]
fn test_missing_input_path() {
    let project = TestProject::new().unwrap();

    project
        .buildref()
        .args(["resolve", "-f", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist"));
}

#[test]
fn test_global_config_is_rejected_when_malformed() {
    let project = TestProject::new().unwrap();
    project.write("app.yaml", "a: 1\n").unwrap();
    let config = project.write("config.toml", "unknown_key = true\n").unwrap();

    project
        .buildref()
        .args(["--config", config.to_str().unwrap(), "resolve", "-f", "app.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}

#[test]
fn test_package_without_project_file_is_a_no_op() {
    let project = TestProject::new().unwrap();
    project.write("app.yaml", "image: dockerfile:///app\n").unwrap();

    project
        .buildref()
        .arg("package")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(project.read("app.yaml").unwrap(), "image: dockerfile:///app\n");
}

#[test]
fn test_pkg_rewrites_project_files_in_place() {
    let project = TestProject::new().unwrap();
    project.write(".buildref.yaml", "filename: [deploy]\nrecursive: true\n").unwrap();
    project.write("deploy/web.yaml", "# web tier\nreplicas: 0x1F # hex\nlink: foo://bar\n").unwrap();
    project.write("deploy/nested/db.json", r#"{"size": 1}"#).unwrap();

    project.buildref().arg("pkg").assert().success().stdout(predicate::str::is_empty());

    assert_eq!(
        project.read("deploy/web.yaml").unwrap(),
        "# web tier\nreplicas: 0x1F # hex\nlink: foo://bar\n"
    );
    assert_eq!(project.read("deploy/nested/db.json").unwrap(), r#"{"size": 1}"#);
}

#[test]
fn test_package_rejects_malformed_project_file() {
    let project = TestProject::new().unwrap();
    project.write(".buildref.yaml", "filenames: [deploy]\n").unwrap();

    project
        .buildref()
        .arg("package")
        .assert()
        .failure()
        .stderr(predicate::str::contains(".buildref.yaml"));
}
