use buildref::test_utils::{FakeBuilder, SAMPLE_DIGEST};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::common::TestProject;

fn project_with_tree() -> TestProject {
    let project = TestProject::new().unwrap();
    project.write("config/app.yaml", "image: dockerfile:///app\n").unwrap();
    project
        .write("config/nested/db.yaml", "image: buildpack:///db\n---\nsidecar: foo://bar\n")
        .unwrap();
    project.write("config/notes.txt", "image: dockerfile:///ignored\n").unwrap();
    project
}

#[tokio::test]
async fn test_mirrored_output_directory() {
    let project = project_with_tree();
    let builder = Arc::new(FakeBuilder::new());

    let mut options = project.options(&["config"]);
    options.recursive = true;
    options.output.output_dir = Some(project.path().join("out"));

    let mut stream = Vec::new();
    let summary = project
        .resolver(builder.clone())
        .run(&options, &mut stream, &CancellationToken::new())
        .await
        .unwrap();

    assert!(stream.is_empty());
    assert_eq!(summary.files, 2);
    assert_eq!(builder.calls(), 2);
    assert_eq!(
        project.read("out/config/app.yaml").unwrap(),
        format!("image: registry.local/app@{SAMPLE_DIGEST}\n")
    );
    assert_eq!(
        project.read("out/config/nested/db.yaml").unwrap(),
        format!("image: registry.local/app@{SAMPLE_DIGEST}\n---\nsidecar: foo://bar\n")
    );
    assert!(!project.exists("out/config/notes.txt"));
    // Inputs stay untouched.
    assert_eq!(project.read("config/app.yaml").unwrap(), "image: dockerfile:///app\n");
}

#[tokio::test]
async fn test_flattened_output_directory() {
    let project = project_with_tree();
    let builder = Arc::new(FakeBuilder::new());

    let mut options = project.options(&["config"]);
    options.recursive = true;
    options.output.output_dir = Some(project.path().join("flat"));
    options.output.flatten = true;

    let mut stream = Vec::new();
    project
        .resolver(builder)
        .run(&options, &mut stream, &CancellationToken::new())
        .await
        .unwrap();

    assert!(project.exists("flat/config-app.yaml"));
    assert!(project.exists("flat/config-nested-db.yaml"));
    let entries = std::fs::read_dir(project.path().join("flat")).unwrap().count();
    assert_eq!(entries, 2);
}

#[tokio::test]
async fn test_non_recursive_skips_subdirectories() {
    let project = project_with_tree();
    let builder = Arc::new(FakeBuilder::new());

    let mut stream = Vec::new();
    let summary = project
        .resolver(builder.clone())
        .run(&project.options(&["config"]), &mut stream, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.files, 1);
    assert_eq!(builder.references(), vec!["dockerfile:///app"]);
}

#[tokio::test]
async fn test_explicit_file_ignores_extension_filter() {
    let project = project_with_tree();
    let builder = Arc::new(FakeBuilder::new());

    let mut stream = Vec::new();
    project
        .resolver(builder.clone())
        .run(
            &project.options(&["config/notes.txt", "config/app.yaml", "config/app.yaml"]),
            &mut stream,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let out = String::from_utf8(stream).unwrap();
    assert_eq!(
        out,
        format!(
            "image: registry.local/app@{SAMPLE_DIGEST}\n---\nimage: registry.local/app@{SAMPLE_DIGEST}\n"
        )
    );
    assert_eq!(builder.calls(), 2);
}
