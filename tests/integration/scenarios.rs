use buildref::core::BuildrefError;
use buildref::test_utils::{FakeBuilder, SAMPLE_DIGEST, init_test_logging};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::common::TestProject;

async fn run_to_string(
    project: &TestProject,
    builder: Arc<FakeBuilder>,
    inputs: &[&str],
    recursive: bool,
    parallelism: i64,
) -> anyhow::Result<String> {
    let mut options = project.options(inputs);
    options.recursive = recursive;
    options.parallelism = parallelism;
    let mut out = Vec::new();
    project.resolver(builder).run(&options, &mut out, &CancellationToken::new()).await?;
    Ok(String::from_utf8(out)?)
}

#[tokio::test]
async fn test_single_reference_is_pinned() {
    init_test_logging(None);
    let project = TestProject::new().unwrap();
    project.write("app.yaml", "spec:\n  image: dockerfile:///.\n").unwrap();

    let builder = Arc::new(FakeBuilder::new());
    let out = run_to_string(&project, builder.clone(), &["app.yaml"], false, 20).await.unwrap();

    assert_eq!(out, format!("spec:\n  image: registry.local/app@{SAMPLE_DIGEST}\n"));
    assert_eq!(builder.calls(), 1);
}

#[tokio::test]
async fn test_dir_name_template_per_reference() {
    let project = TestProject::new().unwrap();
    for lang in ["go", "nodejs", "php"] {
        project
            .write(
                &format!("helloworld-{lang}/service.yaml"),
                &format!("image: dockerfile:///helloworld-{lang}\n"),
            )
            .unwrap();
    }

    let builder = Arc::new(FakeBuilder::new().with_image("gcr.io/project/$DIR_NAME:latest"));
    let out = run_to_string(&project, builder.clone(), &["."], true, 20).await.unwrap();

    for lang in ["go", "nodejs", "php"] {
        let expected = format!("image: gcr.io/project/helloworld-{lang}:latest@{SAMPLE_DIGEST}\n");
        assert!(out.contains(&expected), "missing {expected:?} in {out}");
    }
    assert_eq!(builder.calls(), 3);
}

#[tokio::test]
async fn test_duplicate_references_build_once_across_files() {
    let project = TestProject::new().unwrap();
    project
        .write("a.yaml", "first: dockerfile:///app\nsecond: [dockerfile:///app]\n")
        .unwrap();
    project
        .write("b.yaml", "image: dockerfile:///app\n---\nimage: ' dockerfile:///app '\n")
        .unwrap();

    let builder = Arc::new(FakeBuilder::new().with_delay(Duration::from_millis(10)));
    let mut options = project.options(&["a.yaml", "b.yaml"]);
    options.parallelism = 4;
    let mut out = Vec::new();
    let summary = project
        .resolver(builder.clone())
        .run(&options, &mut out, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(builder.calls(), 1);
    assert_eq!(summary.builds, 1);
    assert_eq!(summary.substitutions, 4);
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out.matches(&format!("registry.local/app@{SAMPLE_DIGEST}")).count(), 4);
    assert!(!out.contains("dockerfile://"));
}

#[tokio::test]
async fn test_unregistered_schemes_pass_through() {
    let project = TestProject::new().unwrap();
    let input = "links:\n- foo://bar\n- https://example.com/x\n- dockerfiles:///nope\n";
    project.write("links.yaml", input).unwrap();

    let builder = Arc::new(FakeBuilder::new());
    let out = run_to_string(&project, builder.clone(), &["links.yaml"], false, 20).await.unwrap();

    assert_eq!(out, input);
    assert_eq!(builder.calls(), 0);
}

#[tokio::test]
async fn test_authority_is_rejected_before_any_build() {
    let project = TestProject::new().unwrap();
    project
        .write("app.yaml", "a: dockerfile:///fine\nb: dockerfile://host/path\n")
        .unwrap();

    let builder = Arc::new(FakeBuilder::new().reject_authority());
    let err = run_to_string(&project, builder.clone(), &["app.yaml"], false, 20).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("dockerfile://"), "{message}");
    assert!(message.contains("dockerfile:///"), "{message}");
    assert!(matches!(err.downcast_ref::<BuildrefError>(), Some(BuildrefError::UnexpectedHost { .. })));
    assert_eq!(builder.calls(), 0);
}

#[tokio::test]
async fn test_parallelism_ceiling() {
    let project = TestProject::new().unwrap();
    let yaml: String = (0..10).map(|i| format!("- dockerfile:///svc{i}\n")).collect();
    project.write("many.yaml", &yaml).unwrap();

    for limit in [1_i64, 4] {
        let builder = Arc::new(FakeBuilder::new().with_delay(Duration::from_millis(25)));
        run_to_string(&project, builder.clone(), &["many.yaml"], false, limit).await.unwrap();

        assert_eq!(builder.calls(), 10);
        assert!(builder.peak_concurrency() >= 1);
        assert!(
            builder.peak_concurrency() <= limit as usize,
            "peak {} over limit {limit}",
            builder.peak_concurrency()
        );
        assert_eq!(builder.in_flight(), 0);
    }
}

#[tokio::test]
async fn test_failure_writes_nothing() {
    let project = TestProject::new().unwrap();
    project
        .write(
            "app.yaml",
            "a: dockerfile:///one\nb: dockerfile:///two\nc: dockerfile:///three\n",
        )
        .unwrap();

    let builder = Arc::new(
        FakeBuilder::new().with_delay(Duration::from_secs(30)).fail_on("dockerfile:///two"),
    );
    let mut options = project.options(&["app.yaml"]);
    options.output.output_dir = Some(project.path().join("out"));

    let started = std::time::Instant::now();
    let mut out = Vec::new();
    let err = project
        .resolver(builder.clone())
        .run(&options, &mut out, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("dockerfile:///two"), "{err}");
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(out.is_empty());
    assert!(!project.exists("out"));
    assert_eq!(builder.in_flight(), 0);
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let project = TestProject::new().unwrap();
    project.write("app.yaml", "image: dockerfile:///slow\n").unwrap();

    let builder = Arc::new(FakeBuilder::new().with_delay(Duration::from_secs(30)));
    let options = project.options(&["app.yaml"]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let mut out = Vec::new();
    let err = project.resolver(builder).run(&options, &mut out, &cancel).await.unwrap_err();

    assert!(matches!(err.downcast_ref::<BuildrefError>(), Some(BuildrefError::Cancelled)));
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_documents_without_references_round_trip() {
    let project = TestProject::new().unwrap();
    let input = "# leading comment\nname: app # trailing\nreplicas: 3\nlabels: &labels\n  tier: web\n\
                 selector: *labels\nports:\n- 80\n- 443\nmode: 0o755\nhex: 0x1F\nnil: ~\n\
                 ---\n# only a comment\n---\nkind: Other\nenabled: true\n---\n";
    project.write("plain.yaml", input).unwrap();

    let builder = Arc::new(FakeBuilder::new());
    let out = run_to_string(&project, builder.clone(), &["plain.yaml"], false, 20).await.unwrap();

    assert_eq!(out, input);
    assert_eq!(builder.calls(), 0);
}

#[tokio::test]
async fn test_parse_error_names_the_file() {
    let project = TestProject::new().unwrap();
    project.write("good.yaml", "image: dockerfile:///app\n").unwrap();
    project.write("broken.yaml", "key: [unclosed\n").unwrap();

    let builder = Arc::new(FakeBuilder::new());
    let err = run_to_string(&project, builder.clone(), &["good.yaml", "broken.yaml"], false, 20)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("broken.yaml"), "{err}");
    assert_eq!(builder.calls(), 0);
}

#[tokio::test]
async fn test_json_input_is_scanned() {
    let project = TestProject::new().unwrap();
    project
        .write("deploy.json", r#"{"containers": [{"image": "ko://github.com/org/repo/cmd/app"}]}"#)
        .unwrap();

    let builder = Arc::new(FakeBuilder::new());
    let out = run_to_string(&project, builder.clone(), &["."], false, 20).await.unwrap();

    assert_eq!(builder.references(), vec!["ko://github.com/org/repo/cmd/app"]);
    assert_eq!(out, format!(r#"{{"containers": [{{"image": "registry.local/app@{SAMPLE_DIGEST}"}}]}}"#));
}
