//! Real subprocess builds, with shell scripts standing in for kaniko.

use predicates::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use crate::common::TestProject;

const SCRIPT_DIGEST: &str =
    "sha256:bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

fn fake_kaniko(project: &TestProject, body: &str) -> PathBuf {
    let script = format!(
        "#!/bin/sh\n\
         for arg in \"$@\"; do\n\
         \x20 case \"$arg\" in\n\
         \x20   --digest-file=*) digest_file=\"${{arg#--digest-file=}}\" ;;\n\
         \x20   --context=*) context=\"${{arg#--context=}}\" ;;\n\
         \x20 esac\n\
         done\n\
         {body}\n"
    );
    let path = project.write("bin/kaniko", &script).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[test]
fn test_dockerfile_build_with_scripted_kaniko() {
    let project = TestProject::new().unwrap();
    project.write("app/Dockerfile", "FROM scratch\n").unwrap();
    project
        .write("deploy.yaml", "web: dockerfile:///app\nagain: dockerfile:///app\n")
        .unwrap();
    let kaniko = fake_kaniko(
        &project,
        &format!(
            "test -f \"$context/Dockerfile\" || exit 3\nprintf '{SCRIPT_DIGEST}' > \"$digest_file\""
        ),
    );

    project
        .buildref()
        .args(["resolve", "-f", "deploy.yaml", "--image", "registry.local/$DIR_NAME"])
        .arg("--kaniko-binary")
        .arg(&kaniko)
        .assert()
        .success()
        .stdout(format!(
            "web: registry.local/app@{SCRIPT_DIGEST}\nagain: registry.local/app@{SCRIPT_DIGEST}\n"
        ));
}

#[test]
fn test_failed_build_dumps_logs_and_writes_nothing() {
    let project = TestProject::new().unwrap();
    project.write("app/Dockerfile", "FROM scratch\n").unwrap();
    project.write("deploy.yaml", "web: dockerfile:///app\n").unwrap();
    let kaniko = fake_kaniko(&project, "echo 'step 1/3 exploded'\nexit 1");

    project
        .buildref()
        .args(["resolve", "-f", "deploy.yaml", "-O", "out", "--image", "registry.local/app"])
        .arg("--kaniko-binary")
        .arg(&kaniko)
        .assert()
        .failure()
        .stderr(predicate::str::contains("dockerfile:///app"))
        .stderr(predicate::str::contains("step 1/3 exploded"));

    assert!(!project.exists("out"));
}

#[test]
fn test_missing_kaniko_binary() {
    let project = TestProject::new().unwrap();
    project.write("deploy.yaml", "web: dockerfile:///app\n").unwrap();

    project
        .buildref()
        .args([
            "resolve",
            "-f",
            "deploy.yaml",
            "--image",
            "registry.local/app",
            "--kaniko-binary",
            "/definitely/not/kaniko",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/definitely/not/kaniko"));
}

#[test]
fn test_package_pins_references_in_place() {
    let project = TestProject::new().unwrap();
    project.write("app/Dockerfile", "FROM scratch\n").unwrap();
    project.write(".buildref.yaml", "filename: [deploy.yaml]\nimage: registry.local/$DIR_NAME\n").unwrap();
    project.write("deploy.yaml", "# pinned on release\nweb: dockerfile:///app # main\n").unwrap();
    let kaniko = fake_kaniko(&project, &format!("printf '{SCRIPT_DIGEST}' > \"$digest_file\""));

    project
        .buildref()
        .arg("pkg")
        .arg("--kaniko-binary")
        .arg(&kaniko)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(
        project.read("deploy.yaml").unwrap(),
        format!("# pinned on release\nweb: registry.local/app@{SCRIPT_DIGEST} # main\n")
    );
}
