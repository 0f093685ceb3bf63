//! Backup, restore and cleanup against a real POSIX shell in a temp dir.

#![cfg(unix)]
#![allow(clippy::expect_used)]

use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use rigger_cli::application::ports::RemoteShell;
use rigger_cli::application::services::backup::{BACKUP_PREFIX, backup, cleanup, restore};
use rigger_cli::domain::config::DeploymentRequest;
use rigger_cli::domain::remote::{CommandOutput, OutputLine};

use crate::helpers::RecordingReporter;

/// Runs commands with the local `sh`.
struct LocalShell;

impl RemoteShell for LocalShell {
    async fn run_buffered(&self, command: &str) -> Result<CommandOutput> {
        let out = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            exit_code: out.status.code().unwrap_or(-1),
        })
    }

    async fn run_streamed(
        &self,
        command: &str,
        on_line: &mut dyn FnMut(OutputLine),
    ) -> Result<()> {
        let output = self.run_buffered(command).await?;
        for line in output.stdout.lines() {
            on_line(OutputLine::stdout(line));
        }
        output.into_result()?;
        Ok(())
    }
}

fn request(project: &Path) -> DeploymentRequest {
    DeploymentRequest {
        project_path: project.to_string_lossy().into_owned(),
        deploy_file: "docker-compose.yml".into(),
        rollback_enabled: true,
        ..DeploymentRequest::default()
    }
}

fn backups(project: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(project)
        .expect("read project")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(BACKUP_PREFIX))
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_restore_brings_back_previous_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path();
    fs::write(project.join("docker-compose.yml"), "version: 1\n").expect("write");
    fs::create_dir(project.join("conf")).expect("mkdir");
    fs::write(project.join("conf/app.conf"), "workers=2\n").expect("write");

    let reporter = RecordingReporter::default();
    let req = request(project);
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("time");
    let snapshot = backup(&LocalShell, &reporter, &req, now)
        .await
        .expect("backup")
        .expect("deploy file present");
    assert!(snapshot.ends_with(".backup_20260301_120000_000"));

    fs::write(project.join("docker-compose.yml"), "version: 2\n").expect("write");
    fs::remove_file(project.join("conf/app.conf")).expect("rm");

    let restored = restore(&LocalShell, &reporter, &req.project_path)
        .await
        .expect("restore");
    assert_eq!(restored, snapshot);
    assert_eq!(
        fs::read_to_string(project.join("docker-compose.yml")).expect("read"),
        "version: 1\n"
    );
    assert_eq!(
        fs::read_to_string(project.join("conf/app.conf")).expect("read"),
        "workers=2\n"
    );
}

#[tokio::test]
async fn test_snapshots_exclude_older_snapshots_and_restore_picks_newest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path();
    let reporter = RecordingReporter::default();
    let req = request(project);

    fs::write(project.join("docker-compose.yml"), "first\n").expect("write");
    let t1 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("time");
    backup(&LocalShell, &reporter, &req, t1).await.expect("backup");

    fs::write(project.join("docker-compose.yml"), "second\n").expect("write");
    let t2 = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).single().expect("time");
    let newest = backup(&LocalShell, &reporter, &req, t2)
        .await
        .expect("backup")
        .expect("snapshot");

    let nested = backups(Path::new(&newest));
    assert!(nested.is_empty(), "snapshot contains {nested:?}");

    fs::write(project.join("docker-compose.yml"), "third\n").expect("write");
    restore(&LocalShell, &reporter, &req.project_path)
        .await
        .expect("restore");
    assert_eq!(
        fs::read_to_string(project.join("docker-compose.yml")).expect("read"),
        "second\n"
    );
}

#[tokio::test]
async fn test_first_deployment_has_nothing_to_back_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reporter = RecordingReporter::default();
    let req = request(dir.path());

    let snapshot = backup(&LocalShell, &reporter, &req, Utc::now())
        .await
        .expect("backup");
    assert!(snapshot.is_none());
    assert!(backups(dir.path()).is_empty());
}

#[tokio::test]
async fn test_restore_without_snapshot_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reporter = RecordingReporter::default();
    let err = restore(&LocalShell, &reporter, &dir.path().to_string_lossy())
        .await
        .expect_err("nothing to restore");
    assert!(err.to_string().contains("no backup found"), "got: {err}");
}

#[tokio::test]
async fn test_cleanup_removes_every_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let project = dir.path();
    fs::write(project.join("docker-compose.yml"), "x\n").expect("write");
    let reporter = RecordingReporter::default();
    let req = request(project);

    for day in 1..=2 {
        let t = Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).single().expect("time");
        backup(&LocalShell, &reporter, &req, t).await.expect("backup");
    }
    assert_eq!(backups(project).len(), 2);

    cleanup(&LocalShell, &reporter, &req.project_path).await;
    assert!(backups(project).is_empty());
    assert!(project.join("docker-compose.yml").exists());
}
