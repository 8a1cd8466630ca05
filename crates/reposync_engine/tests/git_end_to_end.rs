//! Push and pull between two real git repositories through a directory store.
//!
//! Skipped when no `git` executable is available.

use reposync_engine::{
    GitCli, PassphraseCipher, PushMode, PushOutcome, StateStore, SyncConfig, SyncEngine,
    VersionControl,
};
use reposync_storage::DirectoryBlobStore;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn init_repo(path: &Path) {
    fs::create_dir_all(path).unwrap();
    git(path, &["init", "--quiet"]);
    git(path, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    git(path, &["config", "user.name", "Sync Test"]);
    git(path, &["config", "user.email", "sync@example.com"]);
    git(path, &["config", "commit.gpgsign", "false"]);
}

fn commit_file(repo: &Path, file: &str, message: &str) {
    fs::write(repo.join(file), message).unwrap();
    git(repo, &["add", file]);
    git(repo, &["commit", "--quiet", "-m", message]);
}

fn subjects(repo: &Path) -> Vec<String> {
    git(repo, &["log", "--format=%s", "master"])
        .lines()
        .map(str::to_string)
        .collect()
}

fn engine(instance: &str, repo: &Path, store: &Path) -> SyncEngine<GitCli, DirectoryBlobStore> {
    let git = GitCli::new(repo);
    let state = StateStore::open(git.git_dir().unwrap().join("reposync")).unwrap();
    SyncEngine::new(
        SyncConfig::new(instance),
        git,
        DirectoryBlobStore::open(store).unwrap(),
        PassphraseCipher::new("shared secret").unwrap(),
        state,
    )
    .unwrap()
}

#[test]
fn notes_travel_between_two_clones() {
    if !git_available() {
        eprintln!("git not found; skipping");
        return;
    }
    let dir = tempdir().unwrap();
    let store = dir.path().join("store");
    let laptop = dir.path().join("laptop");
    let desktop = dir.path().join("desktop");
    init_repo(&laptop);
    init_repo(&desktop);

    commit_file(&laptop, "first.md", "a first");
    let a = engine("laptop", &laptop, &store);
    let b = engine("desktop", &desktop, &store);

    let PushOutcome::Pushed { link, .. } = a.push().unwrap() else {
        panic!("expected a push");
    };
    assert!(!link.is_final);
    assert_eq!(a.push().unwrap(), PushOutcome::UpToDate);

    assert_eq!(b.pull().unwrap(), 1);
    assert_eq!(subjects(&desktop), vec!["a first"]);
    assert_eq!(b.repo().head_commit("master").unwrap(), a.repo().head_commit("master").unwrap());

    commit_file(&desktop, "local.md", "b local");
    commit_file(&laptop, "second.md", "a second");
    let PushOutcome::Pushed { mode, collected, .. } = a.push().unwrap() else {
        panic!("expected a push");
    };
    assert_eq!(mode, PushMode::Amend);
    assert_eq!(collected, 1);

    assert_eq!(b.pull().unwrap(), 1);
    assert_eq!(subjects(&desktop), vec!["b local", "a second", "a first"]);
    assert!(desktop.join("local.md").exists());
    assert!(desktop.join("second.md").exists());

    // The rebased local commit goes up as the next generation.
    let PushOutcome::Pushed { link, .. } = b.push().unwrap() else {
        panic!("expected a push");
    };
    assert_eq!(link.position(), (1, 3));
    assert_eq!(a.pull().unwrap(), 1);
    assert_eq!(subjects(&laptop), subjects(&desktop));
}
