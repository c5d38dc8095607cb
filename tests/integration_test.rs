use anyhow::Result;
use git2::{Repository, RepositoryInitOptions, Signature};
use rdw_dev::config::SyncConfig;
use rdw_dev::report::Reporter;
use rdw_dev::updater::{
    Approval, GitVcs, RemoteRevision, RevisionRecord, SyncOutcome, SyncState, SyncWorkflow,
    VersionControl,
};
use rdw_dev::utils::check_git_repository;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Temporary git repository on branch `main` with a configured identity.
struct TestRepo {
    _temp_dir: TempDir,
    repo_path: PathBuf,
    repo: Repository,
    commits: Vec<git2::Oid>,
}

impl TestRepo {
    fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let repo_path = temp_dir.path().join("work");
        Self::init_at(temp_dir, repo_path)
    }

    fn init_at(temp_dir: TempDir, repo_path: PathBuf) -> Result<Self> {
        // Initialize on `main` regardless of the host's init.defaultBranch
        let mut options = RepositoryInitOptions::new();
        options.initial_head("main");
        let repo = Repository::init_opts(&repo_path, &options)?;

        // Configure user for commits made through the git CLI
        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;

        Ok(Self {
            _temp_dir: temp_dir,
            repo_path,
            repo,
            commits: Vec::new(),
        })
    }

    fn add_commit(&mut self, message: &str, content: &str) -> Result<git2::Oid> {
        // Write the tracked file
        fs::write(self.repo_path.join("app.txt"), content)?;

        // Stage it
        let mut index = self.repo.index()?;
        index.add_path(Path::new("app.txt"))?;
        index.write()?;

        // Create the commit on top of the previous one, if any
        let signature = Signature::now("Test User", "test@example.com")?;
        let tree = self.repo.find_tree(index.write_tree()?)?;
        let parent = match self.commits.last() {
            Some(id) => Some(self.repo.find_commit(*id)?),
            None => None,
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let commit_id = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        self.commits.push(commit_id);
        Ok(commit_id)
    }

    /// Adds a bare repository as `origin` and pushes `main` to it.
    fn with_origin(&self) -> Result<PathBuf> {
        let origin = self.repo_path.with_file_name("origin.git");
        let mut options = RepositoryInitOptions::new();
        options.bare(true).initial_head("main");
        Repository::init_opts(&origin, &options)?;

        // Register it and publish the current history
        self.repo
            .remote("origin", origin.to_str().unwrap_or_default())?;
        git(&self.repo_path, &["push", "origin", "main"])?;
        Ok(origin)
    }
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

fn git(dir: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;
    anyhow::ensure!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(())
}

/// Pushes a commit changing `app.txt` to `content` from a separate clone of `origin`.
fn advance_upstream(origin: &Path, clone_dir: &Path, content: &str) -> Result<git2::Oid> {
    let upstream = match Repository::open(clone_dir) {
        Ok(repo) => {
            git(clone_dir, &["pull", "origin", "main"])?;
            repo
        }
        Err(_) => {
            let repo = Repository::clone(origin.to_str().unwrap_or_default(), clone_dir)?;
            let mut config = repo.config()?;
            config.set_str("user.name", "Upstream")?;
            config.set_str("user.email", "upstream@example.com")?;
            repo
        }
    };
    fs::write(clone_dir.join("app.txt"), content)?;
    git(clone_dir, &["commit", "-am", "Upstream change"])?;
    git(clone_dir, &["push", "origin", "main"])?;
    let head = upstream.head()?.peel_to_commit()?.id();
    Ok(head)
}

fn origin_head(origin: &Path) -> Result<git2::Oid> {
    let repo = Repository::open_bare(origin)?;
    let head = repo.refname_to_id("refs/heads/main")?;
    Ok(head)
}

fn remote_revision(id: git2::Oid) -> RemoteRevision {
    let full_id = id.to_string();
    RemoteRevision {
        short_id: full_id[..7].to_string(),
        full_id,
        message: "Upstream change".to_string(),
        author: "Upstream".to_string(),
        date: "2024-01-02".to_string(),
    }
}

#[test]
fn current_revision_is_abbreviated_head() -> Result<()> {
    let mut test_repo = TestRepo::new()?;
    let head = test_repo.add_commit("Initial commit", "v1")?;

    let revision = GitVcs::new(&test_repo.repo_path).current_revision()?;

    assert!(revision.len() >= 7);
    assert!(head.to_string().starts_with(&revision));
    Ok(())
}

#[test]
fn current_revision_fails_without_commits() -> Result<()> {
    let test_repo = TestRepo::new()?;
    assert!(GitVcs::new(&test_repo.repo_path).current_revision().is_err());
    Ok(())
}

#[test]
fn uncommitted_changes_are_detected() -> Result<()> {
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;
    let vcs = GitVcs::new(&test_repo.repo_path);

    assert!(!vcs.has_uncommitted_changes()?);

    fs::write(test_repo.repo_path.join("app.txt"), "v2")?;
    assert!(vcs.has_uncommitted_changes()?);

    fs::write(test_repo.repo_path.join("app.txt"), "v1")?;
    fs::write(test_repo.repo_path.join("notes.md"), "untracked")?;
    assert!(vcs.has_uncommitted_changes()?);
    Ok(())
}

#[test]
fn ignored_files_are_not_changes() -> Result<()> {
    let mut test_repo = TestRepo::new()?;
    fs::write(test_repo.repo_path.join(".gitignore"), "node_modules/\n")?;
    let mut index = test_repo.repo.index()?;
    index.add_path(Path::new(".gitignore"))?;
    index.write()?;
    test_repo.add_commit("Initial commit", "v1")?;

    fs::create_dir_all(test_repo.repo_path.join("node_modules/pkg"))?;
    fs::write(test_repo.repo_path.join("node_modules/pkg/index.js"), "")?;

    assert!(!GitVcs::new(&test_repo.repo_path).has_uncommitted_changes()?);
    Ok(())
}

#[test]
fn repository_check_accepts_subdirectories() -> Result<()> {
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;
    let nested = test_repo.repo_path.join("server/src");
    fs::create_dir_all(&nested)?;

    check_git_repository(&test_repo.repo_path)?;
    check_git_repository(&nested)?;
    Ok(())
}

#[test]
fn failing_git_command_reports_stderr() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;

    let err = GitVcs::new(&test_repo.repo_path)
        .run(&["pull".to_string(), "nowhere".to_string(), "main".to_string()])
        .unwrap_err();

    assert!(err.to_string().contains("git pull nowhere main failed"));
    Ok(())
}

#[test]
fn forced_sync_pulls_upstream_and_records_it() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;
    let origin = test_repo.with_origin()?;

    // A second clone moves upstream ahead of the working copy.
    let upstream_dir = test_repo.repo_path.with_file_name("upstream");
    let upstream_head = advance_upstream(&origin, &upstream_dir, "v2")?;

    let sync = SyncConfig::default();
    let record = RevisionRecord::in_git_dir(&test_repo.repo_path, &sync.revision_file)?;
    let vcs = GitVcs::new(&test_repo.repo_path);
    let reporter = Reporter::new(false);
    let workflow = SyncWorkflow::new(&vcs, &record, &reporter, &sync, "main");

    let remote = remote_revision(upstream_head);
    let state = SyncState::evaluate(record.load()?.as_deref(), &remote.short_id);
    assert_eq!(state, SyncState::Unknown);

    let outcome = workflow.run(state, &remote, &mut Approval::Forced)?;

    assert_eq!(outcome, SyncOutcome::Synchronized { published: true });
    assert_eq!(
        fs::read_to_string(test_repo.repo_path.join("app.txt"))?,
        "v2"
    );
    assert_eq!(record.load()?.as_deref(), Some(remote.short_id.as_str()));
    assert_eq!(reporter.error_count(), 0);
    Ok(())
}

#[test]
fn repeated_forced_sync_converges_to_up_to_date() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;
    let origin = test_repo.with_origin()?;
    let upstream_dir = test_repo.repo_path.with_file_name("upstream");
    advance_upstream(&origin, &upstream_dir, "v2")?;

    let sync = SyncConfig::default();
    let record = RevisionRecord::in_git_dir(&test_repo.repo_path, &sync.revision_file)?;
    let vcs = GitVcs::new(&test_repo.repo_path);
    let reporter = Reporter::new(false);
    let workflow = SyncWorkflow::new(&vcs, &record, &reporter, &sync, "main");

    // First run: query upstream, evaluate, synchronize
    let remote = remote_revision(origin_head(&origin)?);
    let state = SyncState::evaluate(record.load()?.as_deref(), &remote.short_id);
    let first = workflow.run(state, &remote, &mut Approval::Forced)?;
    assert_eq!(first, SyncOutcome::Synchronized { published: true });

    // Syncing must not have moved upstream or dirtied the checkout
    assert_eq!(origin_head(&origin)?.to_string(), remote.full_id);
    assert!(!vcs.has_uncommitted_changes()?);

    // Second run against the same upstream
    let remote = remote_revision(origin_head(&origin)?);
    let state = SyncState::evaluate(record.load()?.as_deref(), &remote.short_id);
    assert_eq!(state, SyncState::UpToDate);
    let second = workflow.run(state, &remote, &mut Approval::Forced)?;

    assert_eq!(second, SyncOutcome::AlreadyCurrent);
    assert_eq!(origin_head(&origin)?.to_string(), remote.full_id);
    assert_eq!(reporter.error_count(), 0);

    // A later upstream change is picked up again
    let newer = advance_upstream(&origin, &upstream_dir, "v3")?;
    let remote = remote_revision(newer);
    let state = SyncState::evaluate(record.load()?.as_deref(), &remote.short_id);
    assert_eq!(state, SyncState::Stale);
    Ok(())
}

#[test]
fn sync_publishes_local_changes_with_the_upstream_pull() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;
    let origin = test_repo.with_origin()?;
    let upstream_dir = test_repo.repo_path.with_file_name("upstream");
    let upstream_head = advance_upstream(&origin, &upstream_dir, "v2")?;
    fs::write(test_repo.repo_path.join("notes.md"), "local work")?;

    let sync = SyncConfig::default();
    let record = RevisionRecord::in_git_dir(&test_repo.repo_path, &sync.revision_file)?;
    let vcs = GitVcs::new(&test_repo.repo_path);
    let reporter = Reporter::new(false);
    let workflow = SyncWorkflow::new(&vcs, &record, &reporter, &sync, "main");

    let remote = remote_revision(upstream_head);
    let outcome = workflow.run(SyncState::Stale, &remote, &mut Approval::Forced)?;

    assert_eq!(outcome, SyncOutcome::Synchronized { published: true });
    assert_eq!(reporter.error_count(), 0);
    assert!(!vcs.has_uncommitted_changes()?);

    // Origin now holds the local commit on top of upstream, without the record
    let origin_repo = Repository::open_bare(&origin)?;
    let pushed = origin_repo.find_commit(origin_head(&origin)?)?;
    assert_eq!(pushed.parent_id(0)?, upstream_head);
    let tree = pushed.tree()?;
    assert!(tree.get_name("notes.md").is_some());
    assert!(tree.get_name(".last_revision").is_none());
    Ok(())
}

#[test]
fn failed_pull_keeps_the_previous_record() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;
    // no origin remote, so fetch fails

    let sync = SyncConfig::default();
    let record = RevisionRecord::in_git_dir(&test_repo.repo_path, &sync.revision_file)?;
    record.store("0000000")?;
    let vcs = GitVcs::new(&test_repo.repo_path);
    let reporter = Reporter::new(false);
    let workflow = SyncWorkflow::new(&vcs, &record, &reporter, &sync, "main");

    let remote = remote_revision(test_repo.commits[0]);
    let outcome = workflow.run(SyncState::Stale, &remote, &mut Approval::Forced)?;

    assert!(outcome.is_failure());
    assert_eq!(record.load()?.as_deref(), Some("0000000"));
    assert_eq!(reporter.error_count(), 1);
    Ok(())
}

#[tokio::test]
async fn updater_without_git_exits_before_any_network_call() -> Result<()> {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::any())
        .respond_with(wiremock::ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir()?;

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_rdw-update"))
        .args(["--check-only", "-C"])
        .arg(dir.path())
        .env("PATH", "")
        .env("RDW_API_BASE", server.uri())
        .output()
        .await?;

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Git is not installed"));
    // The summary is printed on every exit path
    assert!(stdout.contains("No errors this run"));
    Ok(())
}

#[tokio::test]
async fn updater_reports_error_total_when_upstream_query_fails() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_rdw-update"))
        .args(["--force", "-C"])
        .arg(&test_repo.repo_path)
        .env("RDW_API_BASE", server.uri())
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1), "stdout: {stdout}");
    assert!(stdout.contains("Found 1 errors. Aborting."));
    assert!(stdout.contains("Total warnings/errors this run: 1"));
    Ok(())
}

#[tokio::test]
async fn updater_check_only_reports_new_version() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path(
            "/repos/litelis/remote-desktop-web/commits/main",
        ))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_raw(
            serde_json::json!({
                "sha": "abcdef1234567890abcdef1234567890abcdef12",
                "commit": {
                    "message": "Fix bug\nmore",
                    "author": { "name": "Alice", "date": "2024-01-02T00:00:00Z" }
                }
            })
            .to_string(),
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_rdw-update"))
        .args(["--check-only", "-C"])
        .arg(&test_repo.repo_path)
        .env("RDW_API_BASE", server.uri())
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "stdout: {stdout}");
    assert!(stdout.contains("abcdef1 - Fix bug"));
    assert!(stdout.contains("by Alice on 2024-01-02"));
    assert!(stdout.contains("Current version could not be determined"));
    assert!(!test_repo.repo_path.join(".last_revision").exists());
    assert!(!test_repo.repo.path().join(".last_revision").exists());
    Ok(())
}

#[tokio::test]
async fn updater_force_synchronizes_the_checkout() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let mut test_repo = TestRepo::new()?;
    test_repo.add_commit("Initial commit", "v1")?;
    let origin = test_repo.with_origin()?;
    let upstream_dir = test_repo.repo_path.with_file_name("upstream");
    let upstream_head = advance_upstream(&origin, &upstream_dir, "v2")?;
    let short_id = upstream_head.to_string()[..7].to_string();

    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_raw(
            serde_json::json!({
                "sha": upstream_head.to_string(),
                "commit": {
                    "message": "Upstream change",
                    "author": { "name": "Upstream", "date": "2024-01-02T00:00:00Z" }
                }
            })
            .to_string(),
            "application/json",
        ))
        .mount(&server)
        .await;

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_rdw-update"))
        .args(["--force", "-C"])
        .arg(&test_repo.repo_path)
        .env("RDW_API_BASE", server.uri())
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "stdout: {stdout}");
    assert!(stdout.contains(&format!("Updated to {short_id}")));
    assert!(stdout.contains("No errors this run"));
    assert_eq!(
        fs::read_to_string(test_repo.repo_path.join("app.txt"))?,
        "v2"
    );
    assert_eq!(
        fs::read_to_string(test_repo.repo.path().join(".last_revision"))?,
        short_id
    );
    assert_eq!(origin_head(&origin)?, upstream_head);
    Ok(())
}

#[tokio::test]
async fn updater_outside_a_repository_prints_clone_hint() -> Result<()> {
    if !git_available() {
        return Ok(());
    }
    let dir = tempfile::tempdir()?;
    if Repository::discover(dir.path()).is_ok() {
        return Ok(());
    }

    let output = tokio::process::Command::new(env!("CARGO_BIN_EXE_rdw-update"))
        .args(["--check-only", "-C"])
        .arg(dir.path())
        .output()
        .await?;

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("git clone https://github.com/litelis/remote-desktop-web.git"));
    assert!(stdout.contains("Total warnings/errors this run: 1"));
    Ok(())
}

#[test]
fn launcher_without_node_fails_prerequisites() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let output = Command::new(env!("CARGO_BIN_EXE_rdw-start"))
        .args(["--check-only", "-C"])
        .arg(dir.path())
        .env("PATH", "")
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Node.js is not installed"));
    assert!(stdout.contains("Prerequisites not met"));
    Ok(())
}
