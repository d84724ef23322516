use anyhow::Result;
use crossbeam_channel::unbounded;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;
use vcspool::ports::ProcessOutput;
use vcspool::vcs::check_output;
use vcspool::{Dialect, FileState, Scheduler, SchedulerConfig, VcsError, VersionControl};

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn create_test_git_repo(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    let git_repo = git2::Repository::init(path)?;
    let signature = git2::Signature::now("Test User", "test@example.com")?;

    fs::write(path.join("tracked.txt"), "original content")?;
    fs::write(path.join("to_rename.txt"), "rename me")?;
    let tree_id = {
        let mut index = git_repo.index()?;
        index.add_path(Path::new("tracked.txt"))?;
        index.add_path(Path::new("to_rename.txt"))?;
        index.write()?;
        index.write_tree()?
    };
    let tree = git_repo.find_tree(tree_id)?;
    git_repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        "Initial commit",
        &tree,
        &[],
    )?;

    Ok(())
}

fn scheduler() -> Scheduler {
    Scheduler::with_system_defaults(&SchedulerConfig {
        capacity: Some(2),
        timeout: Some(Duration::from_secs(30)),
    })
}

// Real git binary -> scheduler -> completion handler -> parser
#[test]
fn test_find_files_against_real_git_repo() -> Result<()> {
    if !git_available() {
        eprintln!("git binary not found, skipping");
        return Ok(());
    }

    let temp_dir = TempDir::new()?;
    let repo_path = temp_dir.path().join("repo");
    create_test_git_repo(&repo_path)?;

    // Staged new file, unstaged edit, untracked file, staged rename
    fs::write(repo_path.join("staged.txt"), "staged")?;
    fs::write(repo_path.join("tracked.txt"), "edited")?;
    fs::write(repo_path.join("untracked.txt"), "untracked")?;
    {
        let git_repo = git2::Repository::open(&repo_path)?;
        let mut index = git_repo.index()?;
        index.add_path(Path::new("staged.txt"))?;
        fs::rename(repo_path.join("to_rename.txt"), repo_path.join("renamed.txt"))?;
        index.remove_path(Path::new("to_rename.txt"))?;
        index.add_path(Path::new("renamed.txt"))?;
        index.write()?;
    }

    let vcs = VersionControl::new(Dialect::Git, "git", &repo_path);
    let mut scheduler = scheduler();
    let (tx, rx) = unbounded();
    vcs.find_files(&mut scheduler, move |files| {
        let _ = tx.send(files);
    });

    let report = scheduler.run_until_idle(Duration::from_millis(10));
    assert!(report.failed.is_empty());

    let files = rx.recv_timeout(Duration::from_secs(5))??;
    let find = |name: &str| {
        files
            .iter()
            .find(|f| f.name1 == name)
            .unwrap_or_else(|| panic!("{name} missing from {files:?}"))
    };

    let staged = find("staged.txt");
    assert_eq!(staged.file_state1, FileState::Added);

    let tracked = find("tracked.txt");
    assert_eq!(tracked.file_state1, FileState::Unmodified);
    assert_eq!(tracked.file_state2, FileState::Modified);

    assert!(find("untracked.txt").is_untracked());

    let renamed = find("to_rename.txt");
    assert_eq!(renamed.file_state1, FileState::Renamed);
    assert_eq!(renamed.name2, "renamed.txt");

    Ok(())
}

#[test]
fn test_repository_location_and_failure() -> Result<()> {
    if !git_available() {
        eprintln!("git binary not found, skipping");
        return Ok(());
    }

    let temp_dir = TempDir::new()?;
    let repo_path = temp_dir.path().join("repo");
    create_test_git_repo(&repo_path)?;

    let mut scheduler = scheduler();
    let (root_tx, root_rx) = unbounded();
    let (bad_tx, bad_rx) = unbounded();

    let vcs = VersionControl::new(Dialect::Git, "git", &repo_path);
    vcs.repository_location(&mut scheduler, move |root| {
        let _ = root_tx.send(root);
    });
    vcs.run(
        &mut scheduler,
        "notarealcommand",
        Some(Box::new(move |output: ProcessOutput| {
            let _ = bad_tx.send(check_output("git", output));
        })),
    );

    scheduler.run_until_idle(Duration::from_millis(10));

    let root: PathBuf = root_rx.recv_timeout(Duration::from_secs(5))??;
    assert_eq!(root.canonicalize()?, repo_path.canonicalize()?);

    let failure = bad_rx.recv_timeout(Duration::from_secs(5))?;
    assert!(matches!(failure, Err(VcsError::CommandFailed { code: Some(c), .. }) if c != 0));

    Ok(())
}

#[test]
fn test_initialize_creates_repository() -> Result<()> {
    if !git_available() {
        eprintln!("git binary not found, skipping");
        return Ok(());
    }

    let temp_dir = TempDir::new()?;
    let mut scheduler = scheduler();
    let (tx, rx) = unbounded();

    VersionControl::new(Dialect::Git, "git", temp_dir.path()).initialize(&mut scheduler, move |done| {
        let _ = tx.send(done);
    });
    scheduler.run_until_idle(Duration::from_millis(10));

    rx.recv_timeout(Duration::from_secs(5))??;
    assert!(git2::Repository::open(temp_dir.path()).is_ok());

    Ok(())
}
