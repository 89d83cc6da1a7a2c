//! Version-control queries.
//!
//! Every call re-queries the repository: the working tree can change between
//! two calls within one process, so nothing here is cached. Each `git`
//! invocation is bounded by a timeout and is killed when it expires.
//!
//! `git` runs with `--no-optional-locks`, so the dirty check never writes
//! the index back. `git describe --dirty` still refreshes the index stat
//! cache on its own; no tracked content is ever modified.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;
use verstamp_schema::Placeholder;
use wait_timeout::ChildExt;

use crate::error::{Result, StampError};

/// Default per-query timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default CI build-number variable.
pub const DEFAULT_BUILD_NUMBER_VAR: &str = "BUILD_NUMBER";

/// Environment lookup injected at construction.
pub type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Read-only view of repository state used by the formatter.
pub trait VersionSource {
    /// `TAG-COUNT-gHASH[-dirty]` for the nearest ancestor tag, or a bare
    /// `HASH[-dirty]` when no tag is reachable.
    ///
    /// # Errors
    ///
    /// [`StampError::VcsUnavailable`] when the query cannot run.
    fn latest_tag_description(&self) -> Result<String>;

    /// Abbreviated id of the last commit touching the path scope.
    ///
    /// # Errors
    ///
    /// [`StampError::VcsUnavailable`] when the query cannot run or no commit
    /// touches the scope.
    fn short_revision_of_path(&self) -> Result<String>;

    /// Number of commits touching the path scope.
    ///
    /// # Errors
    ///
    /// [`StampError::VcsUnavailable`] when the query cannot run.
    fn commit_count_for_path(&self) -> Result<u64>;

    /// Whether tracked files in the path scope differ from HEAD.
    ///
    /// # Errors
    ///
    /// [`StampError::VcsUnavailable`] when the query cannot run.
    fn is_working_tree_dirty(&self) -> Result<bool>;

    /// Build identifier injected by CI.
    ///
    /// # Errors
    ///
    /// [`StampError::MissingEnvironment`] when the variable is absent.
    fn build_number_from_environment(&self) -> Result<String>;
}

/// [`VersionSource`] backed by the `git` command line.
pub struct GitSource {
    repo: PathBuf,
    program: Option<PathBuf>,
    scope: PathBuf,
    timeout: Duration,
    build_number_var: String,
    env: EnvLookup,
}

impl std::fmt::Debug for GitSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitSource")
            .field("repo", &self.repo)
            .field("program", &self.program)
            .field("scope", &self.scope)
            .field("timeout", &self.timeout)
            .field("build_number_var", &self.build_number_var)
            .finish_non_exhaustive()
    }
}

struct GitOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl GitSource {
    /// Query the repository at `repo`, scoped to the whole tree, reading
    /// the process environment.
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            program: None,
            scope: PathBuf::from("."),
            timeout: DEFAULT_TIMEOUT,
            build_number_var: DEFAULT_BUILD_NUMBER_VAR.to_string(),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Restrict commit-count, revision and dirty queries to `scope`
    /// (relative to the repository path).
    pub fn with_scope(mut self, scope: impl Into<PathBuf>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Run `program` instead of the `git` found on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Bound every `git` invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read the CI build number from `var` instead of `BUILD_NUMBER`.
    pub fn with_build_number_var(mut self, var: impl Into<String>) -> Self {
        self.build_number_var = var.into();
        self
    }

    /// Replace the environment lookup.
    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    fn scope_arg(&self) -> String {
        self.scope.to_string_lossy().into_owned()
    }

    fn run(&self, args: &[&str]) -> Result<GitOutput> {
        let command = format!("git {}", args.join(" "));
        let unavailable = |reason: String| StampError::VcsUnavailable {
            command: command.clone(),
            reason,
        };

        let git = match &self.program {
            Some(program) => program.clone(),
            None => which::which("git")
                .map_err(|e| unavailable(format!("git executable not found: {e}")))?,
        };

        debug!(repo = %self.repo.display(), %command, "Running git");

        let mut child = Command::new(git)
            .arg("--no-optional-locks")
            .args(args)
            .current_dir(&self.repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| unavailable(format!("failed to spawn: {e}")))?;

        // Read both pipes while waiting so a chatty child cannot fill them
        // and stall until the timeout.
        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Best effort: the child is abandoned either way. The readers
                // are detached rather than joined.
                let _ = child.kill();
                let _ = child.wait();
                return Err(unavailable(format!(
                    "timed out after {}s",
                    self.timeout.as_secs_f64()
                )));
            }
            Err(e) => return Err(unavailable(format!("failed to wait: {e}"))),
        };

        let stdout = collect(stdout_reader)
            .map_err(|e| unavailable(format!("failed to read output: {e}")))?;
        let stderr = collect(stderr_reader)
            .map_err(|e| unavailable(format!("failed to read output: {e}")))?;

        Ok(GitOutput {
            status,
            stdout,
            stderr,
        })
    }

    fn run_checked(&self, args: &[&str]) -> Result<String> {
        let out = self.run(args)?;
        if !out.status.success() {
            return Err(StampError::VcsUnavailable {
                command: format!("git {}", args.join(" ")),
                reason: format!("exit {}: {}", exit_label(out.status), out.stderr.trim()),
            });
        }
        Ok(out.stdout.trim().to_string())
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<io::Result<String>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = String::new();
            pipe.read_to_string(&mut buf).map(|_| buf)
        })
    })
}

fn collect(reader: Option<JoinHandle<io::Result<String>>>) -> io::Result<String> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("output reader panicked"))?,
        None => Ok(String::new()),
    }
}

fn exit_label(status: ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| "by signal".to_string(), |c| c.to_string())
}

impl VersionSource for GitSource {
    fn latest_tag_description(&self) -> Result<String> {
        self.run_checked(&["describe", "--tags", "--long", "--dirty", "--always"])
    }

    fn short_revision_of_path(&self) -> Result<String> {
        let scope = self.scope_arg();
        let sha = self.run_checked(&["rev-list", "-1", "HEAD", "--", &scope])?;
        if sha.is_empty() {
            return Err(StampError::VcsUnavailable {
                command: format!("git rev-list -1 HEAD -- {scope}"),
                reason: "no commit touches the path scope".to_string(),
            });
        }
        self.run_checked(&["rev-parse", "--short", &sha])
    }

    fn commit_count_for_path(&self) -> Result<u64> {
        let scope = self.scope_arg();
        let raw = self.run_checked(&["rev-list", "HEAD", "--count", "--", &scope])?;
        raw.parse::<u64>().map_err(|_| StampError::VcsUnavailable {
            command: format!("git rev-list HEAD --count -- {scope}"),
            reason: format!("unexpected output '{raw}'"),
        })
    }

    fn is_working_tree_dirty(&self) -> Result<bool> {
        let scope = self.scope_arg();

        // With optional locks off, status compares content when stat info is
        // stale and never writes the refreshed index back.
        let out = self.run_checked(&[
            "status",
            "--porcelain",
            "--untracked-files=no",
            "--",
            &scope,
        ])?;
        Ok(!out.is_empty())
    }

    fn build_number_from_environment(&self) -> Result<String> {
        (self.env)(&self.build_number_var)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StampError::MissingEnvironment {
                variable: self.build_number_var.clone(),
                placeholder: Placeholder::Jenkins.name(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command as StdCommand;
    use verstamp_schema::TagDescription;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init", "-q"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "commit.gpgsign", "false"]);
        run_git(dir.path(), &["config", "tag.gpgsign", "false"]);
        dir
    }

    fn commit_file(repo: &Path, rel: &str, content: &str) {
        let path = repo.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        run_git(repo, &["add", rel]);
        run_git(repo, &["commit", "-q", "-m", rel]);
    }

    #[test]
    fn test_describe_after_tag() {
        let repo = make_git_repo();
        commit_file(repo.path(), "a.txt", "a");
        run_git(repo.path(), &["tag", "v1"]);
        commit_file(repo.path(), "b.txt", "b");
        commit_file(repo.path(), "c.txt", "c");

        let source = GitSource::new(repo.path());
        let desc = source.latest_tag_description().unwrap();
        assert!(desc.starts_with("v1-2-g"), "unexpected describe: {desc}");
        assert!(!desc.ends_with("-dirty"));
    }

    #[test]
    fn test_describe_reports_dirty() {
        let repo = make_git_repo();
        commit_file(repo.path(), "a.txt", "a");
        run_git(repo.path(), &["tag", "v1"]);
        std::fs::write(repo.path().join("a.txt"), "changed").unwrap();

        let source = GitSource::new(repo.path());
        let desc = source.latest_tag_description().unwrap();
        assert!(desc.starts_with("v1-0-g"), "unexpected describe: {desc}");
        assert!(desc.ends_with("-dirty"), "unexpected describe: {desc}");
        assert!(source.is_working_tree_dirty().unwrap());
    }

    #[test]
    fn test_untagged_repo_describes_as_zero() {
        let repo = make_git_repo();
        commit_file(repo.path(), "a.txt", "a");

        let desc = GitSource::new(repo.path()).latest_tag_description().unwrap();
        assert!(!desc.contains('-'), "expected a bare hash: {desc}");
        assert_eq!(TagDescription::parse(&desc).render(), "0.0");
    }

    #[test]
    fn test_dirty_check_leaves_index_alone() {
        let repo = make_git_repo();
        commit_file(repo.path(), "a.txt", "same");
        let index = repo.path().join(".git/index");

        // Same content, new mtime: stale stat info but no real change.
        std::thread::sleep(Duration::from_millis(1100));
        std::fs::write(repo.path().join("a.txt"), "same").unwrap();
        let before = std::fs::read(&index).unwrap();

        let source = GitSource::new(repo.path());
        assert!(!source.is_working_tree_dirty().unwrap());
        assert_eq!(std::fs::read(&index).unwrap(), before);
    }

    #[cfg(unix)]
    fn fake_git(dir: &Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-git");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_git_is_killed_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_git(dir.path(), "exec sleep 30");
        let source = GitSource::new(dir.path())
            .with_program(program)
            .with_timeout(Duration::from_millis(300));

        let started = std::time::Instant::now();
        match source.latest_tag_description() {
            Err(StampError::VcsUnavailable { reason, .. }) => {
                assert!(reason.contains("timed out"), "unexpected reason: {reason}");
            }
            other => panic!("expected VcsUnavailable, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_large_output_does_not_stall() {
        let dir = tempfile::tempdir().unwrap();
        // Well past a pipe buffer on both streams.
        let program = fake_git(
            dir.path(),
            "yes v1-2-gabc | head -c 300000; yes warn | head -c 300000 >&2",
        );
        let source = GitSource::new(dir.path())
            .with_program(program)
            .with_timeout(Duration::from_secs(20));

        let desc = source.latest_tag_description().unwrap();
        assert!(desc.len() > 200_000);
    }

    #[test]
    fn test_scope_restricts_count_and_dirty() {
        let repo = make_git_repo();
        commit_file(repo.path(), "pkg/mod.txt", "1");
        commit_file(repo.path(), "other/x.txt", "1");
        commit_file(repo.path(), "pkg/mod.txt", "2");
        std::fs::write(repo.path().join("other/x.txt"), "dirty").unwrap();

        let whole = GitSource::new(repo.path());
        assert_eq!(whole.commit_count_for_path().unwrap(), 3);
        assert!(whole.is_working_tree_dirty().unwrap());

        let scoped = GitSource::new(repo.path()).with_scope("pkg");
        assert_eq!(scoped.commit_count_for_path().unwrap(), 2);
        assert!(!scoped.is_working_tree_dirty().unwrap());
    }

    #[test]
    fn test_short_revision_of_scope() {
        let repo = make_git_repo();
        commit_file(repo.path(), "pkg/mod.txt", "1");
        commit_file(repo.path(), "other/x.txt", "1");

        let scoped = GitSource::new(repo.path()).with_scope("pkg");
        let rev = scoped.short_revision_of_path().unwrap();
        assert!(rev.len() >= 4);
        assert!(rev.chars().all(|c| c.is_ascii_hexdigit()));

        let head = GitSource::new(repo.path()).short_revision_of_path().unwrap();
        assert_ne!(rev, head, "scoped revision should ignore later commits elsewhere");
    }

    #[test]
    fn test_queries_fail_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let source = GitSource::new(dir.path());
        assert!(matches!(
            source.latest_tag_description(),
            Err(StampError::VcsUnavailable { .. })
        ));
        assert!(matches!(
            source.commit_count_for_path(),
            Err(StampError::VcsUnavailable { .. })
        ));
        assert!(matches!(
            source.is_working_tree_dirty(),
            Err(StampError::VcsUnavailable { .. })
        ));
    }

    #[test]
    fn test_build_number_from_injected_env() {
        let source = GitSource::new(".")
            .with_env(|k| (k == "CI_BUILD").then(|| "77".to_string()))
            .with_build_number_var("CI_BUILD");
        assert_eq!(source.build_number_from_environment().unwrap(), "77");
    }

    #[test]
    fn test_build_number_missing() {
        let source = GitSource::new(".").with_env(|_| None);
        match source.build_number_from_environment() {
            Err(StampError::MissingEnvironment { variable, .. }) => {
                assert_eq!(variable, "BUILD_NUMBER");
            }
            other => panic!("expected MissingEnvironment, got {other:?}"),
        }
    }
}
