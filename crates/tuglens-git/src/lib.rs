//! Git driver for tuglens.
//!
//! [`GitVcs`] implements [`VersionControl`] by running the `git` binary in a
//! working directory. Every command runs with a timeout: if git doesn't
//! finish in time it is killed and [`VcsError::Timeout`] is returned.
//!
//! History follows the first parent of each commit, oldest first. Paths are
//! reported relative to the directory the driver was opened in, so a driver
//! opened in a subdirectory only sees the files below it.

use std::collections::BTreeSet;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use tuglens_core::config::GitConfig;
use tuglens_core::error::VcsError;
use tuglens_core::versioning::{is_valid_revision_id, Revision, VersionControl};
use wait_timeout::ChildExt;

const HEAD: &str = "HEAD";
const COMMIT_FORMAT: &str = "--format=%ct:%an";

// ============================================================================
// Subprocess
// ============================================================================

/// Captured result of one git invocation.
#[derive(Debug)]
struct GitOutput {
    code: Option<i32>,
    stdout: Vec<u8>,
    stderr: String,
}

impl GitOutput {
    fn success(&self) -> bool {
        self.code == Some(0)
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            source.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join(handle: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>, VcsError> {
    handle
        .join()
        .map_err(|_| VcsError::Malformed {
            message: "output reader thread panicked".to_string(),
        })?
        .map_err(VcsError::Io)
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

// ============================================================================
// Git Driver
// ============================================================================

/// Version control over a git repository.
#[derive(Debug, Clone)]
pub struct GitVcs {
    root: PathBuf,
    binary: String,
    timeout: Duration,
    prefix: String,
}

impl GitVcs {
    /// Open the repository containing `root` with default settings.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, VcsError> {
        GitVcs::open_with_config(root, &GitConfig::default())
    }

    /// Open the repository containing `root`.
    ///
    /// Fails if `root` is not inside a git working tree.
    pub fn open_with_config(root: impl Into<PathBuf>, config: &GitConfig) -> Result<Self, VcsError> {
        let mut vcs = GitVcs {
            root: root.into(),
            binary: config.binary.clone(),
            timeout: config.timeout(),
            prefix: String::new(),
        };
        let output = vcs.run_checked(&["rev-parse", "--show-prefix"])?;
        vcs.prefix = String::from_utf8_lossy(&output).trim().to_string();
        debug!(root = %vcs.root.display(), prefix = %vcs.prefix, "opened git repository");
        Ok(vcs)
    }

    /// The directory git runs in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns whether the configured git binary can be run.
    pub fn is_available(config: &GitConfig) -> bool {
        Command::new(&config.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// Run git with `args`, waiting at most the configured timeout.
    ///
    /// Both pipes are drained on helper threads so that large outputs can't
    /// block the child while we wait for it.
    fn run(&self, args: &[&str]) -> Result<GitOutput, VcsError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        let start = Instant::now();

        let mut child = Command::new(&self.binary)
            .args(["-c", "core.quotePath=false"])
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                kill(&mut child);
                warn!(command = %command, timeout = ?self.timeout, "git command timed out");
                return Err(VcsError::Timeout {
                    command,
                    timeout: self.timeout,
                });
            }
            Err(err) => {
                kill(&mut child);
                return Err(VcsError::Io(err));
            }
        };

        let output = GitOutput {
            code: status.code(),
            stdout: join(stdout)?,
            stderr: String::from_utf8_lossy(&join(stderr)?).trim().to_string(),
        };
        debug!(
            command = %command,
            code = ?output.code,
            bytes = output.stdout.len(),
            elapsed = ?start.elapsed(),
            "ran git"
        );
        Ok(output)
    }

    /// Run git and fail unless it exits with status 0.
    fn run_checked(&self, args: &[&str]) -> Result<Vec<u8>, VcsError> {
        let output = self.run(args)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(VcsError::Subprocess {
                command: format!("{} {}", self.binary, args.join(" ")),
                code: output.code,
                stderr: output.stderr,
            })
        }
    }

    fn run_text(&self, args: &[&str]) -> Result<String, VcsError> {
        let stdout = self.run_checked(args)?;
        String::from_utf8(stdout).map_err(|e| VcsError::Malformed {
            message: format!("git output is not UTF-8: {}", e),
        })
    }

    /// Fails with [`VcsError::UnknownRevision`] unless `revision_id` names a
    /// commit.
    fn validate_revision(&self, revision_id: &str) -> Result<(), VcsError> {
        let unknown = || VcsError::UnknownRevision {
            id: revision_id.to_string(),
        };
        if !is_valid_revision_id(revision_id) {
            return Err(unknown());
        }
        let object = format!("{}^{{commit}}", revision_id);
        if self.run(&["cat-file", "-e", &object])?.success() {
            Ok(())
        } else {
            Err(unknown())
        }
    }

    fn has_commits(&self) -> Result<bool, VcsError> {
        Ok(self.run(&["rev-parse", "--verify", "-q", HEAD])?.success())
    }
}

impl VersionControl for GitVcs {
    fn head_revision(&self) -> Result<Revision, VcsError> {
        if !self.has_commits()? {
            return Err(VcsError::UnknownRevision { id: HEAD.to_string() });
        }
        let raw = self.run_text(&["rev-list", "-1", COMMIT_FORMAT, HEAD])?;
        parse_commits(&raw)?
            .pop()
            .ok_or_else(|| VcsError::UnknownRevision { id: HEAD.to_string() })
    }

    fn list_revisions(&self) -> Result<Vec<Revision>, VcsError> {
        if !self.has_commits()? {
            return Ok(Vec::new());
        }
        let raw = self.run_text(&["rev-list", "--first-parent", "--reverse", COMMIT_FORMAT, HEAD])?;
        parse_commits(&raw)
    }

    fn revision(&self, revision_id: &str) -> Result<Option<Revision>, VcsError> {
        if !is_valid_revision_id(revision_id) || !self.has_commits()? {
            return Ok(None);
        }
        let object = format!("{}^{{commit}}", revision_id);
        let output = self.run(&["rev-list", "-1", COMMIT_FORMAT, &object])?;
        if !output.success() {
            return Ok(None);
        }
        let raw = String::from_utf8_lossy(&output.stdout);
        Ok(parse_commits(&raw)?.pop())
    }

    fn path_history(&self, path: &str) -> Result<Vec<Revision>, VcsError> {
        if !self.has_commits()? {
            return Ok(Vec::new());
        }
        let raw = self.run_text(&[
            "rev-list",
            "--first-parent",
            "--reverse",
            COMMIT_FORMAT,
            HEAD,
            "--",
            path,
        ])?;
        parse_commits(&raw)
    }

    fn changed_paths(&self, revision_id: &str) -> Result<BTreeSet<String>, VcsError> {
        self.validate_revision(revision_id)?;
        let raw = self.run_text(&[
            "diff-tree",
            "-m",
            "-r",
            "--root",
            "--name-only",
            "--relative",
            "--no-commit-id",
            revision_id,
        ])?;
        Ok(parse_paths(&raw))
    }

    fn list_files(&self, revision_id: &str) -> Result<BTreeSet<String>, VcsError> {
        self.validate_revision(revision_id)?;
        let raw = self.run_text(&["ls-tree", "-r", "--name-only", revision_id])?;
        Ok(parse_paths(&raw))
    }

    fn file_content(&self, revision_id: &str, path: &str) -> Result<Option<Vec<u8>>, VcsError> {
        self.validate_revision(revision_id)?;
        let object = format!("{}:{}{}", revision_id, self.prefix, path);
        let output = self.run(&["cat-file", "blob", &object])?;
        Ok(output.success().then_some(output.stdout))
    }
}

// ============================================================================
// Output Parsing
// ============================================================================

/// Parses `rev-list --format=%ct:%an` output.
///
/// Each commit takes two lines: `commit <id>` followed by
/// `<seconds>:<author>`.
fn parse_commits(raw: &str) -> Result<Vec<Revision>, VcsError> {
    let malformed = |message: String| VcsError::Malformed { message };
    let lines: Vec<&str> = raw.lines().filter(|l| !l.is_empty()).collect();
    if lines.len() % 2 != 0 {
        return Err(malformed(format!("odd number of rev-list lines: {}", lines.len())));
    }
    lines
        .chunks(2)
        .map(|pair| {
            let id = pair[0]
                .strip_prefix("commit ")
                .ok_or_else(|| malformed(format!("expected a commit line, got '{}'", pair[0])))?;
            let (seconds, author) = pair[1]
                .split_once(':')
                .ok_or_else(|| malformed(format!("expected '<time>:<author>', got '{}'", pair[1])))?;
            let seconds: i64 = seconds
                .parse()
                .map_err(|_| malformed(format!("invalid commit time '{}'", seconds)))?;
            Revision::from_unix_seconds(id, seconds, author).map_err(|e| malformed(e.to_string()))
        })
        .collect()
}

fn parse_paths(raw: &str) -> BTreeSet<String> {
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
