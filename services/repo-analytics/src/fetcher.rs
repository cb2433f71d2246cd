//! Repository fetcher
//!
//! Clones a remote repository into a fresh [`Workspace`]. The clone is bare
//! and depth-limited, runs on the blocking pool and is bounded by a timeout.
//! libgit2's own socket timeouts make sure the blocking thread ends as well.

use crate::config::EngineConfig;
use crate::error::{AnalysisError, FetchError};
use crate::workspace::Workspace;
use git2::{build::RepoBuilder, FetchOptions, RemoteCallbacks};
use std::future::Future;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Upper bound on a single connect or socket read inside libgit2. The abort
/// flag is only polled between received objects, so this is what ends a clone
/// stuck on a remote that stops answering.
const SERVER_TIMEOUT_MS: c_int = 10_000;

/// How long a timed-out clone gets, past the socket timeout, to stop.
const ABORT_GRACE: Duration = Duration::from_secs(5);

static TRANSPORT_TIMEOUTS: Once = Once::new();

fn configure_transport_timeouts() {
    TRANSPORT_TIMEOUTS.call_once(|| {
        // SAFETY: libgit2 only reads these globals when it opens a socket, and
        // every clone starts after a Fetcher has been built.
        let result = unsafe {
            git2::opts::set_server_connect_timeout_in_milliseconds(SERVER_TIMEOUT_MS)
                .and_then(|()| git2::opts::set_server_timeout_in_milliseconds(SERVER_TIMEOUT_MS))
        };
        match result {
            Ok(()) => debug!("libgit2 server timeouts set to {}ms", SERVER_TIMEOUT_MS),
            Err(e) => warn!("Failed to set libgit2 server timeouts: {}", e),
        }
    });
}

fn abort_wait() -> Duration {
    Duration::from_millis(u64::from(SERVER_TIMEOUT_MS.unsigned_abs())) + ABORT_GRACE
}

/// Raises the abort flag when dropped, so an `acquire` that is cancelled
/// mid-clone stops the transfer it started.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct Fetcher {
    workspace_root: PathBuf,
    clone_timeout: Duration,
}

impl Fetcher {
    pub fn new(config: &EngineConfig) -> Self {
        configure_transport_timeouts();
        Self {
            workspace_root: config.workspace_root.clone(),
            clone_timeout: config.clone_timeout,
        }
    }

    /// Clone `repo_url` deep enough to read `max_commits` commits and diff the
    /// oldest of them against its parent.
    pub async fn acquire(&self, repo_url: &str, max_commits: usize) -> Result<Workspace, FetchError> {
        let workspace = Workspace::create(&self.workspace_root)?;
        let depth = clone_depth(repo_url, max_commits);
        info!("🚀 Cloning {} (depth: {:?}) to {:?}", repo_url, depth, workspace.path());

        let cancel = Arc::new(AtomicBool::new(false));
        let _abort = AbortOnDrop(cancel.clone());

        // The blocking task owns the workspace until it hands it back. If this
        // future is dropped, the directory is released once libgit2 has stopped
        // writing into it.
        let mut task = {
            let url = repo_url.to_string();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                let result = clone_shallow(&url, workspace.path(), depth, &cancel);
                (workspace, result)
            })
        };

        let (mut workspace, failure) = match tokio::time::timeout(self.clone_timeout, &mut task).await {
            Ok(Ok((workspace, Ok(())))) => {
                info!("📦 Cloned {} into {:?}", repo_url, workspace.path());
                return Ok(workspace);
            }
            Ok(Ok((workspace, Err(source)))) => (
                workspace,
                FetchError::Clone {
                    url: repo_url.to_string(),
                    source,
                },
            ),
            // A panicking clone drops its workspace while unwinding.
            Ok(Err(join_error)) => {
                return Err(FetchError::Interrupted {
                    url: repo_url.to_string(),
                    reason: join_error.to_string(),
                })
            }
            Err(_) => {
                warn!("⏱️  Clone of {} exceeded {:?}, aborting", repo_url, self.clone_timeout);
                cancel.store(true, Ordering::SeqCst);
                let failure = FetchError::Timeout {
                    url: repo_url.to_string(),
                    timeout: self.clone_timeout,
                };
                match tokio::time::timeout(abort_wait(), &mut task).await {
                    Ok(Ok((workspace, _))) => (workspace, failure),
                    Ok(Err(_)) => return Err(failure),
                    Err(_) => {
                        error!(
                            "❌ Clone of {} still running after abort, workspace is released when it exits",
                            repo_url
                        );
                        return Err(failure);
                    }
                }
            }
        };

        if let Err(e) = workspace.release() {
            error!("❌ Failed to release workspace after failed clone: {:?}", e);
        }
        Err(failure)
    }

    /// Acquire a workspace, run `f` against its path and release the workspace
    /// whatever `f` returns.
    pub async fn with_workspace<T, F, Fut>(
        &self,
        repo_url: &str,
        max_commits: usize,
        f: F,
    ) -> Result<T, AnalysisError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T, AnalysisError>>,
    {
        let mut workspace = self.acquire(repo_url, max_commits).await?;
        let result = f(workspace.path().to_path_buf()).await;
        if let Err(e) = workspace.release() {
            error!("❌ Failed to release workspace {:?}: {:?}", workspace.path(), e);
        }
        result
    }
}

/// libgit2's local transport cannot do shallow fetches, so local sources are
/// cloned in full.
fn clone_depth(repo_url: &str, max_commits: usize) -> Option<i32> {
    if is_local_source(repo_url) {
        return None;
    }
    Some(i32::try_from(max_commits.saturating_add(1)).unwrap_or(i32::MAX))
}

fn is_local_source(repo_url: &str) -> bool {
    repo_url.starts_with("file://") || (!repo_url.contains("://") && Path::new(repo_url).exists())
}

fn clone_shallow(
    repo_url: &str,
    into: &Path,
    depth: Option<i32>,
    cancel: &AtomicBool,
) -> Result<(), git2::Error> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(|progress| {
        debug!(
            "Received {}/{} objects",
            progress.received_objects(),
            progress.total_objects()
        );
        !cancel.load(Ordering::SeqCst)
    });

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);
    if let Some(depth) = depth {
        fetch_options.depth(depth);
    }

    // Only commit metadata and trees are read, so no checkout.
    let mut builder = RepoBuilder::new();
    builder.bare(true);
    builder.fetch_options(fetch_options);
    builder.clone(repo_url, into)?;
    Ok(())
}
