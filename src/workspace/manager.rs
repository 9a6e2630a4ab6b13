//! Sandbox creation, archival and teardown.

use super::{
    ARTIFACTS_DIR, CONTEXT_DIR, LOG_FILE, OUTPUT_DIR, PROMPT_FILE, PromptPaths, PromptRenderer,
    Workspace, WorkspaceError, layout::context_file_stem,
};
use crate::task::domain::{AttemptNumber, AttemptStatus, Task, TaskId};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Where sandboxes live and when they are archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSettings {
    /// Parent directory of live sandboxes.
    pub root: Utf8PathBuf,
    /// Parent directory of archived attempts.
    pub archive_root: Utf8PathBuf,
    /// Archive successful attempts too.
    pub archive_on_success: bool,
}

/// Lifetime counters for sandbox bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkspaceStats {
    /// Sandboxes created by this manager.
    pub created: u64,
    /// Sandboxes this manager created and later removed.
    pub destroyed: u64,
    /// Leftover sandboxes removed by [`WorkspaceManager::sweep_orphans`].
    pub swept: u64,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    destroyed: AtomicU64,
    swept: AtomicU64,
}

/// Creates and destroys per-attempt sandboxes.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    settings: Arc<WorkspaceSettings>,
    prompts: Arc<PromptRenderer>,
    counters: Arc<Counters>,
}

struct ContextFile {
    name: String,
    contents: Vec<u8>,
}

impl WorkspaceManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(settings: WorkspaceSettings, prompts: PromptRenderer) -> Self {
        Self {
            settings: Arc::new(settings),
            prompts: Arc::new(prompts),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &WorkspaceSettings {
        &self.settings
    }

    /// Returns the sandbox a given attempt would use, without touching disk.
    #[must_use]
    pub fn locate(&self, task_id: TaskId, attempt: AttemptNumber) -> Workspace {
        Workspace::new(
            task_id,
            attempt,
            self.settings
                .root
                .join(Workspace::dir_name(task_id, attempt)),
            Vec::new(),
        )
    }

    /// Archive directory for an attempt.
    #[must_use]
    pub fn archive_path(&self, task_id: TaskId, attempt: AttemptNumber) -> Utf8PathBuf {
        self.settings
            .archive_root
            .join(task_id.to_string())
            .join(format!("attempt-{attempt}"))
    }

    /// Returns the lifetime counters.
    #[must_use]
    pub fn stats(&self) -> WorkspaceStats {
        WorkspaceStats {
            created: self.counters.created.load(Ordering::SeqCst),
            destroyed: self.counters.destroyed.load(Ordering::SeqCst),
            swept: self.counters.swept.load(Ordering::SeqCst),
        }
    }

    /// Materialises the sandbox for one attempt of `task`.
    ///
    /// A stale directory with the same name is replaced. On failure any
    /// partially written sandbox is removed.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] on any filesystem, serialisation or
    /// template failure.
    pub async fn create(
        &self,
        task: &Task,
        attempt: AttemptNumber,
    ) -> Result<Workspace, WorkspaceError> {
        let located = self.locate(task.id(), attempt);
        let files = context_files(task)?;
        let names: Vec<String> = files.iter().map(|file| file.name.clone()).collect();
        let prompt = self.prompts.render(
            task,
            attempt,
            &names,
            PromptPaths {
                context_dir: located.context_dir().as_str(),
                output_path: located.result_path().as_str(),
            },
        )?;

        let root = self.settings.root.clone();
        let dir_name = Workspace::dir_name(task.id(), attempt);
        run_blocking(move || materialise(&root, &dir_name, &files, &prompt)).await?;

        self.counters.created.fetch_add(1, Ordering::SeqCst);
        debug!(task_id = %task.id(), attempt = %attempt, root = %located.root(), "workspace created");
        Ok(Workspace::new(
            task.id(),
            attempt,
            located.root().to_owned(),
            names,
        ))
    }

    /// Tears down a sandbox, archiving it first unless the attempt
    /// succeeded.
    ///
    /// Returns `false` when the sandbox was already gone. Missing
    /// subdirectories are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when archiving or removal fails.
    pub async fn destroy(
        &self,
        workspace: &Workspace,
        status: AttemptStatus,
    ) -> Result<bool, WorkspaceError> {
        let archive = status != AttemptStatus::Succeeded || self.settings.archive_on_success;
        let removed = self
            .teardown(workspace.task_id(), workspace.attempt(), archive)
            .await?;
        if removed {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
            debug!(
                task_id = %workspace.task_id(),
                attempt = %workspace.attempt(),
                archived = archive,
                "workspace destroyed"
            );
        }
        Ok(removed)
    }

    /// Archives and removes every sandbox left under the root.
    ///
    /// Entries whose names are not sandbox names are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when the root cannot be listed or a sandbox
    /// cannot be archived or removed.
    pub async fn sweep_orphans(&self) -> Result<usize, WorkspaceError> {
        let root = self.settings.root.clone();
        let names = run_blocking(move || list_dirs(&root)).await?;

        let mut swept = 0;
        for name in names {
            let Some((task_id, attempt)) = Workspace::parse_dir_name(&name) else {
                warn!(entry = %name, "ignoring unknown entry under workspace root");
                continue;
            };
            if self.teardown(task_id, attempt, true).await? {
                swept += 1;
                self.counters.swept.fetch_add(1, Ordering::SeqCst);
            }
        }
        if swept > 0 {
            info!(swept, "orphaned workspaces archived and removed");
        }
        Ok(swept)
    }

    async fn teardown(
        &self,
        task_id: TaskId,
        attempt: AttemptNumber,
        archive: bool,
    ) -> Result<bool, WorkspaceError> {
        let root = self.settings.root.clone();
        let dir_name = Workspace::dir_name(task_id, attempt);
        let archive_to = archive.then(|| self.archive_path(task_id, attempt));
        run_blocking(move || remove_sandbox(&root, &dir_name, archive_to.as_deref())).await
    }
}

async fn run_blocking<F, T>(job: F) -> Result<T, WorkspaceError>
where
    F: FnOnce() -> Result<T, WorkspaceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| WorkspaceError::Aborted(err.to_string()))?
}

fn context_files(task: &Task) -> Result<Vec<ContextFile>, WorkspaceError> {
    let mut taken = HashSet::new();
    task.context()
        .iter()
        .map(|(key, value)| {
            let stem = context_file_stem(key);
            let mut name = format!("{stem}.json");
            let mut suffix = 1_u32;
            while !taken.insert(name.clone()) {
                suffix += 1;
                name = format!("{stem}-{suffix}.json");
            }
            let contents =
                serde_json::to_vec_pretty(value).map_err(|err| WorkspaceError::Context {
                    key: key.clone(),
                    reason: err.to_string(),
                })?;
            Ok(ContextFile { name, contents })
        })
        .collect()
}

fn open_root(root: &Utf8Path) -> Result<Dir, WorkspaceError> {
    Dir::create_ambient_dir_all(root, ambient_authority())
        .map_err(|err| WorkspaceError::io(root, err))?;
    Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| WorkspaceError::io(root, err))
}

fn materialise(
    root: &Utf8Path,
    dir_name: &str,
    files: &[ContextFile],
    prompt: &str,
) -> Result<(), WorkspaceError> {
    let root_dir = open_root(root)?;
    let sandbox_path = root.join(dir_name);
    if root_dir.exists(dir_name) {
        warn!(path = %sandbox_path, "replacing stale workspace");
        root_dir
            .remove_dir_all(dir_name)
            .map_err(|err| WorkspaceError::io(&sandbox_path, err))?;
    }
    root_dir
        .create_dir(dir_name)
        .map_err(|err| WorkspaceError::io(&sandbox_path, err))?;

    let populated = root_dir
        .open_dir(dir_name)
        .map_err(|err| WorkspaceError::io(&sandbox_path, err))
        .and_then(|sandbox| populate(&sandbox, &sandbox_path, files, prompt));
    if let Err(err) = populated {
        if let Err(cleanup) = root_dir.remove_dir_all(dir_name) {
            warn!(path = %sandbox_path, error = %cleanup, "failed to remove partial workspace");
        }
        return Err(err);
    }
    Ok(())
}

fn populate(
    sandbox: &Dir,
    sandbox_path: &Utf8Path,
    files: &[ContextFile],
    prompt: &str,
) -> Result<(), WorkspaceError> {
    let at = |relative: &str| sandbox_path.join(relative);
    for dir in [CONTEXT_DIR, OUTPUT_DIR, ARTIFACTS_DIR] {
        sandbox
            .create_dir(dir)
            .map_err(|err| WorkspaceError::io(at(dir), err))?;
    }
    let context = sandbox
        .open_dir(CONTEXT_DIR)
        .map_err(|err| WorkspaceError::io(at(CONTEXT_DIR), err))?;
    for file in files {
        context
            .write(&file.name, &file.contents)
            .map_err(|err| WorkspaceError::io(at(CONTEXT_DIR).join(&file.name), err))?;
    }
    sandbox
        .write(PROMPT_FILE, prompt)
        .map_err(|err| WorkspaceError::io(at(PROMPT_FILE), err))?;
    sandbox
        .write(LOG_FILE, b"")
        .map_err(|err| WorkspaceError::io(at(LOG_FILE), err))?;
    Ok(())
}

fn list_dirs(root: &Utf8Path) -> Result<Vec<String>, WorkspaceError> {
    let root_dir = match Dir::open_ambient_dir(root, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(WorkspaceError::io(root, err)),
    };
    let mut names = Vec::new();
    for listed in root_dir
        .entries()
        .map_err(|err| WorkspaceError::io(root, err))?
    {
        let entry = listed.map_err(|err| WorkspaceError::io(root, err))?;
        let is_dir = entry
            .file_type()
            .map_err(|err| WorkspaceError::io(root, err))?
            .is_dir();
        if is_dir {
            names.push(
                entry
                    .file_name()
                    .map_err(|err| WorkspaceError::io(root, err))?,
            );
        }
    }
    names.sort();
    Ok(names)
}

fn remove_sandbox(
    root: &Utf8Path,
    dir_name: &str,
    archive_to: Option<&Utf8Path>,
) -> Result<bool, WorkspaceError> {
    let root_dir = match Dir::open_ambient_dir(root, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(WorkspaceError::io(root, err)),
    };
    if !root_dir.exists(dir_name) {
        return Ok(false);
    }
    let sandbox_path = root.join(dir_name);

    if let Some(archive_path) = archive_to {
        let sandbox = root_dir
            .open_dir(dir_name)
            .map_err(|err| WorkspaceError::io(&sandbox_path, err))?;
        Dir::create_ambient_dir_all(archive_path, ambient_authority())
            .map_err(|err| WorkspaceError::io(archive_path, err))?;
        let archive = Dir::open_ambient_dir(archive_path, ambient_authority())
            .map_err(|err| WorkspaceError::io(archive_path, err))?;
        archive_sandbox(&sandbox, &archive, archive_path)?;
    }

    root_dir
        .remove_dir_all(dir_name)
        .map_err(|err| WorkspaceError::io(&sandbox_path, err))?;
    Ok(true)
}

fn archive_sandbox(
    sandbox: &Dir,
    archive: &Dir,
    archive_path: &Utf8Path,
) -> Result<(), WorkspaceError> {
    for dir in [OUTPUT_DIR, ARTIFACTS_DIR] {
        let source = match sandbox.open_dir(dir) {
            Ok(source) => source,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(WorkspaceError::io(dir, err)),
        };
        archive
            .create_dir_all(dir)
            .map_err(|err| WorkspaceError::io(archive_path.join(dir), err))?;
        let target = archive
            .open_dir(dir)
            .map_err(|err| WorkspaceError::io(archive_path.join(dir), err))?;
        copy_tree(&source, &target, &archive_path.join(dir))?;
    }
    match sandbox.copy(LOG_FILE, archive, LOG_FILE) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(WorkspaceError::io(archive_path.join(LOG_FILE), err)),
    }
}

fn copy_tree(source: &Dir, target: &Dir, target_path: &Utf8Path) -> Result<(), WorkspaceError> {
    let io_err = |err| WorkspaceError::io(target_path, err);
    for listed in source.entries().map_err(io_err)? {
        let entry = listed.map_err(io_err)?;
        let name = entry.file_name().map_err(io_err)?;
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_dir() {
            target.create_dir_all(&name).map_err(io_err)?;
            let nested_source = source.open_dir(&name).map_err(io_err)?;
            let nested_target = target.open_dir(&name).map_err(io_err)?;
            copy_tree(&nested_source, &nested_target, &target_path.join(&name))?;
        } else if file_type.is_file() {
            source.copy(&name, target, &name).map_err(io_err)?;
        } else {
            warn!(path = %target_path.join(&name), "skipping non-regular file while archiving");
        }
    }
    Ok(())
}
