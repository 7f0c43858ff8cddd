//! The directory watcher / reconciler.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use dynflag::{FlagSet, ValueKind};

use crate::{ConfigMapError, Result};

/// The child a ConfigMap volume swaps atomically on update.
const DATA_LINK: &str = "..data";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    New,
    Initialized,
    Started,
    Stopped,
}

/// Propagates the contents of a directory into a [`FlagSet`].
///
/// Lifecycle: [`Updater::new`] → [`Updater::initialize`] (one synchronous
/// read of every file) → [`Updater::start`] (background observer) →
/// [`Updater::stop`]. Illegal transitions are errors; `stop` is idempotent
/// once started. `start` must be called within a Tokio runtime.
pub struct Updater {
    flags: FlagSet,
    dir_path: PathBuf,
    parent_path: PathBuf,
    state: State,
    warnings: Arc<AtomicU32>,
    errors: Arc<AtomicU32>,
    watcher: Option<RecommendedWatcher>,
    events: Option<mpsc::Receiver<notify::Event>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Updater {
    pub fn new(flags: FlagSet, dir_path: impl AsRef<Path>) -> Result<Self> {
        let dir_path = dir_path.as_ref().to_path_buf();
        let parent_path = dir_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or(ConfigMapError::Lifecycle("watched directory has no parent"))?;
        let (tx, rx) = mpsc::channel(128);
        let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            if let Ok(event) = result {
                let _ = tx.blocking_send(event);
            }
        })?;
        Ok(Self {
            flags,
            dir_path,
            parent_path,
            state: State::New,
            warnings: Arc::new(AtomicU32::new(0)),
            errors: Arc::new(AtomicU32::new(0)),
            watcher: Some(watcher),
            events: Some(rx),
            shutdown: None,
        })
    }

    /// Reads every file in the directory once, synchronously. Static flags
    /// may be loaded here; unknown names are warnings, bad values are
    /// collected into the returned [`ConfigMapError::Sync`].
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != State::New {
            return Err(ConfigMapError::Lifecycle("updater already initialized"));
        }
        self.state = State::Initialized;
        read_all(&self.flags, &self.dir_path, false, &self.warnings, &self.errors)
    }

    /// Spawns the observer task watching the directory and its parent.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            State::New => return Err(ConfigMapError::Lifecycle("updater not initialized")),
            State::Started => return Err(ConfigMapError::Lifecycle("updater already started")),
            State::Stopped => return Err(ConfigMapError::Lifecycle("updater already stopped")),
            State::Initialized => {}
        }
        let mut watcher = self
            .watcher
            .take()
            .ok_or(ConfigMapError::Lifecycle("updater already started"))?;
        watcher.watch(&self.parent_path, RecursiveMode::NonRecursive)?;
        watcher.watch(&self.dir_path, RecursiveMode::NonRecursive)?;
        info!(
            dir = %self.dir_path.display(),
            parent = %self.parent_path.display(),
            "watching flag directory"
        );

        let mut events = self
            .events
            .take()
            .ok_or(ConfigMapError::Lifecycle("updater already started"))?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        self.shutdown = Some(shutdown_tx);

        let flags = self.flags.clone();
        let dir = self.dir_path.clone();
        let parent = self.parent_path.clone();
        let warnings = Arc::clone(&self.warnings);
        let errors = Arc::clone(&self.errors);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        handle_event(&mut watcher, &flags, &dir, &event, &warnings, &errors);
                    }
                }
            }
            let _ = watcher.unwatch(&dir);
            let _ = watcher.unwatch(&parent);
            // Unblock the watcher callback before the watcher joins its
            // thread on drop.
            drop(events);
            debug!(dir = %dir.display(), "flag directory watch stopped");
        });
        self.state = State::Started;
        Ok(())
    }

    /// Signals the observer to exit. Non-blocking; idempotent once started.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            State::Started => {
                if let Some(shutdown) = self.shutdown.take() {
                    let _ = shutdown.send(());
                }
                self.state = State::Stopped;
                Ok(())
            }
            State::Stopped => Ok(()),
            State::New | State::Initialized => {
                Err(ConfigMapError::Lifecycle("updater was never started"))
            }
        }
    }

    /// Count of files seen for flag names that are not registered.
    pub fn warnings(&self) -> u32 {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Count of flag set failures.
    pub fn errors(&self) -> u32 {
        self.errors.load(Ordering::Relaxed)
    }
}

impl Drop for Updater {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// New + initialize + start in one call.
pub fn setup(flags: FlagSet, dir_path: impl AsRef<Path>) -> Result<Updater> {
    let dir_path = dir_path.as_ref();
    info!(dir = %dir_path.display(), "watching directory for flag values");
    let mut updater = Updater::new(flags, dir_path)?;
    updater.initialize()?;
    updater.start()?;
    Ok(updater)
}

fn hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(true, |name| name.starts_with('.'))
}

fn read_all(
    flags: &FlagSet,
    dir: &Path,
    dynamic_only: bool,
    warnings: &AtomicU32,
    errors: &AtomicU32,
) -> Result<()> {
    let mut failures = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            // ConfigMap internals and dot files
            continue;
        }
        let path = entry.path();
        debug!(flag = name.as_str(), path = %path.display(), "checking flag file");
        match read_flag_file(flags, &path, dynamic_only) {
            Ok(()) => {}
            Err(dynflag::Error::FlagNotFound(_)) => {
                warn!(flag = name.as_str(), "file for unknown flag");
                warnings.fetch_add(1, Ordering::Relaxed);
            }
            Err(dynflag::Error::FlagNotDynamic(_)) if dynamic_only => {
                // Static flags stay put after startup.
            }
            Err(err) => {
                failures.push(format!("flag {name}: {err}"));
                errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ConfigMapError::Sync {
            count: failures.len(),
            details: failures.join("\n"),
        })
    }
}

fn read_flag_file(flags: &FlagSet, path: &Path, dynamic_only: bool) -> dynflag::Result<()> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| dynflag::Error::FlagNotFound(path.display().to_string()))?;
    let flag = flags
        .lookup(name)
        .ok_or_else(|| dynflag::Error::FlagNotFound(name.to_string()))?;
    if dynamic_only && !flag.is_dynamic() {
        return Err(dynflag::Error::FlagNotDynamic(name.to_string()));
    }
    let contents = std::fs::read(path)?;
    if flag.kind() == ValueKind::Bytes {
        // The file is the binary payload; no base64 framing.
        info!(flag = name, len = contents.len(), "updating binary flag from file");
        return flag.value().set_raw(&contents);
    }
    let text = String::from_utf8_lossy(&contents);
    info!(flag = name, value = %text, "updating flag from file");
    flags.set(name, &text)
}

fn handle_event(
    watcher: &mut RecommendedWatcher,
    flags: &FlagSet,
    dir: &Path,
    event: &notify::Event,
    warnings: &AtomicU32,
    errors: &AtomicU32,
) {
    debug!(?event, "fs event");
    let data_link = dir.join(DATA_LINK);
    for path in &event.paths {
        if path == dir || *path == data_link {
            // The directory (or its ..data indirection) came into existence
            // under a new inode: a whole-volume swap. Backends report that
            // as a create or as the destination half of a rename.
            if matches!(
                event.kind,
                EventKind::Create(_)
                    | EventKind::Modify(ModifyKind::Name(
                        RenameMode::To | RenameMode::Both | RenameMode::Any
                    ))
            ) {
                if let Err(err) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                    error!(dir = %dir.display(), %err, "unable to re-watch flag directory");
                }
                info!("re-reading flags after directory swap");
                if let Err(err) = read_all(flags, dir, true, warnings, errors) {
                    error!(%err, "directory reload yielded errors");
                }
            }
        } else if path.starts_with(dir) && !hidden(path) {
            match event.kind {
                EventKind::Create(_)
                | EventKind::Remove(_)
                | EventKind::Modify(ModifyKind::Data(_))
                | EventKind::Modify(ModifyKind::Name(_))
                | EventKind::Modify(ModifyKind::Any)
                | EventKind::Any => match read_flag_file(flags, path, true) {
                    Ok(()) => {}
                    Err(dynflag::Error::FlagNotFound(name)) => {
                        warn!(flag = name.as_str(), "file event for unknown flag");
                        warnings.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(dynflag::Error::FlagNotDynamic(_)) => {}
                    Err(err) => {
                        error!(path = %path.display(), %err, "failed setting flag from file");
                        errors.fetch_add(1, Ordering::Relaxed);
                    }
                },
                // Metadata-only changes (chmod) and the rest are ignored.
                _ => {}
            }
        }
    }
}
