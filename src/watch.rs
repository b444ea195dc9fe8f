//! Watch mode.
//!
//! The watcher is started before the initial build, so changes made while
//! that build runs are buffered instead of lost. After that, events are
//! batched until the tree has been quiet for [`DEBOUNCE`], classified into
//! [`Trigger`]s, and each trigger reruns the matching part of the build:
//!
//! | Change | Trigger | Action |
//! |--------|---------|--------|
//! | `config.toml` | [`Trigger::Config`] | reload config, full rebuild |
//! | `content/<name>/…` | [`Trigger::Category`] | rebuild that category |
//! | `static/…` | [`Trigger::Static`] | copy static files |
//!
//! Every rerun is an ordinary one-shot build with a fresh listing. A failed
//! rerun is reported by the caller and watching continues.

use crate::build::{BuildError, BuildEvent, Site};
use crate::render::Renderer;
use crate::templates::Compositor;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use thiserror::Error;

/// Quiet period that ends a batch of events.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("watcher stopped")]
    Disconnected,
}

/// What a change requires. Ordered so a config change sorts first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trigger {
    Config,
    Category(String),
    Static,
}

/// Absolute locations the watcher reports paths against.
#[derive(Debug, Clone)]
pub struct WatchRoots {
    root: PathBuf,
    content: PathBuf,
    static_dir: PathBuf,
    config_file: PathBuf,
}

impl WatchRoots {
    /// Resolve the project root. Watchers report canonical paths, so the
    /// root is canonicalized too.
    pub fn new(root: &Path) -> std::io::Result<Self> {
        let root = root.canonicalize()?;
        Ok(Self {
            content: root.join("content"),
            static_dir: root.join("static"),
            config_file: root.join("config.toml"),
            root,
        })
    }

    /// Map a changed path to the trigger it causes, if any.
    pub fn classify(&self, path: &Path) -> Option<Trigger> {
        if is_editor_noise(path) {
            return None;
        }
        if path == self.config_file {
            return Some(Trigger::Config);
        }
        if let Ok(rest) = path.strip_prefix(&self.content) {
            return match rest.components().next() {
                Some(Component::Normal(name)) => {
                    let name = name.to_string_lossy();
                    (!name.starts_with('.')).then(|| Trigger::Category(name.into_owned()))
                }
                _ => None,
            };
        }
        if path.starts_with(&self.static_dir) {
            return Some(Trigger::Static);
        }
        None
    }
}

/// Swap files, backups and hidden files written next to real content.
fn is_editor_noise(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return true;
    };
    name.starts_with('.') || name.ends_with('~') || name.ends_with(".swp")
}

/// Reduce a batch of triggers to the work it requires.
///
/// A config change rebuilds everything, so it absorbs every other trigger.
pub fn plan(triggers: BTreeSet<Trigger>) -> Vec<Trigger> {
    if triggers.contains(&Trigger::Config) {
        return vec![Trigger::Config];
    }
    triggers.into_iter().collect()
}

/// Changes collected from one quiet-period batch.
#[derive(Debug, Default)]
pub struct Batch {
    pub triggers: Vec<Trigger>,
    /// Watcher errors seen during the batch. Reported, not fatal.
    pub errors: Vec<notify::Error>,
}

/// A running filesystem watcher over a project root.
pub struct SiteWatcher {
    roots: WatchRoots,
    rx: Receiver<notify::Result<notify::Event>>,
    _watcher: RecommendedWatcher,
}

impl SiteWatcher {
    /// Start watching `content/`, `static/` and `config.toml` under `root`.
    ///
    /// Events start buffering immediately; call this before the initial build.
    pub fn start(root: &Path) -> Result<Self, WatchError> {
        let roots = WatchRoots::new(root)?;
        let (tx, rx) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        // The root itself is watched shallowly, only for config.toml.
        watcher.watch(&roots.root, RecursiveMode::NonRecursive)?;
        for dir in [&roots.content, &roots.static_dir] {
            if dir.exists() {
                watcher.watch(dir, RecursiveMode::Recursive)?;
            }
        }

        Ok(Self {
            roots,
            rx,
            _watcher: watcher,
        })
    }

    pub fn roots(&self) -> &WatchRoots {
        &self.roots
    }

    /// Block until something changes, then collect events until quiet.
    pub fn next_batch(&self) -> Result<Batch, WatchError> {
        let mut triggers = BTreeSet::new();
        let mut errors = Vec::new();

        let first = self.rx.recv().map_err(|_| WatchError::Disconnected)?;
        self.add(first, &mut triggers, &mut errors);
        loop {
            match self.rx.recv_timeout(DEBOUNCE) {
                Ok(res) => self.add(res, &mut triggers, &mut errors),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return Err(WatchError::Disconnected),
            }
        }

        Ok(Batch {
            triggers: plan(triggers),
            errors,
        })
    }

    fn add(
        &self,
        res: notify::Result<notify::Event>,
        triggers: &mut BTreeSet<Trigger>,
        errors: &mut Vec<notify::Error>,
    ) {
        match res {
            Ok(event) => triggers.extend(triggers_for(&self.roots, &event)),
            Err(e) => errors.push(e),
        }
    }
}

/// Triggers caused by a single notify event.
pub fn triggers_for(roots: &WatchRoots, event: &notify::Event) -> Vec<Trigger> {
    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        // mtime/atime/chmod noise would otherwise rebuild for nothing.
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => {}
        _ => return Vec::new(),
    }
    event
        .paths
        .iter()
        .filter_map(|path| roots.classify(path))
        .collect()
}

/// Run the build step a trigger asks for.
///
/// Categories that are not configured are ignored.
pub fn apply<R: Renderer, C: Compositor>(
    site: &mut Site<R, C>,
    trigger: &Trigger,
    events: Option<Sender<BuildEvent>>,
) -> Result<(), BuildError> {
    match trigger {
        Trigger::Config => {
            site.reload_config()?;
            site.build_all(events)?;
        }
        Trigger::Category(name) => {
            if site.config().categories.contains_key(name) {
                site.build_category(name, events)?;
            }
        }
        Trigger::Static => {
            site.copy_static(events)?;
        }
    }
    Ok(())
}
