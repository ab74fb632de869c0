use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use signal_hook::{consts::TERM_SIGNALS, flag};
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, channel},
    },
};

use posecoach::config::{DEFAULT_EXERCISE, builtin};
use posecoach::{Error, FrameReader, Profile, ProfileStore, Session};

#[derive(Debug, Default)]
pub struct RunOptions {
    pub exercise: Option<String>,
    pub input: Option<PathBuf>,
    pub profile_path: Option<PathBuf>,
    pub json: bool,
    pub watch: bool,
}

/// Drives one session over a frame stream until the exercise completes, the
/// stream ends or a termination signal arrives.
pub fn run(opts: RunOptions) -> Result<()> {
    let (profile, source) = resolve_profile(&opts)?;
    info!("running '{}' ({})", profile.meta.name, profile.title());
    let mut session = Session::new(profile)?;

    // First signal asks the loop to stop; a second one while it is still
    // set terminates the process.
    let term = Arc::new(AtomicBool::new(false));
    for sig in TERM_SIGNALS {
        flag::register_conditional_shutdown(*sig, 1, Arc::clone(&term))?;
        flag::register(*sig, Arc::clone(&term))?;
    }

    let watch = match (&source, opts.watch) {
        (Some(path), true) => Some(ProfileWatch::start(path)?),
        (None, true) => {
            warn!("--watch ignored: built-in profile has no file to watch");
            None
        }
        _ => None,
    };

    let reader: Box<dyn BufRead> = match &opts.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).map_err(|e| anyhow!("failed to open {}: {e}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let mut frames = FrameReader::new(reader);

    let mut last_instruction = String::new();
    let mut processed = 0usize;
    let mut rejected = 0usize;
    let mut completed = false;

    while !term.load(Ordering::Relaxed) {
        let frame = match frames.next() {
            None => break,
            Some(Ok(frame)) => frame,
            Some(Err(e @ Error::InvalidFrame { .. })) => {
                warn!("skipping frame: {e}");
                rejected += 1;
                continue;
            }
            Some(Err(e)) => return Err(e.into()),
        };

        if let Some(w) = &watch {
            if let Some(profile) = w.poll() {
                match session.reconfigure(profile) {
                    Ok(()) => {
                        info!("profile reloaded, attempt restarted");
                        last_instruction.clear();
                    }
                    Err(e) => error!("reload rejected: {e}; keeping last good profile"),
                }
            }
        }

        let outcome = session.process_frame(&frame)?;
        processed += 1;

        if opts.json {
            println!("{}", serde_json::to_string(&outcome)?);
        } else {
            if let Some(t) = &outcome.transition {
                info!(
                    "{} -> {}{}",
                    t.from,
                    t.to,
                    if t.timed_out { " (timed out)" } else { "" }
                );
            }
            if outcome.instruction != last_instruction {
                println!(
                    "[{:>7}ms] {:<14} {}",
                    outcome.timestamp_ms, outcome.phase, outcome.instruction
                );
                last_instruction = outcome.instruction.clone();
            }
        }

        if let Some(result) = &outcome.result {
            if !opts.json {
                println!("{}", serde_json::to_string_pretty(result)?);
            }
            completed = true;
            break;
        }
    }

    if term.load(Ordering::Relaxed) {
        info!("interrupted");
    }
    info!(
        "{} lines read: {processed} frames processed, {} without a pose, {rejected} rejected",
        frames.lines_read(),
        frames.skipped()
    );
    if !completed {
        info!(
            "stream ended before '{}' was completed (phase '{}')",
            session.profile().meta.name,
            session.phase()
        );
    }
    Ok(())
}

fn resolve_profile(opts: &RunOptions) -> Result<(Profile, Option<PathBuf>)> {
    if let Some(path) = &opts.profile_path {
        return Ok((Profile::from_path(path)?, Some(path.clone())));
    }
    match ProfileStore::open_or_install() {
        Ok(store) => {
            let name = match &opts.exercise {
                Some(n) => n.clone(),
                None => store.active_name()?,
            };
            let profile = store.load(&name)?;
            Ok((profile, Some(store.path_of(&name)?)))
        }
        Err(e) => {
            warn!("profile store unavailable ({e}); using built-in profiles");
            let name = opts.exercise.as_deref().unwrap_or(DEFAULT_EXERCISE);
            Ok((builtin(name)?, None))
        }
    }
}

/// Reloads a profile file when it changes on disk.
struct ProfileWatch {
    path: PathBuf,
    rx: Receiver<notify::Result<notify::Event>>,
    _watcher: RecommendedWatcher,
}

impl ProfileWatch {
    fn start(path: &Path) -> Result<Self> {
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        // Editors often replace the file, so watch its directory.
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("watching {} for changes", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            rx,
            _watcher: watcher,
        })
    }

    /// Drains pending events; returns the new profile if the file changed
    /// and still validates.
    fn poll(&self) -> Option<Profile> {
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) => {
                    let relevant = matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_))
                        && ev.paths.iter().any(|p| p.file_name() == self.path.file_name());
                    changed |= relevant;
                }
                Err(e) => error!("watch error: {e}"),
            }
        }
        if !changed {
            return None;
        }
        match Profile::from_path(&self.path) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("reload failed: {e}; keeping last good profile");
                None
            }
        }
    }
}
