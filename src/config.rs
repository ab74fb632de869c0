//! Exercise profiles: TOML parsing, validation and the on-disk profile store.

use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::conditions::Thresholds;
use crate::error::{Error, Result};
use crate::phase::{Guard, PhaseSpec, validate_phases};
use crate::scoring::{ScoringSpec, validate_scoring};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Everything needed to run one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    #[serde(default)]
    pub thresholds: Thresholds,
    pub phases: Vec<PhaseSpec>,
    pub scoring: ScoringSpec,
}

impl Profile {
    /// Parses and validates a profile.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(text)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            Error::Parse(msg) => Error::Parse(format!("{}: {msg}", path.display())),
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn title(&self) -> &str {
        if self.meta.title.is_empty() {
            &self.meta.name
        } else {
            &self.meta.title
        }
    }
}

pub fn validate_profile(p: &Profile) -> Result<()> {
    if p.meta.name.trim().is_empty() {
        return Err(Error::Config("meta.name must not be empty".into()));
    }
    p.thresholds.validate().map_err(Error::Config)?;
    validate_phases(&p.phases).map_err(Error::Config)?;
    validate_scoring(&p.scoring).map_err(Error::Config)?;

    let holds_stability = p.phases.iter().any(|ph| {
        ph.track_stability && matches!(ph.guard, Some(Guard::HeldForDuration { .. }))
    });
    let tracks_motion = p.phases.iter().any(|ph| ph.track_motion);
    for c in &p.scoring.components {
        if c.source.needs_stability() && !holds_stability {
            return Err(Error::Config(format!(
                "component '{}' scores stability but no held phase sets track_stability",
                c.name
            )));
        }
        if c.source.needs_motion() && !tracks_motion {
            return Err(Error::Config(format!(
                "component '{}' scores motion but no phase sets track_motion",
                c.name
            )));
        }
    }
    for ph in &p.phases {
        if ph.track_stability && !matches!(ph.guard, Some(Guard::HeldForDuration { .. })) {
            warn!(
                "profile '{}': phase '{}' tracks stability without a held guard; nothing will be measured",
                p.meta.name, ph.name
            );
        }
    }
    Ok(())
}

/// Profiles compiled into the binary.
pub const BUILTIN: [(&str, &str); 5] = [
    ("balance", include_str!("../profiles/balance.toml")),
    ("balance_full", include_str!("../profiles/balance_full.toml")),
    ("jump", include_str!("../profiles/jump.toml")),
    ("throw", include_str!("../profiles/throw.toml")),
    ("wave_arms", include_str!("../profiles/wave_arms.toml")),
];

pub const DEFAULT_EXERCISE: &str = "balance";

pub fn builtin(name: &str) -> Result<Profile> {
    let (_, text) = BUILTIN
        .iter()
        .find(|(n, _)| *n == name)
        .ok_or_else(|| Error::UnknownExercise(name.to_string()))?;
    Profile::from_toml_str(text)
}

/// Directory of editable profiles plus an `active` pointer file.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub root: PathBuf,
    pub exercises_dir: PathBuf,
    pub active_ptr: PathBuf,
}

/// `~/.config/posecoach`
pub fn default_root() -> Result<PathBuf> {
    let dirs = UserDirs::new()
        .ok_or_else(|| Error::Config("cannot locate the home directory".into()))?;
    Ok(dirs.home_dir().join(".config").join("posecoach"))
}

impl ProfileStore {
    pub fn open_or_install() -> Result<Self> {
        Self::open_at(default_root()?)
    }

    /// Opens a store at `root`, installing any missing built-in profile and
    /// the active pointer.
    pub fn open_at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let exercises_dir = root.join("exercises");
        fs::create_dir_all(&exercises_dir)?;

        for (name, text) in BUILTIN {
            let path = exercises_dir.join(format!("{name}.toml"));
            if !path.exists() {
                fs::write(&path, text)?;
                info!("installed {name} profile at {}", path.display());
            }
        }

        let active_ptr = root.join("active");
        if !active_ptr.exists() {
            fs::write(&active_ptr, DEFAULT_EXERCISE)?;
        }

        Ok(Self {
            root,
            exercises_dir,
            active_ptr,
        })
    }

    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Error::UnknownExercise(name.to_string()));
        }
        Ok(self.exercises_dir.join(format!("{name}.toml")))
    }

    pub fn active_name(&self) -> Result<String> {
        let name = fs::read_to_string(&self.active_ptr)?.trim().to_string();
        if name.is_empty() {
            return Ok(DEFAULT_EXERCISE.to_string());
        }
        Ok(name)
    }

    /// Points the store at `name` after checking that it loads.
    pub fn set_active(&self, name: &str) -> Result<()> {
        self.load(name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        info!("active exercise is now {name}");
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.exercises_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn load(&self, name: &str) -> Result<Profile> {
        let path = self.path_of(name)?;
        if !path.exists() {
            return Err(Error::UnknownExercise(name.to_string()));
        }
        Profile::from_path(&path)
    }

    pub fn load_active(&self) -> Result<(String, Profile)> {
        let name = self.active_name()?;
        let profile = self.load(&name)?;
        Ok((name, profile))
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let profiles: serde_json::Map<String, serde_json::Value> = self
            .list()
            .into_iter()
            .map(|name| {
                let status = match self.load(&name) {
                    Ok(_) => "ok".to_string(),
                    Err(e) => e.to_string(),
                };
                (name, serde_json::Value::String(status))
            })
            .collect();
        let active = self.active_name().unwrap_or_else(|e| format!("unreadable: {e}"));
        serde_json::json!({
            "root": self.root,
            "exercises_dir": self.exercises_dir,
            "active_exercise": active,
            "profiles": profiles,
            "builtin": BUILTIN.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
            "hints": {
                "log_level": "POSECOACH_LOG=debug posecoach run",
                "restore_builtin": "delete a profile file and it is reinstalled on next start"
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ComponentSource;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("posecoach-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn builtin_profiles_are_valid() {
        for (name, _) in BUILTIN {
            let p = builtin(name).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(p.meta.name, name);
        }
    }

    #[test]
    fn unknown_builtin() {
        assert!(matches!(builtin("pushups"), Err(Error::UnknownExercise(_))));
    }

    #[test]
    fn balance_scores_arm_and_trunk() {
        let p = builtin("balance").unwrap();
        let names: Vec<_> = p.scoring.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["arm", "trunk"]);
        assert!(matches!(
            p.scoring.components[1].source,
            ComponentSource::Stability { .. }
        ));
    }

    #[test]
    fn stability_component_needs_a_tracked_hold() {
        let mut p = builtin("balance").unwrap();
        for ph in &mut p.phases {
            ph.track_stability = false;
        }
        let err = validate_profile(&p).unwrap_err().to_string();
        assert!(err.contains("track_stability"), "{err}");
    }

    #[test]
    fn jump_runs_through_propulsion() {
        let p = builtin("jump").unwrap();
        let names: Vec<_> = p.phases.iter().map(|ph| ph.name.as_str()).collect();
        assert_eq!(names, ["preparation", "propulsion", "takeoff", "flight", "landed"]);
    }

    #[test]
    fn motion_component_needs_tracked_phase() {
        let mut p = builtin("jump").unwrap();
        for ph in &mut p.phases {
            ph.track_motion = false;
        }
        assert!(validate_profile(&p).is_err());
    }

    #[test]
    fn rejects_bad_thresholds_at_load() {
        let text = BUILTIN[0].1.replace("foot_raise = 0.05", "foot_raise = 1.5");
        assert!(matches!(Profile::from_toml_str(&text), Err(Error::Config(_))));
        let text = BUILTIN[0]
            .1
            .replace("arm_raise_min_score = 7.0", "arm_raise_min_score = 10.0");
        match Profile::from_toml_str(&text) {
            Err(Error::Config(msg)) => assert!(msg.contains("arm_raise_min_score"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Profile::from_toml_str("meta = 3"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn store_installs_and_switches() {
        let dir = scratch("store");
        let store = ProfileStore::open_at(&dir).unwrap();
        assert_eq!(store.list(), ["balance", "balance_full", "jump", "throw", "wave_arms"]);
        assert_eq!(store.active_name().unwrap(), DEFAULT_EXERCISE);

        store.set_active("jump").unwrap();
        let (name, p) = store.load_active().unwrap();
        assert_eq!(name, "jump");
        assert_eq!(p.meta.name, "jump");

        assert!(store.set_active("nope").is_err());
        assert!(store.path_of("../etc/passwd").is_err());
        assert_eq!(store.active_name().unwrap(), "jump");

        let report = store.doctor_report();
        assert_eq!(report["profiles"]["throw"], "ok");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn store_reports_broken_profile() {
        let dir = scratch("broken");
        let store = ProfileStore::open_at(&dir).unwrap();
        fs::write(store.path_of("broken").unwrap(), "[meta]\nname = \"broken\"\n").unwrap();
        assert!(store.load("broken").is_err());
        let report = store.doctor_report();
        assert_ne!(report["profiles"]["broken"], "ok");
        let _ = fs::remove_dir_all(&dir);
    }
}
