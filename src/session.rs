//! Artifact sessions: where screenshots of a run are written.
//!
//! Provides centralized management of artifact directories with:
//! - Unique session directories under a configurable base directory
//! - Stable, sortable, collision-free artifact names
//! - Session metadata and a run manifest for downstream report tooling

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::runner::ScenarioResult;

/// Destination for run artifacts
pub trait ArtifactStore: Send + Sync {
    /// Reserve a fresh path for an artifact of `scenario` labelled `label`.
    /// Every call returns a different path.
    fn artifact_path(&self, scenario: &str, label: &str) -> PathBuf;

    /// Write `bytes` to `path`, creating the directory if needed.
    /// Never overwrites an existing file; returns the confirmed path.
    fn save(&self, bytes: &[u8], path: &Path) -> io::Result<PathBuf>;
}

/// An artifact session with organized file management
#[derive(Debug)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Root directory for this session
    pub dir: PathBuf,
    /// Whether to keep files after the session is dropped
    pub keep: bool,
    /// Browser the session was recorded with (if known)
    pub browser: Option<String>,
    counter: AtomicU64,
}

impl Session {
    /// Create a session with a specific name/prefix under `base_dir`
    pub fn with_name(base_dir: &Path, name: &str) -> Self {
        let base_id = format!(
            "{}_{}_{}",
            sanitize_name(name),
            generate_timestamp_suffix(),
            std::process::id()
        );
        let mut id = base_id.clone();
        let mut suffix = 1;
        while base_dir.join(&id).exists() {
            suffix += 1;
            id = format!("{}_{}", base_id, suffix);
        }
        let dir = base_dir.join(&id);

        Self {
            id,
            dir,
            keep: true,
            browser: None,
            counter: AtomicU64::new(0),
        }
    }

    /// Create a session writing directly into `dir`
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(generate_session_id);

        Self {
            id,
            dir,
            keep: true,
            browser: None,
            counter: AtomicU64::new(0),
        }
    }

    /// Set whether to keep files after the session is dropped
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Record the browser this session captures from
    pub fn with_browser(mut self, browser: &str) -> Self {
        self.browser = Some(browser.to_string());
        self
    }

    /// Initialize the session directory (idempotent)
    pub fn init(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
            "host": host,
            "browser": self.browser,
        });

        let metadata_path = self.dir.join(".session.json");
        fs::write(metadata_path, serde_json::to_string_pretty(&metadata)?)?;

        Ok(())
    }

    /// Write the results of a run as `manifest.json`
    pub fn write_manifest(&self, results: &[ScenarioResult]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join("manifest.json");
        let manifest = serde_json::json!({
            "session": self.id,
            "written": chrono::Utc::now().to_rfc3339(),
            "scenarios": results,
        });
        fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
        Ok(path)
    }

    /// List all PNG files in the session, sorted by name
    pub fn list_captures(&self) -> io::Result<Vec<PathBuf>> {
        let mut captures = Vec::new();
        if self.dir.exists() {
            for entry in fs::read_dir(&self.dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().map(|e| e == "png").unwrap_or(false) {
                    captures.push(path);
                }
            }
        }
        captures.sort();
        Ok(captures)
    }

    /// Remove the session directory unless it is kept
    pub fn cleanup(&self) -> io::Result<()> {
        if self.dir.exists() && !self.keep {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl ArtifactStore for Session {
    fn artifact_path(&self, scenario: &str, label: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.dir.join(artifact_file_name(scenario, n, label))
    }

    fn save(&self, bytes: &[u8], path: &Path) -> io::Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(path.to_path_buf())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

/// `<scenario>_<counter>_<label>.png`; the zero-padded counter keeps names sortable
pub fn artifact_file_name(scenario: &str, counter: u64, label: &str) -> String {
    format!("{}_{:04}_{}.png", sanitize_name(scenario), counter, sanitize_name(label))
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    format!(
        "session_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        std::process::id()
    )
}

/// Generate a millisecond timestamp suffix
fn generate_timestamp_suffix() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S%3f").to_string()
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Clean up sessions under `base_dir` older than `max_age`
pub fn cleanup_old_sessions(base_dir: &Path, max_age: std::time::Duration) -> io::Result<usize> {
    if !base_dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut cleaned = 0;

    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if let Some(age) = age {
            if age > max_age && fs::remove_dir_all(&path).is_ok() {
                cleaned += 1;
            }
        }
    }

    Ok(cleaned)
}

/// List all existing sessions under `base_dir`
pub fn list_sessions(base_dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !base_dir.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(base_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            sessions.push(path);
        }
    }
    sessions.sort();
    Ok(sessions)
}
