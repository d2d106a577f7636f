use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const GLOSSARY_FILE: &str = "glossary.json";
pub const TRANSLATIONS_FILE: &str = "translations.json";
pub const FAILED_FILE: &str = "failed_translations.json";
pub const LOG_FILE: &str = "translation.log";

/// JSON documents kept in the save directory.
///
/// Writes go to `<name>.tmp` first and are renamed over the target, so a crash
/// mid-write leaves the last committed file intact. Single writer only.
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("create save dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Loads `name`, falling back to `default` when the file is missing or unreadable.
    pub fn load<T: DeserializeOwned>(&self, name: &str, default: T) -> T {
        let path = self.path_of(name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return default,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "error loading file; using default");
                return default;
            }
        };
        match serde_json::from_str(text.trim_start_matches('\u{FEFF}')) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "error parsing file; using default");
                default
            }
        }
    }

    /// Atomically replaces `name` with `data`.
    ///
    /// On failure the temporary file is removed, the error is logged and returned,
    /// and the previously saved file is left untouched.
    pub fn save<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> anyhow::Result<()> {
        let path = self.path_of(name);
        let tmp = tmp_path_for(&path);
        let res = write_atomic(&path, &tmp, data);
        if let Err(e) = &res {
            tracing::error!(file = name, error = %format!("{e:#}"), "error saving file");
            if tmp.exists() {
                let _ = fs::remove_file(&tmp);
            }
        }
        res
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomic<T: Serialize + ?Sized>(path: &Path, tmp: &Path, data: &T) -> anyhow::Result<()> {
    let file = File::create(tmp).with_context(|| format!("create temp: {}", tmp.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, data)
        .with_context(|| format!("serialize: {}", path.display()))?;
    w.flush()
        .with_context(|| format!("write temp: {}", tmp.display()))?;
    let file = w
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("write temp: {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("sync temp: {}", tmp.display()))?;
    drop(file);
    fs::rename(tmp, path)
        .with_context(|| format!("replace {} with {}", path.display(), tmp.display()))?;
    Ok(())
}
