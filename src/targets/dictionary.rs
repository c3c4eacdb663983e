use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use serde::Serialize;
use crate::errors::EngineError;

const BUILTIN_DIRECTORIES: &str = include_str!("../../assets/dicts/directories.txt");
const BUILTIN_USERNAMES: &str = include_str!("../../assets/dicts/usernames.txt");
const BUILTIN_PASSWORDS: &str = include_str!("../../assets/dicts/passwords.txt");

/// Placeholder in directory wordlists replaced by each configured extension.
pub const EXT_PLACEHOLDER: &str = "%EXT%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryKind {
    Directories,
    Usernames,
    Passwords,
}

impl DictionaryKind {
    pub fn builtin(&self) -> Arc<[String]> {
        let raw = match self {
            Self::Directories => BUILTIN_DIRECTORIES,
            Self::Usernames => BUILTIN_USERNAMES,
            Self::Passwords => BUILTIN_PASSWORDS,
        };
        parse_lines(raw).into()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DictionaryInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
}

/// Resolves a dictionary reference to its lines.
#[async_trait]
pub trait DictionarySource: Send + Sync {
    /// `None`, an empty string or `"default"` select the built-in list.
    async fn load(&self, name: Option<&str>, kind: DictionaryKind) -> Result<Arc<[String]>, EngineError>;

    async fn list(&self) -> Vec<DictionaryInfo> {
        Vec::new()
    }
}

/// Reads dictionaries from disk. Relative paths resolve against `dir` first.
#[derive(Debug, Clone, Default)]
pub struct FileDictionaries {
    dir: Option<PathBuf>,
}

impl FileDictionaries {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        if let Some(dir) = &self.dir {
            let candidate = dir.join(path);
            if candidate.exists() {
                return candidate;
            }
        }
        path.to_path_buf()
    }
}

#[async_trait]
impl DictionarySource for FileDictionaries {
    async fn load(&self, name: Option<&str>, kind: DictionaryKind) -> Result<Arc<[String]>, EngineError> {
        let name = match name.map(str::trim) {
            None | Some("") => return Ok(kind.builtin()),
            Some(n) if n.eq_ignore_ascii_case("default") => return Ok(kind.builtin()),
            Some(n) => n,
        };

        let path = self.resolve(name);
        let raw = tokio::fs::read(&path).await.map_err(|e| {
            EngineError::Config(format!("Cannot read dictionary {}: {}", path.display(), e))
        })?;
        // Wordlists are often Latin-1; undecodable bytes must not sink the job
        let lines = parse_lines(&String::from_utf8_lossy(&raw));
        if lines.is_empty() {
            return Err(EngineError::Config(format!("Dictionary {} is empty", path.display())));
        }
        Ok(lines.into())
    }

    async fn list(&self) -> Vec<DictionaryInfo> {
        let Some(dir) = &self.dir else {
            return Vec::new();
        };
        let pattern = dir.join("*.txt");
        let Ok(paths) = glob::glob(&pattern.to_string_lossy()) else {
            return Vec::new();
        };

        let mut dicts: Vec<DictionaryInfo> = paths
            .flatten()
            .filter_map(|path| {
                let meta = std::fs::metadata(&path).ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some(DictionaryInfo {
                    name: path.file_name()?.to_string_lossy().into_owned(),
                    path: path.to_string_lossy().into_owned(),
                    size: meta.len(),
                })
            })
            .collect();
        dicts.sort_by(|a, b| a.name.cmp(&b.name));
        dicts
    }
}

/// Trimmed non-empty lines, `#` comments skipped.
pub fn parse_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Expand `%EXT%` entries once per extension. Entries without it pass through.
pub fn expand_extensions(lines: &[String], extensions: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        if line.contains(EXT_PLACEHOLDER) {
            for ext in extensions {
                out.push(line.replace(EXT_PLACEHOLDER, ext.trim_start_matches('.')));
            }
        } else {
            out.push(line.clone());
        }
    }
    dedup_preserving_order(out)
}

/// Configured entries first, then built-in ones not already present.
pub fn merge_with_builtin(primary: &[String], builtin: &[String]) -> Arc<[String]> {
    dedup_preserving_order(primary.iter().chain(builtin.iter()).cloned()).into()
}

fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}
