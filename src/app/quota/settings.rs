//! Single-value settings files
//!
//! The search result cutoff and the download directory each live in their
//! own one-line text file in the home directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::constants::files;
use crate::errors::{QuotaError, QuotaResult};

fn read_value(path: &Path) -> QuotaResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let value = text.trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(QuotaError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn write_value(path: &Path, value: &str) -> QuotaResult<()> {
    let io_error = |source| QuotaError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir).map_err(io_error)?;
    let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
    writeln!(temp, "{}", value).map_err(io_error)?;
    temp.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

fn home_file(name: &str) -> QuotaResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(name))
        .ok_or(QuotaError::NoHomeDirectory)
}

/// Maximum number of results requested per search
#[derive(Debug, Clone)]
pub struct SearchLimitStore {
    path: PathBuf,
}

impl SearchLimitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_home() -> QuotaResult<Self> {
        Ok(Self::new(home_file(files::SEARCH_LIMIT_FILE_NAME)?))
    }

    /// Stored cutoff, 0 meaning unlimited
    ///
    /// A missing file or an unparseable value reads as 0.
    pub fn load(&self) -> QuotaResult<u32> {
        let Some(value) = read_value(&self.path)? else {
            return Ok(0);
        };
        match value.parse::<u32>() {
            Ok(limit) => Ok(limit),
            Err(_) => {
                warn!(
                    "Ignoring invalid search limit '{}' in {}",
                    value,
                    self.path.display()
                );
                Ok(0)
            }
        }
    }

    /// Stored cutoff as a search limit, `None` when unlimited
    pub fn load_limit(&self) -> QuotaResult<Option<u32>> {
        Ok(Some(self.load()?).filter(|limit| *limit > 0))
    }

    pub fn save(&self, limit: u32) -> QuotaResult<()> {
        write_value(&self.path, &limit.to_string())
    }
}

/// Directory that receives downloaded products
#[derive(Debug, Clone)]
pub struct DownloadDirStore {
    path: PathBuf,
    default_dir: PathBuf,
}

impl DownloadDirStore {
    pub fn new(path: impl Into<PathBuf>, default_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_dir: default_dir.into(),
        }
    }

    /// Store in the home directory, defaulting to `~/HDA_Downloads`
    pub fn in_home() -> QuotaResult<Self> {
        Ok(Self::new(
            home_file(files::DOWNLOAD_PATH_FILE_NAME)?,
            home_file(files::DEFAULT_DOWNLOAD_DIR)?,
        ))
    }

    pub fn load(&self) -> QuotaResult<PathBuf> {
        Ok(read_value(&self.path)?
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_dir.clone()))
    }

    /// Store a new download directory
    ///
    /// # Errors
    ///
    /// Returns `QuotaError::InvalidValue` for relative paths.
    pub fn save(&self, dir: &Path) -> QuotaResult<()> {
        if !dir.is_absolute() {
            return Err(QuotaError::InvalidValue {
                path: self.path.clone(),
                value: dir.display().to_string(),
            });
        }
        write_value(&self.path, &dir.to_string_lossy())
    }
}
