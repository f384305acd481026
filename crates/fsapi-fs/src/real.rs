use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FsError, FsResult};
use crate::traits::{validate_key, Filesystem};

/// Prefix of in-flight temporary files; `list` never reports them.
const TEMP_PREFIX: &str = ".fsapi-tmp-";

/// Filesystem backed by a directory on the host.
///
/// Each key is a file below `root`; `/` in a key maps to a subdirectory.
/// Writes go to a temporary file in the destination directory which is then
/// renamed over the target, so readers see either the old or the new file.
#[derive(Clone, Debug)]
pub struct RealFs {
    root: PathBuf,
}

impl RealFs {
    /// Use `root` as the base directory. It is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> FsResult<PathBuf> {
        validate_key(key)?;
        Ok(key
            .split('/')
            .fold(self.root.clone(), |path, component| path.join(component)))
    }
}

fn map_not_found(key: &str) -> impl FnOnce(io::Error) -> FsError + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::NotFound {
            FsError::NotFound(key.to_string())
        } else {
            FsError::Io(e)
        }
    }
}

impl Filesystem for RealFs {
    fn read(&self, key: &str) -> FsResult<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(map_not_found(key))
    }

    fn write(&self, key: &str, data: &[u8]) -> FsResult<()> {
        let path = self.path_for(key)?;
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)?;
        tmp.write_all(data)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| FsError::Io(e.error))?;

        debug!(path = %path.display(), bytes = data.len(), "file written");
        Ok(())
    }

    fn delete(&self, key: &str) -> FsResult<()> {
        let path = self.path_for(key)?;
        fs::remove_file(&path).map_err(map_not_found(key))
    }

    fn list(&self, prefix: &str) -> FsResult<Vec<String>> {
        // Only walk the deepest directory the prefix pins down.
        let start = match prefix.rfind('/') {
            Some(idx) => self.path_for(&prefix[..idx])?,
            None => self.root.clone(),
        };
        if !start.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&start) {
            let entry = entry.map_err(|e| {
                FsError::Io(e.into_io_error().unwrap_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "filesystem loop detected")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
