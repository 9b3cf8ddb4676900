use crate::error::AgentError;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key to string persistence, the shape of a browser's local storage.
pub trait StorageBackend: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, AgentError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AgentError>;
    fn remove(&self, key: &str) -> Result<(), AgentError>;
}

/// One file per key. Writes go through a temp file and a rename so a crash
/// never leaves a half-written queue behind.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(AgentError::storage)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, AgentError> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AgentError::storage(err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AgentError> {
        let target = self.path(key);
        let temp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&temp, value).map_err(AgentError::storage)?;
        fs::rename(&temp, &target).map_err(AgentError::storage)
    }

    fn remove(&self, key: &str) -> Result<(), AgentError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AgentError::storage(err)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, AgentError> {
        let entries = self.entries.lock().map_err(AgentError::storage)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AgentError> {
        let mut entries = self.entries.lock().map_err(AgentError::storage)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AgentError> {
        let mut entries = self.entries.lock().map_err(AgentError::storage)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_backend_round_trips_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("agent")).unwrap();
        assert_eq!(backend.get("queue").unwrap(), None);

        backend.set("queue", "[1]").unwrap();
        backend.set("queue", "[1,2]").unwrap();
        assert_eq!(backend.get("queue").unwrap().as_deref(), Some("[1,2]"));

        let names: Vec<_> = fs::read_dir(backend.dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["queue.json".to_string()]);

        backend.remove("queue").unwrap();
        backend.remove("queue").unwrap();
        assert_eq!(backend.get("queue").unwrap(), None);
    }

    #[test]
    fn memory_backend_behaves_like_a_map() {
        let backend = MemoryBackend::new();
        backend.set("a", "1").unwrap();
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("1"));
        backend.remove("a").unwrap();
        assert_eq!(backend.get("a").unwrap(), None);
    }
}
