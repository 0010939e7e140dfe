use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `data` through a sibling tempfile, creating parents.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize `value` as YAML and write it atomically.
pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_yaml::to_string(value)?;
    atomic_write(path, data.as_bytes())
}

/// Read a YAML document, or `None` when the file does not exist.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_yaml::from_str(&data)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("projects/fx-dash/project.yaml");
        atomic_write(&path, b"id: one").unwrap();
        atomic_write(&path, b"id: two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id: two");
    }

    #[test]
    fn yaml_documents_survive_a_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.yaml");
        assert!(read_yaml::<BTreeMap<String, u32>>(&path).unwrap().is_none());

        let doc = BTreeMap::from([("max_turns".to_string(), 1u32)]);
        write_yaml(&path, &doc).unwrap();
        assert_eq!(read_yaml(&path).unwrap(), Some(doc));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.yaml");
        std::fs::write(&path, "max_turns: [unclosed").unwrap();
        assert!(read_yaml::<BTreeMap<String, u32>>(&path).is_err());
    }
}
