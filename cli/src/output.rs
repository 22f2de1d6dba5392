use std::io::Write;
use std::path::Path;

use anyhow::Context;
use tempfile::NamedTempFile;

/// Writes `content` to `path` through a temporary file in the same directory,
/// so readers never see a partial file.
pub fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Android.bp");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, "cc_binary {\n}\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "cc_binary {\n}\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_missing_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("Android.bp");
        assert!(write_atomic(&path, "").is_err());
    }
}
