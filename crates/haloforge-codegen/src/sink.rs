//! Artifact sinks.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::info;

use crate::error::Result;
use crate::render::RenderedFile;

/// Destination for generated files.
pub trait ArtifactSink {
    /// Write one file.
    fn write_file(&self, name: &str, content: &str) -> Result<()>;
}

/// Writes files into a directory, creating it on first write.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Create a sink rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactSink for DirectorySink {
    fn write_file(&self, name: &str, content: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(name);
        fs::write(&path, content)?;
        info!(path = %path.display(), bytes = content.len(), "wrote artifact");
        Ok(())
    }
}

/// Keeps files in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names and contents written so far, ordered by name.
    pub fn files(&self) -> BTreeMap<String, String> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Content of one file.
    pub fn get(&self, name: &str) -> Option<String> {
        self.files.lock().ok().and_then(|f| f.get(name).cloned())
    }

    /// Check if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.files.lock().map(|f| f.is_empty()).unwrap_or(true)
    }
}

impl ArtifactSink for MemorySink {
    fn write_file(&self, name: &str, content: &str) -> Result<()> {
        if let Ok(mut files) = self.files.lock() {
            files.insert(name.to_string(), content.to_string());
        }
        Ok(())
    }
}

/// Write already rendered files to `sink`.
///
/// Take the output of a render call as a whole so a failing generator never
/// reaches the sink.
pub fn emit_all(sink: &dyn ArtifactSink, files: &[RenderedFile]) -> Result<Vec<String>> {
    for file in files {
        sink.write_file(&file.name, &file.content)?;
    }
    Ok(files.iter().map(|f| f.name.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        let names = emit_all(
            &sink,
            &[
                RenderedFile::new("A.h", "// a"),
                RenderedFile::new("A.cpp", "// b"),
            ],
        )
        .unwrap();
        assert_eq!(names, vec!["A.h", "A.cpp"]);
        assert_eq!(sink.get("A.h").as_deref(), Some("// a"));
        assert_eq!(sink.files().len(), 2);
    }

    #[test]
    fn test_directory_sink() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("generated");
        let sink = DirectorySink::new(&out);
        sink.write_file("P.h", "#pragma once\n").unwrap();
        assert_eq!(fs::read_to_string(out.join("P.h")).unwrap(), "#pragma once\n");
        assert_eq!(sink.root(), out.as_path());
    }
}
