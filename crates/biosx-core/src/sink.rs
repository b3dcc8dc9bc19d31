//! Destinations for emitted leaf payloads.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

/// Receives `(name, type tag, bytes)` for every leaf the walker emits.
///
/// Names are `/`-separated relative paths. Errors are reported back to the
/// walker, which records them and carries on with the rest of the tree.
pub trait OutputSink {
    fn emit(&mut self, name: &str, tag: &str, bytes: &[u8]) -> io::Result<()>;
}

/// Writes each leaf to a file below a root directory.
///
/// A name that resolves to a path already written in this run gets a
/// `~N` suffix before its extension instead of replacing the earlier leaf.
pub struct DirSink {
    root: PathBuf,
    written: HashSet<PathBuf>,
}

impl DirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `name` below the root, dropping components that would escape it.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for component in Path::new(name).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }

    /// First of `path`, `stem~1.ext`, `stem~2.ext`, ... not yet written.
    fn unclaimed(&self, path: PathBuf) -> PathBuf {
        if !self.written.contains(&path) {
            return path;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
        (1..)
            .map(|n| {
                let file = match &ext {
                    Some(ext) => format!("{}~{}.{}", stem, n, ext),
                    None => format!("{}~{}", stem, n),
                };
                path.with_file_name(file)
            })
            .find(|candidate| !self.written.contains(candidate))
            .unwrap_or(path)
    }
}

impl OutputSink for DirSink {
    fn emit(&mut self, name: &str, tag: &str, bytes: &[u8]) -> io::Result<()> {
        let wanted = self.path_for(name);
        let path = self.unclaimed(wanted.clone());
        if path != wanted {
            warn!(name, path = %path.display(), "Leaf name already written, suffixing");
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), tag, len = bytes.len(), "Writing leaf");
        fs::write(&path, bytes)?;
        self.written.insert(path);
        Ok(())
    }
}

/// One leaf captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub name: String,
    pub tag: String,
    pub bytes: Vec<u8>,
}

/// Keeps every leaf in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub leaves: Vec<Emitted>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<&str> {
        self.leaves.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Emitted> {
        self.leaves.iter().find(|l| l.name == name)
    }
}

impl OutputSink for MemorySink {
    fn emit(&mut self, name: &str, tag: &str, bytes: &[u8]) -> io::Result<()> {
        self.leaves.push(Emitted {
            name: name.to_string(),
            tag: tag.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

/// Discards everything; used for listing-only runs.
pub struct NullSink;

impl OutputSink for NullSink {
    fn emit(&mut self, _name: &str, _tag: &str, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for_stays_below_root() {
        let sink = DirSink::new("/out");
        assert_eq!(sink.path_for("vol-00000000/a.raw"), Path::new("/out/vol-00000000/a.raw"));
        assert_eq!(sink.path_for("../../etc/passwd"), Path::new("/out/etc/passwd"));
        assert_eq!(sink.path_for("/abs/./x.bin"), Path::new("/out/abs/x.bin"));
    }

    #[test]
    fn test_dir_sink_writes_nested_files() {
        let root = std::env::temp_dir().join(format!("biosx-sink-{}", std::process::id()));
        let mut sink = DirSink::new(&root);
        sink.emit("vol-00000010/file.raw", "raw", b"abc").unwrap();
        assert_eq!(fs::read(root.join("vol-00000010/file.raw")).unwrap(), b"abc");
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_dir_sink_keeps_colliding_leaves() {
        let root = std::env::temp_dir().join(format!("biosx-collide-{}", std::process::id()));
        let mut sink = DirSink::new(&root);
        sink.emit("vol-00000000/Setup-0.raw", "raw", b"first").unwrap();
        sink.emit("vol-00000000/Setup-0.raw", "raw", b"second").unwrap();
        sink.emit("vol-00000000/Setup-0.raw", "raw", b"third").unwrap();
        sink.emit("vol-00000000/noext", "raw", b"a").unwrap();
        sink.emit("vol-00000000/noext", "raw", b"b").unwrap();
        let dir = root.join("vol-00000000");
        assert_eq!(fs::read(dir.join("Setup-0.raw")).unwrap(), b"first");
        assert_eq!(fs::read(dir.join("Setup-0~1.raw")).unwrap(), b"second");
        assert_eq!(fs::read(dir.join("Setup-0~2.raw")).unwrap(), b"third");
        assert_eq!(fs::read(dir.join("noext~1")).unwrap(), b"b");
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        sink.emit("b", "raw", b"2").unwrap();
        sink.emit("a", "pe32", b"1").unwrap();
        assert_eq!(sink.names(), vec!["b", "a"]);
        assert_eq!(sink.get("a").unwrap().tag, "pe32");
    }
}
