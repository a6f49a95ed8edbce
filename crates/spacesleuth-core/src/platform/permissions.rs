/// Access checks injected into the session.
///
/// A frontend that can ask the OS or the user for broader access (security
/// bookmarks, elevation prompts) implements [`AccessGate`]. The engine only
/// asks three questions and never persists anything itself.
use super::fs::FileSystem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait AccessGate: Send + Sync {
    /// Whether `path` can be read right now.
    fn can_access(&self, path: &Path) -> bool;

    /// Ask for access to `path`. Returns `true` if access was granted.
    fn request_access(&self, _path: &Path) -> bool {
        false
    }

    /// Whether the process has broad ("full disk") access.
    ///
    /// When a scan hits permission problems and this is `false`, the
    /// session raises its show-permission-prompt flag.
    fn has_full_access(&self) -> bool;
}

/// Grants everything. The default for sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl AccessGate for OpenGate {
    fn can_access(&self, _path: &Path) -> bool {
        true
    }

    fn request_access(&self, _path: &Path) -> bool {
        true
    }

    fn has_full_access(&self) -> bool {
        true
    }
}

/// Decides by trying to list directories.
///
/// `can_access` lists the requested path; `has_full_access` lists every
/// probe path (typically locations that only a fully-privileged process
/// can read).
pub struct ProbeGate {
    fs: Arc<dyn FileSystem>,
    probes: Vec<PathBuf>,
}

impl ProbeGate {
    pub fn new(fs: Arc<dyn FileSystem>, probes: Vec<PathBuf>) -> Self {
        Self { fs, probes }
    }
}

impl AccessGate for ProbeGate {
    fn can_access(&self, path: &Path) -> bool {
        self.fs.read_dir(path).is_ok()
    }

    fn has_full_access(&self) -> bool {
        self.probes.iter().all(|p| self.fs.read_dir(p).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryFileSystem;

    #[test]
    fn open_gate_allows_everything() {
        let gate = OpenGate;
        assert!(gate.can_access(Path::new("/anything")));
        assert!(gate.request_access(Path::new("/anything")));
        assert!(gate.has_full_access());
    }

    #[test]
    fn probe_gate_follows_listing_permissions() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_dir("/home/me").add_dir("/private/mail");
        fs.deny_list("/private/mail");

        let gate = ProbeGate::new(fs.clone(), vec![PathBuf::from("/private/mail")]);
        assert!(gate.can_access(Path::new("/home/me")));
        assert!(!gate.can_access(Path::new("/private/mail")));
        assert!(!gate.request_access(Path::new("/private/mail")));
        assert!(!gate.has_full_access());

        let relaxed = ProbeGate::new(fs, vec![PathBuf::from("/home/me")]);
        assert!(relaxed.has_full_access());
    }
}
