use std::path::{Path, PathBuf};

/// Opaque reference to an audio resource. The player and catalog adapters
/// know how to resolve it; the core only passes it around.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Locator(PathBuf);

impl Locator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Immutable description of one recorded item, produced by the catalog on
/// each scan. A rename shows up as a fresh value on the next scan.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioMetadata {
    pub media_id: String,
    pub locator: Locator,
    pub name: String,
    /// Creation time, seconds since the unix epoch.
    pub created_secs: u64,
    pub duration_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    Microphone,
}

/// Grant status for every permission the app cares about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermissionState {
    pub microphone: bool,
}

impl PermissionState {
    pub fn with(mut self, permission: PermissionKind, granted: bool) -> Self {
        match permission {
            PermissionKind::Microphone => self.microphone = granted,
        }
        self
    }

    pub fn is_granted(&self, permission: PermissionKind) -> bool {
        match permission {
            PermissionKind::Microphone => self.microphone,
        }
    }
}
