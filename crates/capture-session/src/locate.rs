//! Capture source detection
//!
//! The capture rig publishes its output on a shared drive reachable over
//! several links. Candidates are checked strictly in the order given, so the
//! list doubles as a preference: wired first, then the dedicated wireless
//! hotspot, then the shared network.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};

/// Existence check for a candidate source root
pub trait RootProbe {
    fn is_reachable(&self, root: &Path) -> bool;
}

/// Probe backed by the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl RootProbe for FsProbe {
    fn is_reachable(&self, root: &Path) -> bool {
        root.is_dir()
    }
}

/// Ordered list of candidate source roots
#[derive(Debug, Clone)]
pub struct SourceLocator {
    candidates: Vec<PathBuf>,
}

impl SourceLocator {
    pub fn new<I, P>(candidates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    /// Drive roots used by the capture rig: ethernet (W), hotspot (Y), home wifi (X)
    pub fn default_drives() -> Self {
        Self::new(["W:\\", "Y:\\", "X:\\"])
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Return the first reachable candidate according to `probe`
    pub fn locate_with<R: RootProbe>(&self, probe: &R) -> SessionResult<PathBuf> {
        for candidate in &self.candidates {
            if probe.is_reachable(candidate) {
                info!("Using capture source {}", candidate.display());
                return Ok(candidate.clone());
            }
            debug!("Capture source {} not reachable", candidate.display());
        }

        Err(SessionError::NoSourceFound {
            candidates: self
                .candidates
                .iter()
                .map(|c| c.display().to_string())
                .collect(),
        })
    }
}

/// Locate the capture source on the real filesystem
pub fn locate(candidates: &[PathBuf]) -> SessionResult<PathBuf> {
    SourceLocator::new(candidates.iter().cloned()).locate_with(&FsProbe)
}
