//! Raw frame decoding
//!
//! Decoding goes through a handle that may keep the source file open (the
//! default decoder runs `dcraw` as a child process reading the staged file).
//! Dropping the handle releases it, so callers scope one handle per frame and
//! the working area can always be deleted afterwards.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use image::{ImageFormat, ImageReader, RgbImage};
use tracing::debug;

use crate::error::{SessionError, SessionResult};

/// An opened raw file, ready to be developed into RGB
pub trait RawHandle {
    fn postprocess(&mut self) -> SessionResult<RgbImage>;
}

/// Opens raw capture files for decoding
pub trait RawDecoder {
    type Handle: RawHandle;

    fn open(&self, path: &Path) -> SessionResult<Self::Handle>;
}

/// Decoder that develops raw files with dcraw, reading the PPM it writes to stdout
#[derive(Debug, Clone)]
pub struct DcrawDecoder {
    program: PathBuf,
}

impl DcrawDecoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Develop with dcraw's defaults and write the PPM to stdout
    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-c").arg(path);
        command
    }
}

impl Default for DcrawDecoder {
    fn default() -> Self {
        Self::new("dcraw")
    }
}

impl RawDecoder for DcrawDecoder {
    type Handle = DcrawHandle;

    fn open(&self, path: &Path) -> SessionResult<DcrawHandle> {
        let child = self
            .command(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SessionError::decode(path, format!("failed to run {}: {}", self.program.display(), e))
            })?;

        Ok(DcrawHandle {
            child: Some(child),
            path: path.to_path_buf(),
        })
    }
}

/// A running dcraw process bound to one raw file
pub struct DcrawHandle {
    child: Option<Child>,
    path: PathBuf,
}

impl RawHandle for DcrawHandle {
    fn postprocess(&mut self) -> SessionResult<RgbImage> {
        let child = self
            .child
            .take()
            .ok_or_else(|| SessionError::decode(&self.path, "handle already consumed"))?;

        let output = child
            .wait_with_output()
            .map_err(|e| SessionError::decode(&self.path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SessionError::decode(
                &self.path,
                format!("dcraw exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        if output.stdout.is_empty() {
            return Err(SessionError::decode(&self.path, "dcraw produced no image data"));
        }

        let image = ImageReader::with_format(Cursor::new(&output.stdout), ImageFormat::Pnm)
            .decode()
            .map_err(|e| SessionError::decode(&self.path, e))?;

        debug!(
            "Decoded {} ({}x{})",
            self.path.display(),
            image.width(),
            image.height()
        );
        Ok(image.to_rgb8())
    }
}

impl Drop for DcrawHandle {
    fn drop(&mut self) {
        // A handle dropped before postprocess still owns a running dcraw
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
