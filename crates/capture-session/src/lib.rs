//! Capture session plumbing for slowmo
//!
//! Everything that touches the shared capture drive, the local working area
//! or an external program lives here:
//!
//! - **locate**: pick the first reachable capture source from a priority list
//! - **stage**: wait for the capture to be published, copy it locally and
//!   convert raw frames to TIFF
//! - **decode**: raw frame decoding behind a scoped handle
//! - **encode**: the ffmpeg concat invocation
//! - **clean**: remove the working area and drain the source

pub mod clean;
pub mod decode;
pub mod encode;
pub mod error;
pub mod locate;
pub mod stage;

pub use clean::{drain_source, purge_working_area};
pub use decode::{DcrawDecoder, RawDecoder, RawHandle};
pub use encode::{output_fps, EncodeJob};
pub use error::{SessionError, SessionResult};
pub use locate::{locate, FsProbe, RootProbe, SourceLocator};
pub use stage::{await_ready, prepare_working_area, stage_and_convert, ReadyWait, StageReport};

/// File the capture device writes last; its presence means the session is complete
pub const MARKER_FILE: &str = "tstamps.csv";

/// Extension of the control log
pub const LOG_EXTENSION: &str = ".csv";

/// Extension of composite raw capture files
pub const RAW_EXTENSION: &str = ".all";

/// Length of the `.raw.all` suffix stripped from raw names to get the frame stem
pub const RAW_SUFFIX_LEN: usize = 8;

/// Manifest file written into the working area
pub const MANIFEST_FILE: &str = "ffmpeg_concats.txt";
