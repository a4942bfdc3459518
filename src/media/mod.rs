//! Media derivatives
//!
//! - `traits` - The transcoder seam
//! - `ffmpeg` - ffmpeg/ffprobe implementation
//! - `derivative` - Idempotent thumbnail and preview generation

pub mod derivative;
pub mod ffmpeg;
pub mod traits;

pub use derivative::DerivativeGenerator;
pub use ffmpeg::FfmpegTool;
pub use traits::MediaTool;
