//! StoryReel Core Engine
//!
//! Frame analysis, caption layout and rendering, segment encoding and final
//! assembly for narrated story videos.

pub mod analysis;
pub mod captions;
pub mod ffmpeg;
pub mod fs;
pub mod generative;
pub mod render;
pub mod settings;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
