pub mod audio;
pub mod capability;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod probe;
pub mod source;
pub mod upload;

pub use engine::{FfmpegEngine, RenderEngine};
pub use error::{RenderError, Result};
pub use orchestrator::{BatchOptions, BatchRequest, Orchestrator};
