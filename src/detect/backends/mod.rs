pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{ScriptedObject, StubSegmenter};

#[cfg(feature = "backend-tract")]
pub use tract::TractSegmenter;
