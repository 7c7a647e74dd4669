//! Cropping and text overlay. Every operation returns a new buffer.

pub mod blend;
pub mod crop;
pub mod overlay;
pub mod text;
