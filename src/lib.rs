//! PixelMe - turn a selfie into a pixel art portrait
//!
//! A hosted image model first isolates the subject of the photo, then
//! restyles the cut-out as pixel art. This library exposes modules for
//! integration testing.

pub mod api;
pub mod assets;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
