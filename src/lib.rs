//! RfbView native framebuffer library.
//!
//! This crate decodes RFB screen updates (raw rectangles, solid fills and copy
//! rectangles in any true-colour server pixel format) into a canonical RGB
//! framebuffer, for a viewer whose protocol layer runs on the JVM.
//!
//! # Modules
//!
//! - `vnc`: the pixel-format decoding and framebuffer-compositing engine.
//! - `vnc_jni`: JNI bindings through which the Java viewer drives the engine.

pub mod vnc;
mod vnc_jni;

pub use vnc::engine::{Engine, FrameReader, Snapshot};
pub use vnc::error::{DecodeError, Result};
pub use vnc::events::ServerUpdate;
pub use vnc::framebuffer::Framebuffer;
pub use vnc::protocol::{PixelFormat, Point, Rect};
pub use vnc::registry::{Session, SessionId, SessionRegistry};
