//! Core RFB framebuffer decoding implementation.
//!
//! This module turns the screen-update messages of a Remote Framebuffer (RFB)
//! session into a canonical RGB image that a renderer can display directly. The
//! protocol layer parses message framing and hands over already-extracted geometry
//! and payload bytes; nothing in here touches a socket.
//!
//! # Architecture
//!
//! - **`protocol`**: server pixel format and rectangle geometry
//! - **`translate`**: packed pixel words to canonical `0x00RRGGBB`
//! - **`framebuffer`**: the canonical image and the raw / fill / copy / resize operations
//! - **`engine`**: per-session writer and reader halves around one framebuffer
//! - **`events`**: server updates as a single tagged enum
//! - **`registry`**: sessions addressed by id
//! - **`error`**: decode errors
//!
//! # Features
//!
//! - **Any true-colour server format**: 8, 16 and 32 bpp, arbitrary channel shifts
//!   and maxima, either byte order
//! - **Copy Rectangle**: overlap-safe in-place region copies
//! - **Desktop Resize**: reallocation with a watch-channel notification for the renderer

pub mod engine;
pub mod error;
pub mod events;
pub mod framebuffer;
pub mod protocol;
pub mod registry;
pub mod translate;
