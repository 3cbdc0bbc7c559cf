//! Server update messages, as delivered by the protocol layer.

use bytes::Bytes;

use super::protocol::{PixelFormat, Point, Rect};

/// One parsed server-to-client message that changes the framebuffer.
///
/// The protocol layer builds one of these per message and hands it to
/// [`Engine::apply`](super::engine::Engine::apply), which dispatches to the
/// matching engine method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerUpdate {
    /// Initial geometry and native pixel format (ServerInit).
    ServerInit {
        width: u16,
        height: u16,
        desktop_name: String,
        format: PixelFormat,
    },
    /// Raw-encoded rectangle: `rect.area()` packed pixels, row-major.
    Raw { rect: Rect, pixels: Bytes },
    /// Solid fill with a single packed pixel.
    Fill { rect: Rect, pixel: Bytes },
    /// CopyRect: copy the region at `source` onto `dest`.
    Copy { dest: Rect, source: Point },
    /// DesktopSize pseudo-encoding: new framebuffer dimensions.
    DesktopResize { width: u16, height: u16 },
}

impl ServerUpdate {
    /// Short name of the update kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerUpdate::ServerInit { .. } => "server-init",
            ServerUpdate::Raw { .. } => "raw",
            ServerUpdate::Fill { .. } => "fill",
            ServerUpdate::Copy { .. } => "copy",
            ServerUpdate::DesktopResize { .. } => "desktop-resize",
        }
    }
}
