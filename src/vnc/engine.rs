//! Per-session framebuffer engine.
//!
//! [`Engine::new`] returns two halves that share one framebuffer:
//!
//! - **[`Engine`]**: the writer, driven by the protocol layer with one call per
//!   parsed server message. It takes `&mut self`, so a session has exactly one
//!   writer and updates apply in the order they are delivered.
//! - **[`FrameReader`]**: the renderer side. It copies the current image out under
//!   a read lock and observes desktop resizes through a single-slot watch channel.
//!
//! # Example Flow
//!
//! ```
//! use rfbview_framebuffer::{Engine, PixelFormat, Rect};
//!
//! let (mut engine, mut reader) = Engine::new();
//! engine.on_server_init(4, 4, "desktop", PixelFormat::rgb565()).unwrap();
//! engine.on_framebuffer_update_fill(Rect::new(0, 0, 2, 2), &0xF800u16.to_le_bytes()).unwrap();
//!
//! let snapshot = reader.snapshot().unwrap();
//! assert_eq!(snapshot.rgb(1, 1), Some((255, 0, 0)));
//!
//! engine.on_desktop_resize(8, 6).unwrap();
//! assert!(reader.was_resized());
//! assert_eq!(reader.acknowledge_resize(), (8, 6));
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, info, trace, warn};
use tokio::sync::watch;

use super::error::{DecodeError, Result};
use super::events::ServerUpdate;
use super::framebuffer::Framebuffer;
use super::protocol::{PixelFormat, Point, Rect};
use super::translate;

type SharedFramebuffer = Arc<RwLock<Option<Framebuffer>>>;

/// Writer half of a session's framebuffer.
#[derive(Debug)]
pub struct Engine {
    framebuffer: SharedFramebuffer,
    resized_tx: watch::Sender<(u16, u16)>,
}

/// Renderer half of a session's framebuffer.
#[derive(Debug, Clone)]
pub struct FrameReader {
    framebuffer: SharedFramebuffer,
    resized_rx: watch::Receiver<(u16, u16)>,
}

/// A copy of the framebuffer taken for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u16,
    pub height: u16,
    /// Row-major `0x00RRGGBB` pixels.
    pub pixels: Vec<u32>,
}

impl Engine {
    /// Creates an uninitialized engine and the reader for its framebuffer.
    pub fn new() -> (Self, FrameReader) {
        let framebuffer: SharedFramebuffer = Arc::new(RwLock::new(None));
        let (resized_tx, resized_rx) = watch::channel((0, 0));
        let reader = FrameReader {
            framebuffer: framebuffer.clone(),
            resized_rx,
        };
        (Self { framebuffer, resized_tx }, reader)
    }

    /// Creates another reader for this session.
    ///
    /// The new reader treats the current dimensions as already acknowledged.
    pub fn reader(&self) -> FrameReader {
        FrameReader {
            framebuffer: self.framebuffer.clone(),
            resized_rx: self.resized_tx.subscribe(),
        }
    }

    /// Whether the server-init pixel format has been registered.
    pub fn is_initialized(&self) -> bool {
        self.framebuffer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn with_framebuffer<T>(&mut self, op: impl FnOnce(&mut Framebuffer) -> Result<T>) -> Result<T> {
        let mut guard = self.framebuffer.write().unwrap_or_else(PoisonError::into_inner);
        let framebuffer = guard.as_mut().ok_or(DecodeError::NotInitialized)?;
        op(framebuffer)
    }

    /// Registers the server's pixel format and allocates a black framebuffer.
    ///
    /// A repeated server-init replaces the framebuffer; if its geometry differs
    /// from the previous one, readers are notified as for a resize.
    pub fn on_server_init(
        &mut self,
        width: u16,
        height: u16,
        desktop_name: impl Into<String>,
        format: PixelFormat,
    ) -> Result<()> {
        let framebuffer = Framebuffer::new(format, width, height, desktop_name)?;
        info!("Server init: {}", framebuffer);

        let previous = self
            .framebuffer
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(framebuffer);

        if let Some(previous) = previous {
            if (previous.width(), previous.height()) != (width, height) {
                debug!(
                    "Server init replaced {}x{} framebuffer with {}x{}",
                    previous.width(),
                    previous.height(),
                    width,
                    height
                );
                self.resized_tx.send_replace((width, height));
            }
        }
        Ok(())
    }

    /// Decodes a raw rectangle of packed pixels into the framebuffer.
    pub fn on_framebuffer_update_raw(&mut self, rect: Rect, pixels: &[u8]) -> Result<()> {
        trace!("Raw update {} ({} bytes)", rect, pixels.len());
        self.with_framebuffer(|fb| fb.blit_rectangle(rect, pixels))
    }

    /// Fills a rectangle with one packed pixel.
    pub fn on_framebuffer_update_fill(&mut self, rect: Rect, pixel: &[u8]) -> Result<()> {
        trace!("Fill update {}", rect);
        self.with_framebuffer(|fb| fb.fill_rectangle(rect, pixel))
    }

    /// Copies the region at `source` onto `dest`.
    pub fn on_framebuffer_update_copy(&mut self, dest: Rect, source: Point) -> Result<()> {
        trace!("Copy update {} from ({},{})", dest, source.x, source.y);
        self.with_framebuffer(|fb| fb.copy_rectangle(dest, source))
    }

    /// Reallocates the framebuffer at the new size and notifies readers.
    pub fn on_desktop_resize(&mut self, width: u16, height: u16) -> Result<()> {
        self.with_framebuffer(|fb| {
            fb.resize(width, height);
            Ok(())
        })?;
        info!("Desktop resized to {}x{}", width, height);
        self.resized_tx.send_replace((width, height));
        Ok(())
    }

    /// Dispatches one server update to the matching handler.
    pub fn apply(&mut self, update: ServerUpdate) -> Result<()> {
        let kind = update.kind();
        let result = match update {
            ServerUpdate::ServerInit { width, height, desktop_name, format } => {
                self.on_server_init(width, height, desktop_name, format)
            }
            ServerUpdate::Raw { rect, pixels } => self.on_framebuffer_update_raw(rect, &pixels),
            ServerUpdate::Fill { rect, pixel } => self.on_framebuffer_update_fill(rect, &pixel),
            ServerUpdate::Copy { dest, source } => self.on_framebuffer_update_copy(dest, source),
            ServerUpdate::DesktopResize { width, height } => self.on_desktop_resize(width, height),
        };
        if let Err(e) = &result {
            warn!("Rejected {} update: {}", kind, e);
        }
        result
    }
}

impl FrameReader {
    /// Copies the current framebuffer out, or `None` before server-init.
    pub fn snapshot(&self) -> Option<Snapshot> {
        let guard = self.framebuffer.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|fb| Snapshot {
            width: fb.width(),
            height: fb.height(),
            pixels: fb.pixels().to_vec(),
        })
    }

    /// Current dimensions, or `None` before server-init.
    pub fn dimensions(&self) -> Option<(u16, u16)> {
        let guard = self.framebuffer.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().map(|fb| (fb.width(), fb.height()))
    }

    /// Whether a resize has happened that this reader has not acknowledged.
    pub fn was_resized(&self) -> bool {
        self.resized_rx.has_changed().unwrap_or(false)
    }

    /// Marks the latest resize as seen and returns its dimensions.
    pub fn acknowledge_resize(&mut self) -> (u16, u16) {
        *self.resized_rx.borrow_and_update()
    }

    /// Waits for the next unacknowledged resize and acknowledges it.
    ///
    /// Returns `SessionClosed` once the engine has been dropped.
    pub async fn resized(&mut self) -> Result<(u16, u16)> {
        self.resized_rx
            .changed()
            .await
            .map_err(|_| DecodeError::SessionClosed)?;
        Ok(*self.resized_rx.borrow_and_update())
    }
}

impl Snapshot {
    /// The `(r, g, b)` triple at `(x, y)`, if in bounds.
    pub fn rgb(&self, x: u16, y: u16) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = usize::from(y) * usize::from(self.width) + usize::from(x);
        self.pixels.get(index).copied().map(translate::rgb_components)
    }

    /// Packs the image as tightly packed `R, G, B` bytes, row-major.
    pub fn to_rgb24(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.pixels.len() * 3);
        for &pixel in &self.pixels {
            let (r, g, b) = translate::rgb_components(pixel);
            buf.put_u8(r);
            buf.put_u8(g);
            buf.put_u8(b);
        }
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initialized() -> (Engine, FrameReader) {
        let (mut engine, reader) = Engine::new();
        engine.on_server_init(4, 4, "test desktop", PixelFormat::rgb565()).unwrap();
        (engine, reader)
    }

    #[test_log::test]
    fn updates_before_server_init_fail_fast() {
        let (mut engine, reader) = Engine::new();
        let rect = Rect::new(0, 0, 1, 1);
        assert_eq!(
            engine.on_framebuffer_update_raw(rect, &[0, 0]),
            Err(DecodeError::NotInitialized)
        );
        assert_eq!(
            engine.on_framebuffer_update_fill(rect, &[0, 0]),
            Err(DecodeError::NotInitialized)
        );
        assert_eq!(
            engine.on_framebuffer_update_copy(rect, Point::new(0, 0)),
            Err(DecodeError::NotInitialized)
        );
        assert_eq!(engine.on_desktop_resize(2, 2), Err(DecodeError::NotInitialized));
        assert!(!engine.is_initialized());
        assert!(reader.snapshot().is_none());
        assert!(!reader.was_resized());
    }

    #[test_log::test]
    fn resize_notifies_until_acknowledged() {
        let (mut engine, mut reader) = initialized();
        engine
            .on_framebuffer_update_fill(Rect::new(0, 0, 4, 4), &0xFFFFu16.to_le_bytes())
            .unwrap();
        assert!(!reader.was_resized());

        engine.on_desktop_resize(6, 2).unwrap();
        assert!(reader.was_resized());
        assert!(reader.was_resized());

        let snapshot = reader.snapshot().unwrap();
        assert_eq!((snapshot.width, snapshot.height), (6, 2));
        assert!(snapshot.pixels.iter().all(|&p| p == translate::BACKGROUND));

        assert_eq!(reader.acknowledge_resize(), (6, 2));
        assert!(!reader.was_resized());
    }

    #[test_log::test]
    fn repeated_server_init_with_new_geometry_notifies() {
        let (mut engine, reader) = initialized();
        engine.on_server_init(4, 4, "same", PixelFormat::rgb565()).unwrap();
        assert!(!reader.was_resized());
        engine.on_server_init(8, 4, "bigger", PixelFormat::rgb888()).unwrap();
        assert!(reader.was_resized());
        assert_eq!(reader.dimensions(), Some((8, 4)));
    }

    #[test_log::test]
    fn late_reader_starts_acknowledged() {
        let (mut engine, original) = initialized();
        engine.on_desktop_resize(5, 3).unwrap();

        let late = engine.reader();
        assert!(original.was_resized());
        assert!(!late.was_resized());
        assert_eq!(late.dimensions(), Some((5, 3)));

        engine.on_desktop_resize(2, 2).unwrap();
        assert!(late.was_resized());
        assert_eq!(late.snapshot().unwrap().pixels.len(), 4);
    }

    #[test_log::test]
    fn apply_dispatches_by_variant() {
        let (mut engine, reader) = Engine::new();
        engine
            .apply(ServerUpdate::ServerInit {
                width: 3,
                height: 1,
                desktop_name: "apply".to_string(),
                format: PixelFormat::rgb888(),
            })
            .unwrap();
        engine
            .apply(ServerUpdate::Raw {
                rect: Rect::new(0, 0, 1, 1),
                pixels: Bytes::from_static(&[0x00, 0x00, 0xFF, 0x00]),
            })
            .unwrap();
        engine
            .apply(ServerUpdate::Copy { dest: Rect::new(2, 0, 1, 1), source: Point::new(0, 0) })
            .unwrap();
        let err = engine
            .apply(ServerUpdate::Fill { rect: Rect::new(2, 0, 2, 1), pixel: Bytes::from_static(&[0; 4]) })
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidRectangle(_)));

        let snapshot = reader.snapshot().unwrap();
        assert_eq!(snapshot.rgb(0, 0), Some((255, 0, 0)));
        assert_eq!(snapshot.rgb(1, 0), Some((0, 0, 0)));
        assert_eq!(snapshot.rgb(2, 0), Some((255, 0, 0)));
    }

    #[test]
    fn snapshot_packs_rgb24() {
        let (mut engine, reader) = initialized();
        engine.on_desktop_resize(2, 1).unwrap();
        engine
            .on_framebuffer_update_raw(Rect::new(0, 0, 2, 1), &[0x00, 0xF8, 0x1F, 0x00])
            .unwrap();
        let rgb24 = reader.snapshot().unwrap().to_rgb24();
        assert_eq!(&rgb24[..], &[255, 0, 0, 0, 0, 255]);
    }

    #[test_log::test(tokio::test)]
    async fn resized_wakes_an_async_reader() {
        let (mut engine, mut reader) = initialized();
        let waiter = tokio::spawn(async move { reader.resized().await });
        engine.on_desktop_resize(10, 20).unwrap();
        assert_eq!(waiter.await.unwrap(), Ok((10, 20)));
    }

    #[tokio::test]
    async fn resized_reports_closed_session() {
        let (engine, mut reader) = initialized();
        drop(engine);
        assert_eq!(reader.resized().await, Err(DecodeError::SessionClosed));
    }
}
