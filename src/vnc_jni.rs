//! JNI bindings for the framebuffer engine, allowing it to be driven from a Java/Android viewer.
//!
//! The Java protocol layer parses RFB messages itself and forwards each screen update
//! here, one call per message, tagged with the session id returned by
//! `nativeCreateSession`. The renderer side polls the resize flag and copies the
//! framebuffer out as an `int[]` of `0x00RRGGBB` pixels.

use jni::JNIEnv;
use jni::objects::{JByteArray, JClass, JString};
use jni::sys::{jboolean, jint, jintArray, jlong, JNI_FALSE, JNI_TRUE};
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use std::sync::Mutex;

use crate::vnc::error::{DecodeError, Result};
use crate::vnc::protocol::{PixelFormat, Point, Rect};
use crate::vnc::registry::{Session, SessionId, SessionRegistry};

/// Global registry of viewer sessions.
static SESSIONS: OnceCell<Mutex<SessionRegistry>> = OnceCell::new();

/// Status returned to Java for a successfully applied update.
const STATUS_OK: jint = 0;
/// Status returned to Java when its arguments could not be read through JNI.
const STATUS_JNI_ERROR: jint = -1;

// Desktop size limits accepted from Java
const MAX_DIMENSION: i32 = 8192;
const MIN_DIMENSION: i32 = 1;

/// Initializes or retrieves the global session registry.
fn get_or_init_sessions() -> &'static Mutex<SessionRegistry> {
    SESSIONS.get_or_init(|| Mutex::new(SessionRegistry::new()))
}

/// Runs `op` with the session registry locked.
///
/// Keep `op` to registry bookkeeping; decoding happens on a [`Session`] handle after
/// the lock is released. A poisoned lock is recovered.
fn with_sessions<T>(op: impl FnOnce(&mut SessionRegistry) -> T) -> T {
    let mut guard = get_or_init_sessions().lock().unwrap_or_else(|poisoned| {
        error!("Session registry lock poisoned, recovering");
        poisoned.into_inner()
    });
    op(&mut guard)
}

/// Converts an engine result into the status code handed back to Java.
fn to_status(session: jlong, result: Result<()>) -> jint {
    match result {
        Ok(()) => STATUS_OK,
        Err(e) => {
            warn!("Session {}: {}", session, e);
            e.status_code()
        }
    }
}

/// Validates a desktop dimension coming from Java.
fn checked_dimension(value: jint, what: &str) -> Result<u16> {
    match u16::try_from(value) {
        Ok(v) if (MIN_DIMENSION..=MAX_DIMENSION).contains(&value) => Ok(v),
        _ => Err(DecodeError::InvalidRectangle(format!(
            "invalid {}: {} (must be {}-{})",
            what, value, MIN_DIMENSION, MAX_DIMENSION
        ))),
    }
}

/// Validates a single rectangle coordinate or extent coming from Java.
fn checked_coordinate(value: jint, what: &str) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| DecodeError::InvalidRectangle(format!("invalid {}: {}", what, value)))
}

fn checked_rect(x: jint, y: jint, width: jint, height: jint) -> Result<Rect> {
    Ok(Rect::new(
        checked_coordinate(x, "x")?,
        checked_coordinate(y, "y")?,
        checked_coordinate(width, "width")?,
        checked_coordinate(height, "height")?,
    ))
}

fn session_id(id: jlong) -> SessionId {
    id as SessionId
}

/// Unwraps a Java argument read, logging the failure and mapping it to `STATUS_JNI_ERROR`.
fn read_arg<T>(what: &str, read: jni::errors::Result<T>) -> std::result::Result<T, jint> {
    read.map_err(|e| {
        error!("Failed to read {}: {}", what, e);
        STATUS_JNI_ERROR
    })
}

/// Looks up a session and returns its handle with the registry lock already released.
fn session_handle(session: jlong) -> Result<Session> {
    with_sessions(|sessions| sessions.get(session_id(session)))
}

/// JNI entry point to initialize the native framebuffer library.
///
/// This function should be called once when the viewer starts. It installs the Android
/// logger and creates the session registry.
///
/// # Arguments
///
/// * `_env` - The JNI environment.
/// * `_class` - The Java class from which this method is called.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeInit(
    _env: JNIEnv,
    _class: JClass,
) {
    // Initialize Android logger first so we can see logs
    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("RfbView-Rust"),
    );

    get_or_init_sessions();
    info!("Native framebuffer library initialized");
}

/// JNI entry point to create a new viewer session.
///
/// The session has no framebuffer until `nativeOnServerInit` is called for it.
///
/// # Returns
///
/// The new session id. Ids start at 1.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeCreateSession(
    _env: JNIEnv,
    _class: JClass,
) -> jlong {
    with_sessions(|sessions| sessions.create() as jlong)
}

/// JNI entry point to end a viewer session and free its framebuffer.
///
/// # Arguments
///
/// * `session` - The session id returned by `nativeCreateSession`.
///
/// # Returns
///
/// `JNI_TRUE` if the session existed, `JNI_FALSE` otherwise.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeDestroySession(
    _env: JNIEnv,
    _class: JClass,
    session: jlong,
) -> jboolean {
    match with_sessions(|sessions| sessions.remove(session_id(session))) {
        Ok(_) => JNI_TRUE,
        Err(e) => {
            warn!("Failed to destroy session {}: {}", session, e);
            JNI_FALSE
        }
    }
}

/// JNI entry point for the ServerInit message.
///
/// Registers the server's native pixel format and allocates a black framebuffer.
///
/// # Arguments
///
/// * `env` - The JNI environment.
/// * `_class` - The Java class from which this method is called.
/// * `session` - The session id.
/// * `width` - The desktop width.
/// * `height` - The desktop height.
/// * `desktop_name` - The desktop name reported by the server.
/// * `pixel_format` - The 16-byte RFB `PIXEL_FORMAT` record from ServerInit.
///
/// # Returns
///
/// `0` on success, `-1` if the arguments could not be read, otherwise the error's status code.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeOnServerInit(
    mut env: JNIEnv,
    _class: JClass,
    session: jlong,
    width: jint,
    height: jint,
    desktop_name: JString,
    pixel_format: JByteArray,
) -> jint {
    let desktop_name_str: String = match read_arg("desktop name", env.get_string(&desktop_name)) {
        Ok(s) => s.into(),
        Err(status) => return status,
    };
    let format_bytes = match read_arg("pixel format", env.convert_byte_array(&pixel_format)) {
        Ok(bytes) => bytes,
        Err(status) => return status,
    };

    let result = (|| -> Result<()> {
        let width = checked_dimension(width, "width")?;
        let height = checked_dimension(height, "height")?;
        let format = PixelFormat::from_bytes(&format_bytes)?;
        session_handle(session)?
            .engine()
            .on_server_init(width, height, desktop_name_str, format)
    })();

    to_status(session, result)
}

/// JNI entry point for a raw-encoded rectangle.
///
/// # Arguments
///
/// * `env` - The JNI environment.
/// * `_class` - The Java class from which this method is called.
/// * `session` - The session id.
/// * `x`, `y`, `width`, `height` - The rectangle being updated.
/// * `pixels` - `width * height` packed pixels in the server's format, row-major.
///
/// # Returns
///
/// `0` on success, `-1` if the arguments could not be read, otherwise the error's status code.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeOnFramebufferUpdateRaw(
    env: JNIEnv,
    _class: JClass,
    session: jlong,
    x: jint,
    y: jint,
    width: jint,
    height: jint,
    pixels: JByteArray,
) -> jint {
    // Copy the Java array out before taking any lock
    let pixel_data = match read_arg("raw pixel data", env.convert_byte_array(&pixels)) {
        Ok(bytes) => bytes,
        Err(status) => return status,
    };

    let result = checked_rect(x, y, width, height).and_then(|rect| {
        session_handle(session)?
            .engine()
            .on_framebuffer_update_raw(rect, &pixel_data)
    });

    to_status(session, result)
}

/// JNI entry point for a solid-colour fill.
///
/// # Arguments
///
/// * `session` - The session id.
/// * `x`, `y`, `width`, `height` - The rectangle being filled.
/// * `pixel` - One packed pixel in the server's format and byte order.
///
/// # Returns
///
/// `0` on success, `-1` if the arguments could not be read, otherwise the error's status code.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeOnFramebufferUpdateFill(
    env: JNIEnv,
    _class: JClass,
    session: jlong,
    x: jint,
    y: jint,
    width: jint,
    height: jint,
    pixel: JByteArray,
) -> jint {
    let pixel_data = match read_arg("fill pixel", env.convert_byte_array(&pixel)) {
        Ok(bytes) => bytes,
        Err(status) => return status,
    };

    let result = checked_rect(x, y, width, height).and_then(|rect| {
        session_handle(session)?
            .engine()
            .on_framebuffer_update_fill(rect, &pixel_data)
    });

    to_status(session, result)
}

/// JNI entry point for a CopyRect update.
///
/// # Arguments
///
/// * `session` - The session id.
/// * `x`, `y`, `width`, `height` - The destination rectangle.
/// * `src_x`, `src_y` - The top-left corner of the source region.
///
/// # Returns
///
/// `0` on success, `-1` if the arguments could not be read, otherwise the error's status code.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeOnFramebufferUpdateCopy(
    _env: JNIEnv,
    _class: JClass,
    session: jlong,
    x: jint,
    y: jint,
    width: jint,
    height: jint,
    src_x: jint,
    src_y: jint,
) -> jint {
    let result = (|| -> Result<()> {
        let dest = checked_rect(x, y, width, height)?;
        let source = Point::new(checked_coordinate(src_x, "source x")?, checked_coordinate(src_y, "source y")?);
        session_handle(session)?.engine().on_framebuffer_update_copy(dest, source)
    })();

    to_status(session, result)
}

/// JNI entry point for a desktop resize.
///
/// Reallocates the framebuffer at the new size, discarding its contents, and raises the
/// resize flag read by `nativeWasResized`.
///
/// # Arguments
///
/// * `session` - The session id.
/// * `width` - The new desktop width.
/// * `height` - The new desktop height.
///
/// # Returns
///
/// `0` on success, `-1` if the arguments could not be read, otherwise the error's status code.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeOnDesktopResize(
    _env: JNIEnv,
    _class: JClass,
    session: jlong,
    width: jint,
    height: jint,
) -> jint {
    let result = (|| -> Result<()> {
        let width = checked_dimension(width, "width")?;
        let height = checked_dimension(height, "height")?;
        session_handle(session)?.engine().on_desktop_resize(width, height)
    })();

    to_status(session, result)
}

/// JNI entry point to get the current framebuffer width.
///
/// # Returns
///
/// The framebuffer width in pixels, or -1 if the session has no framebuffer.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeGetFramebufferWidth(
    _env: JNIEnv,
    _class: JClass,
    session: jlong,
) -> jint {
    session_handle(session)
        .ok()
        .and_then(|s| s.reader().dimensions())
        .map(|(width, _)| width as jint)
        .unwrap_or(-1)
}

/// JNI entry point to get the current framebuffer height.
///
/// # Returns
///
/// The framebuffer height in pixels, or -1 if the session has no framebuffer.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeGetFramebufferHeight(
    _env: JNIEnv,
    _class: JClass,
    session: jlong,
) -> jint {
    session_handle(session)
        .ok()
        .and_then(|s| s.reader().dimensions())
        .map(|(_, height)| height as jint)
        .unwrap_or(-1)
}

/// JNI entry point to copy the framebuffer out for display.
///
/// # Arguments
///
/// * `env` - The JNI environment.
/// * `_class` - The Java class from which this method is called.
/// * `session` - The session id.
///
/// # Returns
///
/// A new `int[]` of `width * height` row-major `0x00RRGGBB` pixels, or `null` if the
/// session has no framebuffer.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeCopyFramebuffer(
    mut env: JNIEnv,
    _class: JClass,
    session: jlong,
) -> jintArray {
    // Snapshot first, then build the Java array with no lock held
    let snapshot = match session_handle(session).ok().and_then(|s| s.reader().snapshot()) {
        Some(snapshot) => snapshot,
        None => return std::ptr::null_mut(),
    };

    let pixels: Vec<jint> = snapshot.pixels.iter().map(|&p| p as jint).collect();
    let length = match i32::try_from(pixels.len()) {
        Ok(len) => len,
        Err(_) => {
            error!("Framebuffer too large to copy: {} pixels", pixels.len());
            return std::ptr::null_mut();
        }
    };

    let array = match env.new_int_array(length) {
        Ok(array) => array,
        Err(e) => {
            error!("Failed to allocate pixel array: {}", e);
            return std::ptr::null_mut();
        }
    };
    if let Err(e) = env.set_int_array_region(&array, 0, &pixels) {
        error!("Failed to copy pixels to Java: {}", e);
        return std::ptr::null_mut();
    }
    array.into_raw()
}

/// JNI entry point to check whether the desktop was resized since the last acknowledgement.
///
/// # Returns
///
/// `JNI_TRUE` if a resize is pending, `JNI_FALSE` otherwise.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeWasResized(
    _env: JNIEnv,
    _class: JClass,
    session: jlong,
) -> jboolean {
    let resized = session_handle(session)
        .map(|s| s.reader().was_resized())
        .unwrap_or(false);

    if resized {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

/// JNI entry point to acknowledge a resize after the renderer has reacted to it.
#[no_mangle]
#[allow(non_snake_case)]
pub extern "system" fn Java_net_rfbview_NativeFramebuffer_nativeAcknowledgeResize(
    _env: JNIEnv,
    _class: JClass,
    session: jlong,
) {
    match session_handle(session) {
        Ok(s) => {
            let (width, height) = s.reader().acknowledge_resize();
            info!("Session {} acknowledged resize to {}x{}", session, width, height);
        }
        Err(e) => warn!("Failed to acknowledge resize: {}", e),
    }
}
