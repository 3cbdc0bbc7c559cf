//! End-to-end update sequences driven through the public engine API.

use bytes::Bytes;
use rfbview_framebuffer::{DecodeError, Engine, PixelFormat, Point, Rect, ServerUpdate};

fn rgb565_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn server_init(width: u16, height: u16, format: PixelFormat) -> ServerUpdate {
    ServerUpdate::ServerInit {
        width,
        height,
        desktop_name: "scenario".to_string(),
        format,
    }
}

#[test_log::test]
fn rgb565_red_pixel_decodes_to_pure_red() {
    let (mut engine, reader) = Engine::new();
    engine.apply(server_init(2, 2, PixelFormat::rgb565())).unwrap();
    engine
        .on_framebuffer_update_raw(Rect::new(0, 0, 1, 1), &rgb565_bytes(&[0xF800]))
        .unwrap();
    assert_eq!(reader.snapshot().unwrap().rgb(0, 0), Some((255, 0, 0)));
}

#[test_log::test]
fn raw_rectangle_is_not_transposed() {
    // A 4x2 rectangle: the first row is red, the second row blue. A transposed
    // write would not even fit the 4x2 region.
    let (mut engine, reader) = Engine::new();
    engine.apply(server_init(6, 3, PixelFormat::rgb565())).unwrap();
    let data = rgb565_bytes(&[0xF800, 0xF800, 0xF800, 0xF800, 0x001F, 0x001F, 0x001F, 0x001F]);
    engine
        .on_framebuffer_update_raw(Rect::from_corners(Point::new(1, 1), Point::new(5, 3)).unwrap(), &data)
        .unwrap();

    let snapshot = reader.snapshot().unwrap();
    for x in 1..5 {
        assert_eq!(snapshot.rgb(x, 1), Some((255, 0, 0)), "row 1, x {}", x);
        assert_eq!(snapshot.rgb(x, 2), Some((0, 0, 255)), "row 2, x {}", x);
    }
    assert_eq!(snapshot.rgb(0, 1), Some((0, 0, 0)));
    assert_eq!(snapshot.rgb(5, 2), Some((0, 0, 0)));
    assert_eq!(snapshot.rgb(1, 0), Some((0, 0, 0)));
}

#[test_log::test]
fn big_and_little_endian_servers_produce_the_same_image() {
    let little = PixelFormat::rgb888();
    let big = PixelFormat { big_endian: true, ..little };
    let words: [u32; 4] = [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0x0012_3456];

    let mut images = Vec::new();
    for format in [little, big] {
        let (mut engine, reader) = Engine::new();
        engine.apply(server_init(2, 2, format)).unwrap();
        let data: Vec<u8> = words
            .iter()
            .flat_map(|w| if format.big_endian { w.to_be_bytes() } else { w.to_le_bytes() })
            .collect();
        engine.on_framebuffer_update_raw(Rect::new(0, 0, 2, 2), &data).unwrap();
        images.push(reader.snapshot().unwrap());
    }

    assert_eq!(images[0], images[1]);
    assert_eq!(images[0].pixels, words.to_vec());
}

#[test_log::test]
fn copy_rect_uses_pre_copy_source_values() {
    let (mut engine, reader) = Engine::new();
    engine.apply(server_init(8, 8, PixelFormat::rgb888())).unwrap();

    // distinct marker per cell: blue = x, green = y
    let data: Vec<u8> = (0u32..64)
        .flat_map(|i| (((i / 8) << 8) | (i % 8)).to_le_bytes())
        .collect();
    engine.on_framebuffer_update_raw(Rect::new(0, 0, 8, 8), &data).unwrap();
    let before = reader.snapshot().unwrap();

    engine
        .apply(ServerUpdate::Copy {
            dest: Rect::from_corners(Point::new(0, 0), Point::new(4, 4)).unwrap(),
            source: Point::new(2, 2),
        })
        .unwrap();

    let after = reader.snapshot().unwrap();
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(after.rgb(x, y), before.rgb(x + 2, y + 2), "at ({}, {})", x, y);
        }
    }
}

#[test_log::test]
fn one_pixel_past_the_edge_is_rejected() {
    let (mut engine, reader) = Engine::new();
    engine.apply(server_init(4, 4, PixelFormat::rgb565())).unwrap();

    let too_wide = Rect::new(1, 0, 4, 1);
    let err = engine
        .apply(ServerUpdate::Fill { rect: too_wide, pixel: Bytes::from(rgb565_bytes(&[0xFFFF])) })
        .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidRectangle(_)));

    let too_tall = Rect::new(0, 0, 1, 5);
    let err = engine
        .apply(ServerUpdate::Raw { rect: too_tall, pixels: Bytes::from(rgb565_bytes(&[0; 5])) })
        .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidRectangle(_)));

    let snapshot = reader.snapshot().unwrap();
    assert!(snapshot.pixels.iter().all(|&p| p == 0));
}

#[test_log::test]
fn zero_area_updates_leave_the_image_alone() {
    let (mut engine, reader) = Engine::new();
    engine.apply(server_init(3, 3, PixelFormat::rgb565())).unwrap();
    engine
        .on_framebuffer_update_fill(Rect::new(0, 0, 3, 3), &rgb565_bytes(&[0x07E0]))
        .unwrap();
    let before = reader.snapshot().unwrap();

    let point = Rect::from_corners(Point::new(1, 1), Point::new(1, 1)).unwrap();
    engine.on_framebuffer_update_raw(point, &[]).unwrap();
    engine.on_framebuffer_update_fill(point, &rgb565_bytes(&[0xF800])).unwrap();

    assert_eq!(reader.snapshot().unwrap(), before);
}

#[test_log::test]
fn resize_then_redraw() {
    let (mut engine, mut reader) = Engine::new();
    engine.apply(server_init(4, 4, PixelFormat::rgb565())).unwrap();
    engine
        .on_framebuffer_update_fill(Rect::new(0, 0, 4, 4), &rgb565_bytes(&[0xFFFF]))
        .unwrap();

    engine.apply(ServerUpdate::DesktopResize { width: 2, height: 3 }).unwrap();
    assert!(reader.was_resized());
    let snapshot = reader.snapshot().unwrap();
    assert_eq!((snapshot.width, snapshot.height), (2, 3));
    assert!(snapshot.pixels.iter().all(|&p| p == 0));

    // the old geometry no longer fits
    let err = engine
        .on_framebuffer_update_fill(Rect::new(0, 0, 4, 4), &rgb565_bytes(&[0xFFFF]))
        .unwrap_err();
    assert!(matches!(err, DecodeError::InvalidRectangle(_)));

    assert_eq!(reader.acknowledge_resize(), (2, 3));
    assert!(!reader.was_resized());

    engine
        .on_framebuffer_update_fill(Rect::new(0, 0, 2, 3), &rgb565_bytes(&[0x001F]))
        .unwrap();
    assert_eq!(reader.snapshot().unwrap().to_rgb24().len(), 2 * 3 * 3);
    assert!(!reader.was_resized());
}

#[test_log::test]
fn sessions_driven_in_parallel_stay_independent() {
    let handles: Vec<_> = (0u16..4)
        .map(|n| {
            std::thread::spawn(move || {
                let (mut engine, reader) = Engine::new();
                engine.apply(server_init(16, 16, PixelFormat::rgb565())).unwrap();
                let colour = [0xF800u16, 0x07E0, 0x001F, 0xFFFF][usize::from(n)];
                for _ in 0..50 {
                    engine
                        .on_framebuffer_update_fill(Rect::new(0, 0, 16, 16), &colour.to_le_bytes())
                        .unwrap();
                    engine
                        .on_framebuffer_update_copy(Rect::new(8, 8, 8, 8), Point::new(0, 0))
                        .unwrap();
                }
                reader.snapshot().unwrap()
            })
        })
        .collect();

    let expected = [0x00FF_0000u32, 0x0000_FF00, 0x0000_00FF, 0x00FF_FFFF];
    for (handle, colour) in handles.into_iter().zip(expected) {
        let snapshot = handle.join().unwrap();
        assert!(snapshot.pixels.iter().all(|&p| p == colour));
    }
}
