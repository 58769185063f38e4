use super::*;

fn pool() -> SharedPixelBufferPool {
    SharedPixelBufferPool::new(crate::PixelBufferPoolOpts::default())
}

fn gradient(width: u32, height: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
}

fn canvas(width: u32, height: u32) -> Canvas {
    Canvas { width, height }
}

#[test]
fn same_size_frame_is_copied_pixel_for_pixel() {
    let src = gradient(8, 6);
    let t = FrameTransformer::new(canvas(8, 6), TransformOpts::default());
    let buf = t
        .transform(FrameIndex(0), Frame::from_image(src.clone()), None, &pool())
        .unwrap();

    assert_eq!(buf.format, PixelFormat::Bgra8);
    for (x, y, px) in src.enumerate_pixels() {
        assert_eq!(buf.pixel_rgba(x, y), Some(px.0), "pixel {x},{y}");
    }
    // BGRA byte order in memory.
    assert_eq!(&buf.data[4..8], &[128, 0, 1, 255]);
}

#[test]
fn wide_frame_is_center_cropped() {
    let src = gradient(4, 2);
    let t = FrameTransformer::new(canvas(2, 2), TransformOpts::default());
    let buf = t
        .transform(FrameIndex(0), Frame::from_image(src.clone()), None, &pool())
        .unwrap();
    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(buf.pixel_rgba(x, y), Some(src.get_pixel(x + 1, y).0));
        }
    }
}

#[test]
fn origin_anchor_crops_from_the_right() {
    let src = gradient(4, 2);
    let opts = TransformOpts {
        fill_anchor: FillAnchor::Origin,
        ..TransformOpts::default()
    };
    let t = FrameTransformer::new(canvas(2, 2), opts);
    let buf = t
        .transform(FrameIndex(0), Frame::from_image(src.clone()), None, &pool())
        .unwrap();
    assert_eq!(buf.pixel_rgba(0, 0), Some(src.get_pixel(0, 0).0));
    assert_eq!(buf.pixel_rgba(1, 1), Some(src.get_pixel(1, 1).0));
}

#[test]
fn upscaled_solid_frame_fills_every_pixel() {
    let src = image::RgbaImage::from_pixel(3, 2, image::Rgba([200, 10, 60, 255]));
    let t = FrameTransformer::new(canvas(32, 18), TransformOpts::default());
    let buf = t
        .transform(FrameIndex(0), Frame::from_image(src), None, &pool())
        .unwrap();
    assert_eq!(buf.canvas(), canvas(32, 18));
    for y in 0..18 {
        for x in 0..32 {
            let px = buf.pixel_rgba(x, y).unwrap();
            for (got, want) in px.iter().zip([200u8, 10, 60, 255]) {
                assert!(got.abs_diff(want) <= 2, "pixel {x},{y}: {px:?}");
            }
        }
    }
}

#[test]
fn edge_rows_and_columns_are_sampled() {
    let src = gradient(5, 3);
    let t = FrameTransformer::new(canvas(5, 3), TransformOpts::default());
    let buf = t
        .transform(FrameIndex(0), Frame::from_image(src.clone()), None, &pool())
        .unwrap();
    assert_eq!(buf.pixel_rgba(4, 2), Some(src.get_pixel(4, 2).0));
    assert_eq!(buf.pixel_rgba(0, 2), Some(src.get_pixel(0, 2).0));
    assert_eq!(buf.pixel_rgba(4, 0), Some(src.get_pixel(4, 0).0));
}

#[test]
fn uncovered_canvas_keeps_the_background_under_strong_tilt() {
    let opts = TransformOpts {
        compensate_tilt: true,
        background: [0, 0, 255, 255],
        ..TransformOpts::default()
    };
    let t = FrameTransformer::new(canvas(1280, 720), opts);
    let src = image::RgbaImage::from_pixel(1280, 720, image::Rgba([255, 0, 0, 255]));
    let buf = t
        .transform(
            FrameIndex(0),
            Frame::from_image(src).with_orientation(Orientation::new(80.0, 0.0, 0.0)),
            Some(Orientation::ZERO),
            &pool(),
        )
        .unwrap();
    let blue = (0..720).any(|y| buf.pixel_rgba(640, y) == Some([0, 0, 255, 255]));
    let red = (0..720).any(|y| {
        buf.pixel_rgba(640, y)
            .is_some_and(|px| px[0] > 240 && px[2] < 16)
    });
    assert!(blue && red);
}

#[test]
fn transparent_pixels_land_on_the_background() {
    let src = image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 255, 255, 0]));
    let t = FrameTransformer::new(canvas(2, 2), TransformOpts::default());
    let buf = t
        .transform(FrameIndex(0), Frame::from_image(src), None, &pool())
        .unwrap();
    assert_eq!(buf.pixel_rgba(0, 0), Some([0, 0, 0, 255]));
}

#[test]
fn opposite_roll_produces_distinct_buffers() {
    let opts = TransformOpts {
        compensate_tilt: true,
        ..TransformOpts::default()
    };
    let t = FrameTransformer::new(canvas(320, 240), opts);
    let pool = pool();
    let reference = Some(Orientation::ZERO);

    let plus = t
        .transform(
            FrameIndex(0),
            Frame::from_image(gradient(320, 240)).with_orientation(Orientation::new(5.0, 0.0, 0.0)),
            reference,
            &pool,
        )
        .unwrap();
    let minus = t
        .transform(
            FrameIndex(1),
            Frame::from_image(gradient(320, 240))
                .with_orientation(Orientation::new(-5.0, 0.0, 0.0)),
            reference,
            &pool,
        )
        .unwrap();
    assert_ne!(plus.data, minus.data);

    let level = t
        .transform(
            FrameIndex(2),
            Frame::from_image(gradient(320, 240)).with_orientation(Orientation::ZERO),
            reference,
            &pool,
        )
        .unwrap();
    assert_ne!(plus.data, level.data);
    assert_eq!(level.pixel_rgba(10, 20), Some([10, 20, 128, 255]));
}

#[test]
fn compensation_without_orientation_fails_for_that_frame() {
    let opts = TransformOpts {
        compensate_tilt: true,
        ..TransformOpts::default()
    };
    let t = FrameTransformer::new(canvas(4, 4), opts);
    let err = t
        .transform(
            FrameIndex(3),
            Frame::from_image(gradient(4, 4)),
            Some(Orientation::ZERO),
            &pool(),
        )
        .unwrap_err();
    assert!(matches!(err, LapseError::MissingOrientation { index: 3 }));
}

#[test]
fn compensation_without_reference_is_rejected() {
    let opts = TransformOpts {
        compensate_tilt: true,
        ..TransformOpts::default()
    };
    let t = FrameTransformer::new(canvas(4, 4), opts);
    let err = t
        .frame_homography(FrameIndex(0), 4, 4, Some(Orientation::ZERO), None)
        .unwrap_err();
    assert!(matches!(err, LapseError::Validation(_)));
}

#[test]
fn orientation_is_ignored_when_compensation_is_off() {
    let t = FrameTransformer::new(canvas(16, 16), TransformOpts::default());
    let pool = pool();
    let tilted = t
        .transform(
            FrameIndex(0),
            Frame::from_image(gradient(16, 16)).with_orientation(Orientation::new(30.0, 0.0, 0.0)),
            Some(Orientation::ZERO),
            &pool,
        )
        .unwrap();
    let plain = t
        .transform(FrameIndex(1), Frame::from_image(gradient(16, 16)), None, &pool)
        .unwrap();
    assert_eq!(tilted.data, plain.data);
}

#[test]
fn released_buffers_are_reused_and_fully_redrawn() {
    let pool = pool();
    let t = FrameTransformer::new(canvas(4, 4), TransformOpts::default());
    let red = image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
    let blue = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 255, 255]));

    let first = t
        .transform(FrameIndex(0), Frame::from_image(red), None, &pool)
        .unwrap();
    pool.release(first);
    let second = t
        .transform(FrameIndex(1), Frame::from_image(blue), None, &pool)
        .unwrap();

    assert_eq!(pool.stats().reused_buffers, 1);
    assert_eq!(second.pixel_rgba(0, 0), Some([0, 0, 255, 255]));
    assert_eq!(second.pixel_rgba(3, 3), Some([0, 0, 255, 255]));
}

#[test]
fn file_backed_frames_decode_on_transform() {
    let dir = std::env::temp_dir().join(format!(
        "lapse_raster_file_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("frame.png");
    image::RgbaImage::from_pixel(2, 2, image::Rgba([9, 8, 7, 255]))
        .save(&path)
        .unwrap();

    let t = FrameTransformer::new(canvas(2, 2), TransformOpts::default());
    let buf = t
        .transform(FrameIndex(0), Frame::from_path(&path), None, &pool())
        .unwrap();
    assert_eq!(buf.pixel_rgba(1, 1), Some([9, 8, 7, 255]));

    let missing = t
        .transform(FrameIndex(0), Frame::from_path(dir.join("nope.png")), None, &pool())
        .unwrap_err();
    assert!(matches!(missing, LapseError::Other(_)));

    let _ = std::fs::remove_dir_all(&dir);
}
