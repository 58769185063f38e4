use super::*;

fn blank() -> Frame {
    Frame::from_image(image::RgbaImage::new(2, 2))
}

#[test]
fn push_and_remove_preserve_fifo_order() {
    let mut source = FrameSource::new();
    for shade in [10u8, 20, 30] {
        source.push(Frame::from_image(image::RgbaImage::from_pixel(
            1,
            1,
            image::Rgba([shade, 0, 0, 255]),
        )));
    }
    assert_eq!(source.count(), 3);

    let mut seen = Vec::new();
    while let Some(frame) = source.remove_first() {
        let img = frame.image.into_rgba().unwrap();
        seen.push(img.get_pixel(0, 0).0[0]);
    }
    assert_eq!(seen, vec![10, 20, 30]);
    assert!(source.is_empty());
    assert!(source.remove_first().is_none());
}

#[test]
fn averages_follow_total_over_count() {
    let mut source = FrameSource::new();
    source.push(blank().with_orientation(Orientation::new(4.0, -2.0, 1.0)));
    source.push(blank().with_orientation(Orientation::new(-2.0, 2.0, 5.0)));
    source.push(blank());

    let totals = source.totals();
    assert_eq!(totals.count(), 2);
    assert_eq!(totals.total(), Orientation::new(2.0, 0.0, 6.0));
    assert_eq!(
        source.reference_orientation(),
        Some(Orientation::new(1.0, 0.0, 3.0))
    );
}

#[test]
fn removals_do_not_change_the_reference() {
    let mut source: FrameSource = [
        blank().with_orientation(Orientation::new(10.0, 0.0, 0.0)),
        blank().with_orientation(Orientation::new(20.0, 0.0, 0.0)),
    ]
    .into_iter()
    .collect();
    let before = source.reference_orientation();
    source.remove_first();
    assert_eq!(source.reference_orientation(), before);
    assert_eq!(source.count(), 1);
}

#[test]
fn reference_is_none_without_metadata() {
    let mut source = FrameSource::new();
    source.extend([blank(), blank()]);
    assert_eq!(source.reference_orientation(), None);
    assert_eq!(source.iter().count(), 2);
    assert_eq!(OrientationTotals::default().average(), None);
}
