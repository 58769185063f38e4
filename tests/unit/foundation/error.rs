use super::*;

#[test]
fn helpers_build_expected_variants() {
    assert!(matches!(LapseError::validation("x"), LapseError::Validation(_)));
    assert!(matches!(LapseError::setup("x"), LapseError::SetupFailed(_)));
    assert!(matches!(LapseError::encoder("x"), LapseError::Encoder(_)));
    assert!(matches!(LapseError::serde("x"), LapseError::Serde(_)));
    assert!(matches!(
        LapseError::frame(3, "x"),
        LapseError::FrameEncodeFailed { index: 3, .. }
    ));
}

#[test]
fn display_names_the_frame() {
    let e = LapseError::frame(7, "decode failed");
    assert_eq!(e.to_string(), "frame 7 failed to encode: decode failed");
}

#[test]
fn at_frame_wraps_generic_errors() {
    let e = LapseError::encoder("pipe closed").at_frame(2);
    match e {
        LapseError::FrameEncodeFailed { index, message } => {
            assert_eq!(index, 2);
            assert!(message.contains("pipe closed"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn at_frame_keeps_existing_frame_errors_and_cancellation() {
    let e = LapseError::frame(1, "x").at_frame(9);
    assert!(matches!(e, LapseError::FrameEncodeFailed { index: 1, .. }));
    assert!(matches!(
        LapseError::Cancelled.at_frame(4),
        LapseError::Cancelled
    ));
}

#[test]
fn missing_orientation_becomes_frame_failure() {
    let e = LapseError::MissingOrientation { index: 5 }.at_frame(5);
    match e {
        LapseError::FrameEncodeFailed { index, message } => {
            assert_eq!(index, 5);
            assert!(message.contains("orientation"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn anyhow_errors_convert_into_other() {
    let e: LapseError = anyhow::anyhow!("boom").into();
    assert!(matches!(e, LapseError::Other(_)));
    assert_eq!(e.to_string(), "boom");
}
