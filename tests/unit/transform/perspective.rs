use super::*;

const CANVAS: Canvas = Canvas {
    width: 1280,
    height: 720,
};

fn assert_close(a: Homography, b: Homography, eps: f64) {
    for (ra, rb) in a.rows().iter().zip(b.rows().iter()) {
        for (x, y) in ra.iter().zip(rb.iter()) {
            assert!((x - y).abs() <= eps, "{a:?} != {b:?}");
        }
    }
}

#[test]
fn zero_delta_is_identity_for_both_compositions() {
    let o = Orientation::new(3.0, -7.0, 12.0);
    for composition in [AxisComposition::PerAxisReset, AxisComposition::Compound] {
        let h = tilt_homography(o, o, CANVAS, composition);
        assert!(h.is_identity(1e-12), "{composition:?}: {h:?}");
    }
}

#[test]
fn every_axis_keeps_the_canvas_center_fixed() {
    let c = CANVAS.center();
    for axis in Axis::ALL {
        let h = axis_homography(axis, 10.0, CANVAS);
        let p = h.apply(c).unwrap();
        assert!((p - c).hypot() < 1e-9, "{axis:?} moved the center to {p:?}");
    }
}

#[test]
fn yaw_is_an_in_plane_rotation() {
    let h = axis_homography(Axis::Yaw, 90.0, CANVAS);
    let m = h.rows();
    assert_eq!(m[2][0], 0.0);
    assert_eq!(m[2][1], 0.0);

    let c = CANVAS.center();
    let p = h.apply(c + kurbo::Vec2::new(10.0, 0.0)).unwrap();
    assert!((p - (c + kurbo::Vec2::new(0.0, 10.0))).hypot() < 1e-9);
}

#[test]
fn roll_and_pitch_add_a_perspective_term() {
    let rad = 5f64.to_radians();

    let roll = axis_homography(Axis::Roll, 5.0, CANVAS).rows();
    let pitch = axis_homography(Axis::Pitch, 5.0, CANVAS).rows();

    // Perspective row, before recentering, is [m34 * r20, m34 * r21, 1].
    let c = CANVAS.center();
    let roll_y = PERSPECTIVE_DEPTH * rad.sin();
    assert!((roll[2][0]).abs() < 1e-15);
    assert!((roll[2][1] - roll_y).abs() < 1e-15);
    assert!((roll[2][2] - (1.0 - roll_y * c.y)).abs() < 1e-12);

    let pitch_x = PERSPECTIVE_DEPTH * -rad.sin();
    assert!((pitch[2][0] - pitch_x).abs() < 1e-15);
    assert!((pitch[2][1]).abs() < 1e-15);
}

#[test]
fn opposite_roll_deltas_warp_differently() {
    let reference = Orientation::ZERO;
    let plus = tilt_homography(
        Orientation::new(5.0, 0.0, 0.0),
        reference,
        CANVAS,
        AxisComposition::PerAxisReset,
    );
    let minus = tilt_homography(
        Orientation::new(-5.0, 0.0, 0.0),
        reference,
        CANVAS,
        AxisComposition::PerAxisReset,
    );

    let corner = kurbo::Point::new(0.0, 0.0);
    let a = plus.apply(corner).unwrap();
    let b = minus.apply(corner).unwrap();
    assert!((a - b).hypot() > 1.0);
}

#[test]
fn compositions_agree_for_a_single_axis_and_differ_for_several() {
    let reference = Orientation::ZERO;
    let single = Orientation::new(0.0, 8.0, 0.0);
    assert_close(
        tilt_homography(single, reference, CANVAS, AxisComposition::PerAxisReset),
        tilt_homography(single, reference, CANVAS, AxisComposition::Compound),
        1e-12,
    );

    let several = Orientation::new(20.0, 15.0, 0.0);
    let per_axis = tilt_homography(several, reference, CANVAS, AxisComposition::PerAxisReset);
    let compound = tilt_homography(several, reference, CANVAS, AxisComposition::Compound);
    let p = kurbo::Point::new(0.0, 0.0);
    let a = per_axis.apply(p).unwrap();
    let b = compound.apply(p).unwrap();
    assert!((a - b).hypot() > 1e-3);
}

#[test]
fn delta_is_taken_against_the_reference() {
    let reference = Orientation::new(2.0, 2.0, 2.0);
    let a = tilt_homography(
        Orientation::new(7.0, 2.0, 2.0),
        reference,
        CANVAS,
        AxisComposition::PerAxisReset,
    );
    let b = axis_homography(Axis::Roll, 5.0, CANVAS);
    assert_close(a, b, 1e-12);
}

#[test]
fn inverse_round_trips_points() {
    let h = tilt_homography(
        Orientation::new(4.0, -3.0, 6.0),
        Orientation::ZERO,
        CANVAS,
        AxisComposition::PerAxisReset,
    );
    let inv = h.inverse().unwrap();
    assert_close(h.then(inv), Homography::identity(), 1e-9);

    let p = kurbo::Point::new(100.0, 50.0);
    let q = inv.apply(h.apply(p).unwrap()).unwrap();
    assert!((p - q).hypot() < 1e-6);
}

#[test]
fn singular_matrix_has_no_inverse() {
    let h = Homography::from_rows([[1.0, 2.0, 0.0], [2.0, 4.0, 0.0], [0.0, 0.0, 1.0]]);
    assert!(h.inverse().is_none());
}

#[test]
fn from_affine_matches_kurbo() {
    let a = Affine::translate((3.0, -2.0)) * Affine::rotate(0.3) * Affine::scale(1.5);
    let h = Homography::from_affine(a);
    let p = Point::new(12.0, 7.0);
    let expected = a * p;
    let got = h.apply(p).unwrap();
    assert!((expected - got).hypot() < 1e-12);
}

#[test]
fn then_applies_left_to_right() {
    let h = Homography::from_affine(Affine::scale(2.0)).then(Homography::translate(1.0, 0.0));
    let p = h.apply(Point::new(1.0, 1.0)).unwrap();
    assert_eq!(p, Point::new(3.0, 2.0));
}

#[test]
fn points_behind_the_eye_do_not_map() {
    let h = axis_homography(Axis::Roll, 89.0, CANVAS);
    let c = CANVAS.center();
    assert!(h.apply(c + kurbo::Vec2::new(0.0, 1000.0)).is_none());
    assert!(h.apply(c + kurbo::Vec2::new(0.0, -1000.0)).is_some());
}

#[test]
fn axis_rotations_follow_the_right_hand_rule() {
    let rad = 30f64.to_radians();
    let r = Axis::Roll.rotation(rad);
    let p = r * nalgebra::Point3::new(0.0, 1.0, 0.0);
    assert!((p.z - rad.sin()).abs() < 1e-12);

    let compound = tilt_homography(
        Orientation::new(0.0, 0.0, 90.0),
        Orientation::ZERO,
        CANVAS,
        AxisComposition::Compound,
    );
    assert_close(compound, axis_homography(Axis::Yaw, 90.0, CANVAS), 1e-9);
}
