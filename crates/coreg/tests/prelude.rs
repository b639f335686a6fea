use coreg::prelude::*;

#[test]
fn prelude_covers_calibrate_and_apply() {
    let a = Frame::xyz("A");
    let b = Frame::new("B", ["u", "v", "w"]);
    let offset = Vec3::new(10.0, -4.0, 2.5);

    let mut points = MemoryPointStore::new();
    let corners = [
        Pt3::new(0.0, 0.0, 0.0),
        Pt3::new(2.0, 0.0, 0.0),
        Pt3::new(0.0, 2.0, 0.0),
        Pt3::new(0.0, 0.0, 2.0),
        Pt3::new(2.0, 2.0, 0.0),
        Pt3::new(0.0, 2.0, 2.0),
        Pt3::new(2.0, 2.0, 2.0),
    ];
    for (i, p) in corners.iter().enumerate() {
        points.insert_point(&a, format!("c{i}"), *p);
        points.insert_point(&b, format!("c{i}"), *p + offset);
    }

    let mut transforms = MemoryTransformStore::new();
    calibrate_pair(&points, &mut transforms, &a, &b, &RegistrationConfig::default()).unwrap();
    let t: Transform = transforms.load(&a.id, &b.id).unwrap();
    assert!((t.matrix.fixed_view::<3, 1>(0, 3) - offset).norm() < 1e-9);

    points.insert_point(&a, "marker", Pt3::new(1.0, 1.0, 1.0));
    let summary = map_points(&mut points, &transforms, &a, &b, &MapOptions::default()).unwrap();
    assert!(summary.failures.is_empty());
    let marker = points.get_point(&b, "marker").unwrap();
    assert!((marker - Pt3::new(11.0, -3.0, 3.5)).norm() < 1e-9);
}
