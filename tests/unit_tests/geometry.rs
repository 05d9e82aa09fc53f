use fenris_function::geometry::{locate_point, locate_points, AxisAlignedBoundingBox, BoundingBoxTree};
use fenris_function::mesh::procedural::{create_unit_cube_tet_mesh, create_unit_square_quad_mesh, create_unit_square_tri_mesh};
use fenris_function::settings::PullbackSettings;

#[test]
fn bounding_box_from_points() {
    let points = [[0.0, 1.0, 0.0], [2.0, -1.0, 0.5], [1.0, 0.0, 0.0]];
    let aabb = AxisAlignedBoundingBox::from_points(&points).unwrap();
    assert_eq!(aabb.min(), &[0.0, -1.0, 0.0]);
    assert_eq!(aabb.max(), &[2.0, 1.0, 0.5]);
    assert_eq!(aabb.extents(), [2.0, 2.0, 0.5]);
    assert_eq!(aabb.max_extent(), 2.0);
    assert!(aabb.contains_point(&[1.0, 0.0, 0.25]));
    assert!(!aabb.contains_point(&[1.0, 0.0, 0.75]));
    assert!(aabb.padded(0.5).contains_point(&[1.0, 0.0, 0.75]));
    assert!(AxisAlignedBoundingBox::from_points(&[]).is_none());
}

#[test]
fn tree_reports_collisions_in_ascending_order() {
    let boxes = [
        AxisAlignedBoundingBox::new([1.0, 0.0, 0.0], [2.0, 1.0, 0.0]),
        AxisAlignedBoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 0.0]),
        AxisAlignedBoundingBox::new([0.5, 0.5, 0.0], [1.5, 1.5, 0.0]),
    ];
    let tree = BoundingBoxTree::from_bounding_boxes(&boxes);
    assert_eq!(tree.num_boxes(), 3);
    assert_eq!(tree.compute_collisions(&[1.0, 0.75, 0.0]), vec![0, 1, 2]);
    assert_eq!(tree.compute_collisions(&[0.25, 0.25, 0.0]), vec![1]);
    assert!(tree.compute_collisions(&[3.0, 0.0, 0.0]).is_empty());
}

#[test]
fn located_points_map_back_to_themselves() {
    let mesh = create_unit_square_tri_mesh(5);
    let points = [[0.13, 0.71, 0.0], [0.5, 0.5, 0.0], [1.0, 1.0, 0.0], [0.999, 0.001, 0.0]];
    for point in &points {
        let (cell, xi) = locate_point(&mesh, point).unwrap();
        let x = mesh.push_forward_point(cell, &xi[..2]);
        for k in 0..2 {
            assert!((x[k] - point[k]).abs() < 1e-13);
        }
    }
}

#[test]
fn shared_points_are_assigned_to_the_lowest_cell() {
    let mesh = create_unit_square_quad_mesh(2);
    // The center of the square is a vertex of all four cells
    let (cell, xi) = locate_point(&mesh, &[0.5, 0.5, 0.0]).unwrap();
    assert_eq!(cell, 0);
    assert!((xi[0] - 1.0).abs() < 1e-12 && (xi[1] - 1.0).abs() < 1e-12);
}

#[test]
fn points_outside_the_mesh_are_not_located() {
    let mesh = create_unit_cube_tet_mesh(2);
    let points = [[0.5, 0.5, 0.5], [1.2, 0.5, 0.5], [0.5, -1e-6, 0.5]];
    let located = locate_points(&mesh, &points);
    assert!(located[0].is_some());
    assert!(located[1].is_none());
    assert!(located[2].is_none());
}

#[test]
fn containment_tolerance_is_configurable() {
    let settings = PullbackSettings {
        containment_tolerance: 1e-3,
        ..PullbackSettings::default()
    };
    let mesh = create_unit_square_tri_mesh(2).with_pullback_settings(settings);
    assert!(locate_point(&mesh, &[0.5, -1e-4, 0.0]).is_some());
    assert!(locate_point(&mesh, &[0.5, -1e-2, 0.0]).is_none());
}
