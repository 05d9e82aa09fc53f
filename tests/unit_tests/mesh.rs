use fenris_function::cell::CellType;
use fenris_function::mesh::procedural::{
    create_rectangle_quad_mesh, create_unit_cube_hex_mesh, create_unit_cube_tet_mesh, create_unit_interval_mesh,
    create_unit_square_quad_mesh, create_unit_square_tri_mesh,
};
use fenris_function::mesh::Mesh;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, Vector3};
use proptest::prelude::*;

fn assert_points_eq(a: [f64; 3], b: [f64; 3], tol: f64) {
    assert_matrix_eq!(Vector3::from(a), Vector3::from(b), comp = abs, tol = tol);
}

fn curved_triangle_mesh() -> Mesh {
    let coordinates = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.6, 0.6, 0.0, 0.5, 0.5, 0.0];
    Mesh::new(CellType::Triangle, 2, 2, coordinates, vec![0, 1, 2, 3, 4, 5]).unwrap()
}

fn skewed_quad_mesh() -> Mesh {
    let coordinates = vec![0.0, 0.0, 2.0, 0.0, 0.0, 1.0, 1.5, 1.5];
    Mesh::new(CellType::Quadrilateral, 2, 1, coordinates, vec![0, 1, 2, 3]).unwrap()
}

#[test]
fn procedural_mesh_sizes() {
    let interval = create_unit_interval_mesh(4);
    assert_eq!((interval.num_cells(), interval.num_nodes()), (4, 5));
    let tri = create_unit_square_tri_mesh(3);
    assert_eq!((tri.num_cells(), tri.num_nodes()), (18, 16));
    let quad = create_unit_square_quad_mesh(3);
    assert_eq!((quad.num_cells(), quad.num_nodes()), (9, 16));
    let tet = create_unit_cube_tet_mesh(2);
    assert_eq!((tet.num_cells(), tet.num_nodes()), (48, 27));
    let hex = create_unit_cube_hex_mesh(2);
    assert_eq!((hex.num_cells(), hex.num_nodes()), (8, 27));
    assert_eq!(hex.topology().num_edges(), 54);

    let empty = create_unit_square_quad_mesh(0);
    assert_eq!(empty.num_cells(), 0);
}

#[test]
fn tetrahedra_of_the_unit_cube_have_positive_volume() {
    let mesh = create_unit_cube_tet_mesh(1);
    let volume: f64 = (0..mesh.num_cells())
        .map(|cell| mesh.jacobian(cell, &[0.25, 0.25, 0.25]).det_j.abs() / 6.0)
        .sum();
    assert!((volume - 1.0).abs() < 1e-14);
    for cell in 0..mesh.num_cells() {
        assert!(mesh.jacobian(cell, &[0.0; 3]).det_j.abs() > 0.0);
    }
}

#[test]
fn mesh_construction_is_validated() {
    assert!(Mesh::new(CellType::Triangle, 1, 1, vec![0.0, 1.0, 2.0], vec![0, 1, 2]).is_err());
    assert!(Mesh::new(CellType::Triangle, 2, 1, vec![0.0, 0.0, 1.0], vec![0, 1, 2]).is_err());
    assert!(Mesh::new(CellType::Triangle, 2, 1, vec![0.0; 6], vec![0, 1]).is_err());
    assert!(Mesh::new(CellType::Triangle, 2, 1, vec![0.0; 6], vec![0, 1, 3]).is_err());
    assert!(Mesh::new(CellType::Triangle, 2, 3, vec![0.0; 6], vec![0, 1, 2]).is_err());
}

#[test]
fn affine_cells_have_constant_jacobians() {
    let mesh = create_rectangle_quad_mesh([1.0, 2.0], [2.0, 4.0], 2, 2);
    assert!(!mesh.is_affine());
    let jacobian = mesh.jacobian(3, &[0.3, 0.8]);
    assert_matrix_eq!(jacobian.j, DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 2.0]), comp = abs, tol = 1e-14);
    assert!((jacobian.det_j - 2.0).abs() < 1e-14);
    assert_points_eq(mesh.push_forward_point(3, &[0.5, 0.5]), [2.5, 5.0, 0.0], 1e-14);

    let tri = create_unit_square_tri_mesh(2);
    assert!(tri.is_affine());
    assert!((tri.cell_diameter(0) - 0.5f64.hypot(0.5)).abs() < 1e-15);
}

#[test]
fn cell_geometry_lists_node_coordinates() {
    let mesh = create_unit_square_tri_mesh(1);
    let mut geometry = vec![0.0; 6];
    mesh.populate_cell_geometry(1, &mut geometry);
    assert_eq!(geometry, vec![0.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
    assert_eq!(mesh.node(3), [1.0, 1.0, 0.0]);
}

#[test]
fn pullback_inverts_affine_cells() {
    let mesh = create_unit_square_tri_mesh(4);
    for cell in [0, 7, 31] {
        let xi = [0.2, 0.5, 0.0];
        let x = mesh.push_forward_point(cell, &xi[..2]);
        assert_points_eq(mesh.pull_back(cell, &x).unwrap(), xi, 1e-13);
    }
}

#[test]
fn pullback_inverts_curved_and_bilinear_cells() {
    for mesh in [curved_triangle_mesh(), skewed_quad_mesh()] {
        assert!(!mesh.is_affine());
        for xi in [[0.1, 0.2, 0.0], [0.3, 0.6, 0.0], [0.0, 0.0, 0.0]] {
            let x = mesh.push_forward_point(0, &xi[..2]);
            assert_points_eq(mesh.pull_back(0, &x).unwrap(), xi, 1e-9);
        }
    }
    assert_eq!(curved_triangle_mesh().degree(), 2);
}

#[test]
fn pullback_on_manifolds_projects_onto_the_cell() {
    let coordinates = vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
    let mesh = Mesh::new(CellType::Triangle, 3, 1, coordinates, vec![0, 1, 2]).unwrap();
    assert!(mesh.is_manifold());
    let jacobian = mesh.jacobian(0, &[0.0, 0.0]);
    assert!((jacobian.det_j - 2.0f64.sqrt()).abs() < 1e-14);

    let x = mesh.push_forward_point(0, &[0.2, 0.3]);
    assert_points_eq(x, [0.2, 0.3, 0.2], 1e-15);
    // Offsets along the normal (1, 0, -1) do not change the reference point
    let off_surface = [x[0] + 0.1, x[1], x[2] - 0.1];
    assert_points_eq(mesh.pull_back(0, &off_surface).unwrap(), [0.2, 0.3, 0.0], 1e-14);

    let coordinates = vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
    let quad = Mesh::new(CellType::Quadrilateral, 3, 1, coordinates, vec![0, 1, 2, 3]).unwrap();
    let x = quad.push_forward_point(0, &[0.7, 0.4]);
    assert_points_eq(quad.pull_back(0, &x).unwrap(), [0.7, 0.4, 0.0], 1e-9);
}

proptest! {
    #[test]
    fn hexahedral_pullback_roundtrip(x in 0.0..1.0f64, y in 0.0..1.0f64, z in 0.0..1.0f64) {
        let mesh = create_unit_cube_hex_mesh(2);
        let point = [x, y, z];
        let cell = mesh
            .bounding_box_tree()
            .compute_collisions(&point)
            .into_iter()
            .next()
            .unwrap();
        let xi = mesh.pull_back(cell, &point).unwrap();
        let mapped = mesh.push_forward_point(cell, &xi);
        for k in 0..3 {
            prop_assert!((mapped[k] - point[k]).abs() < 1e-10);
        }
    }
}
