use fenris_function::cell::CellType;

#[test]
fn reference_cells_have_expected_entity_counts() {
    let expected = [
        (CellType::Interval, 1, 2, 0),
        (CellType::Triangle, 2, 3, 3),
        (CellType::Quadrilateral, 2, 4, 4),
        (CellType::Tetrahedron, 3, 4, 6),
        (CellType::Hexahedron, 3, 8, 12),
    ];
    for (cell_type, tdim, num_vertices, num_edges) in expected {
        assert_eq!(cell_type.topological_dimension(), tdim);
        assert_eq!(cell_type.num_vertices(), num_vertices);
        assert_eq!(cell_type.num_edges(), num_edges);
    }
}

#[test]
fn triangle_edges_are_numbered_by_opposite_vertex() {
    let edges = CellType::Triangle.edges();
    for (e, edge) in edges.iter().enumerate() {
        assert!(!edge.contains(&e));
    }
    assert_eq!(CellType::Triangle.reference_edge_midpoint(0), [0.5, 0.5, 0.0]);
    assert_eq!(CellType::Triangle.reference_edge_midpoint(1), [0.0, 0.5, 0.0]);
    assert_eq!(CellType::Triangle.reference_edge_midpoint(2), [0.5, 0.0, 0.0]);
}

#[test]
fn reference_centroids() {
    let [x, y, z] = CellType::Triangle.reference_centroid();
    assert!((x - 1.0 / 3.0).abs() < 1e-15);
    assert!((y - 1.0 / 3.0).abs() < 1e-15);
    assert_eq!(z, 0.0);
    assert_eq!(CellType::Hexahedron.reference_centroid(), [0.5, 0.5, 0.5]);
}

#[test]
fn reference_containment_respects_tolerance() {
    let tol = 1e-12;
    assert!(CellType::Triangle.contains_reference_point(&[0.25, 0.25], tol));
    assert!(CellType::Triangle.contains_reference_point(&[0.5, 0.5], tol));
    assert!(CellType::Triangle.contains_reference_point(&[-0.5e-12, 0.5], tol));
    assert!(!CellType::Triangle.contains_reference_point(&[-1e-10, 0.5], tol));
    assert!(!CellType::Triangle.contains_reference_point(&[0.6, 0.6], tol));

    assert!(CellType::Quadrilateral.contains_reference_point(&[1.0, 1.0], tol));
    assert!(!CellType::Quadrilateral.contains_reference_point(&[1.0, 1.1], tol));

    assert!(CellType::Tetrahedron.contains_reference_point(&[0.2, 0.2, 0.2], tol));
    assert!(!CellType::Tetrahedron.contains_reference_point(&[0.4, 0.4, 0.4], tol));
    assert!(CellType::Hexahedron.contains_reference_point(&[0.9, 0.1, 0.5], tol));
}
