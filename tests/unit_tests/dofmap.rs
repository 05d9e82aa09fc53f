use fenris_function::cell::CellType;
use fenris_function::dofmap::{DofMap, IndexMap};
use fenris_function::element::FiniteElement;
use fenris_function::mesh::procedural::{create_unit_interval_mesh, create_unit_square_tri_mesh};
use fenris_function::FunctionError;
use std::sync::Arc;

fn build(element: FiniteElement) -> DofMap {
    // Two triangles [0, 1, 3] and [0, 3, 2] sharing the diagonal from node 0 to node 3
    let mesh = create_unit_square_tri_mesh(1);
    DofMap::build(mesh.topology(), Arc::new(element)).unwrap()
}

#[test]
fn topology_of_two_triangles() {
    let mesh = create_unit_square_tri_mesh(1);
    let topology = mesh.topology();
    assert_eq!(topology.num_cells(), 2);
    assert_eq!(topology.num_vertices(), 4);
    assert_eq!(topology.num_edges(), 5);
    assert_eq!(topology.cell_vertices(1), &[0, 3, 2]);
    assert_eq!(topology.cell_edges(0), &[0, 1, 2]);
    assert_eq!(topology.cell_edges(1), &[3, 4, 1]);
    assert_eq!(topology.edge_vertices()[1], [0, 3]);
    assert_eq!(topology.edge_vertices()[3], [2, 3]);
}

#[test]
fn p1_dofs_coincide_with_vertices() {
    let dofmap = build(FiniteElement::lagrange(CellType::Triangle, 1).unwrap());
    assert_eq!(dofmap.index_map().size_local(), 4);
    assert_eq!(dofmap.cell_dimension(), 3);
    assert_eq!(dofmap.cell_dofs(0), &[0, 1, 3]);
    assert_eq!(dofmap.cell_dofs(1), &[0, 3, 2]);
    assert_eq!(dofmap.cell_signs(0), None);
}

#[test]
fn p2_dofs_number_vertices_before_edges() {
    let dofmap = build(FiniteElement::lagrange(CellType::Triangle, 2).unwrap());
    assert_eq!(dofmap.index_map().size_local(), 9);
    assert_eq!(dofmap.cell_dofs(0), &[0, 1, 3, 4, 5, 6]);
    assert_eq!(dofmap.cell_dofs(1), &[0, 3, 2, 7, 8, 5]);
}

#[test]
fn interval_p2_dofs_include_cell_interiors() {
    let mesh = create_unit_interval_mesh(3);
    let element = Arc::new(FiniteElement::lagrange(CellType::Interval, 2).unwrap());
    let dofmap = DofMap::build(mesh.topology(), element).unwrap();
    assert_eq!(dofmap.index_map().size_local(), 7);
    assert_eq!(dofmap.cell_dofs(2), &[2, 3, 6]);
}

#[test]
fn discontinuous_dofs_are_not_shared() {
    let dofmap = build(FiniteElement::discontinuous_lagrange(CellType::Triangle, 1).unwrap());
    assert_eq!(dofmap.index_map().size_local(), 6);
    assert_eq!(dofmap.cell_dofs(0), &[0, 1, 2]);
    assert_eq!(dofmap.cell_dofs(1), &[3, 4, 5]);
}

#[test]
fn edge_dofs_carry_orientation_signs() {
    let dofmap = build(FiniteElement::raviart_thomas(CellType::Triangle).unwrap());
    assert_eq!(dofmap.index_map().size_local(), 5);
    assert_eq!(dofmap.cell_dofs(0), &[0, 1, 2]);
    assert_eq!(dofmap.cell_dofs(1), &[3, 4, 1]);
    assert_eq!(dofmap.cell_signs(0), Some(&[1, 1, 1][..]));
    // Local edge 0 of cell 1 runs from vertex 3 to vertex 2
    assert_eq!(dofmap.cell_signs(1), Some(&[-1, 1, 1][..]));
}

#[test]
fn blocked_dofs_are_interleaved() {
    let p1 = FiniteElement::lagrange(CellType::Triangle, 1).unwrap();
    let dofmap = build(FiniteElement::vector(p1, 2).unwrap());
    assert_eq!(dofmap.index_map().size_local(), 8);
    assert_eq!(dofmap.cell_dofs(0), &[0, 1, 2, 3, 6, 7]);

    let y = dofmap.sub(1).unwrap();
    assert_eq!(y.cell_dimension(), 3);
    assert_eq!(y.cell_dofs(0), &[1, 3, 7]);
    assert_eq!(y.cell_dofs(1), &[1, 7, 5]);
    assert!(Arc::ptr_eq(y.index_map(), dofmap.index_map()));
}

#[test]
fn mixed_dofs_are_numbered_per_sub_element() {
    let p2 = FiniteElement::lagrange(CellType::Triangle, 2).unwrap();
    let p1 = FiniteElement::lagrange(CellType::Triangle, 1).unwrap();
    let dofmap = build(FiniteElement::mixed(vec![FiniteElement::vector(p2, 2).unwrap(), p1]).unwrap());
    assert_eq!(dofmap.index_map().size_local(), 22);
    assert_eq!(dofmap.num_sub_dofmaps(), 2);

    let pressure = dofmap.sub(1).unwrap();
    assert_eq!(pressure.cell_dofs(0), &[18, 19, 21]);
    assert_eq!(pressure.cell_dofs(1), &[18, 21, 20]);

    let velocity_y = dofmap.sub(0).unwrap().sub(1).unwrap();
    assert_eq!(velocity_y.cell_dofs(0), &[1, 3, 7, 9, 11, 13]);

    assert_eq!(
        dofmap.sub(2).unwrap_err(),
        FunctionError::InvalidComponent {
            component: 2,
            num_sub_spaces: 2
        }
    );
}

#[test]
fn collapse_numbers_dofs_by_first_appearance() {
    let p2 = FiniteElement::lagrange(CellType::Triangle, 2).unwrap();
    let p1 = FiniteElement::lagrange(CellType::Triangle, 1).unwrap();
    let dofmap = build(FiniteElement::mixed(vec![FiniteElement::vector(p2, 2).unwrap(), p1]).unwrap());
    let (collapsed, permutation) = dofmap.sub(1).unwrap().collapse();
    assert_eq!(permutation, vec![18, 19, 21, 20]);
    assert_eq!(collapsed.index_map().size_local(), 4);
    assert_eq!(collapsed.cell_dofs(0), &[0, 1, 2]);
    assert_eq!(collapsed.cell_dofs(1), &[0, 2, 3]);
}

#[test]
fn collapse_keeps_ghosts_after_owned_dofs() {
    let element = Arc::new(FiniteElement::lagrange(CellType::Triangle, 1).unwrap());
    let index_map = IndexMap::with_ghosts(10..13, vec![20, 5], vec![1, 0]).unwrap();
    let dofmap = DofMap::from_cell_dofs(element, Arc::new(index_map), vec![0, 3, 1, 0, 1, 4], None).unwrap();

    let (collapsed, permutation) = dofmap.collapse();
    assert_eq!(permutation, vec![0, 1, 3, 4]);
    let index_map = collapsed.index_map();
    assert_eq!(index_map.local_range(), 10..12);
    assert_eq!(index_map.ghosts(), &[20, 5]);
    assert_eq!(index_map.ghost_owners(), &[1, 0]);
    assert_eq!(collapsed.cell_dofs(0), &[0, 2, 1]);
    assert_eq!(collapsed.cell_dofs(1), &[0, 1, 3]);
}

#[test]
fn explicit_dofmaps_are_validated() {
    let element = Arc::new(FiniteElement::lagrange(CellType::Triangle, 1).unwrap());
    let index_map = Arc::new(IndexMap::new(3));
    assert!(DofMap::from_cell_dofs(Arc::clone(&element), Arc::clone(&index_map), vec![0, 1], None).is_err());
    assert!(DofMap::from_cell_dofs(Arc::clone(&element), Arc::clone(&index_map), vec![0, 1, 3], None).is_err());
    assert!(DofMap::from_cell_dofs(element, index_map, vec![0, 1, 2], Some(vec![1])).is_err());

    assert!(IndexMap::with_ghosts(0..3, vec![1], vec![0]).is_err());
    assert!(IndexMap::with_ghosts(0..3, vec![4], vec![]).is_err());
}
