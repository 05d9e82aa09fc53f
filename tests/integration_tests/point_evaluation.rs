use crate::integration_tests::{eval_at, point_field};
use fenris_function::cell::CellType;
use fenris_function::element::FiniteElement;
use fenris_function::function::Function;
use fenris_function::mesh::procedural::create_unit_square_tri_mesh;
use fenris_function::mesh::Mesh;
use fenris_function::space::FunctionSpace;
use matrixcompare::assert_matrix_eq;
use nalgebra::DVector;
use std::sync::Arc;

#[test]
fn linear_field_from_vertex_values() {
    let mesh = Arc::new(create_unit_square_tri_mesh(4));
    let space = FunctionSpace::new(Arc::clone(&mesh), FiniteElement::lagrange(CellType::Triangle, 1).unwrap()).unwrap();
    let u = Function::<f64>::new(space);

    // P1 dofs coincide with vertices
    let vertex_values: Vec<f64> = mesh
        .topology()
        .vertex_nodes()
        .iter()
        .map(|&node| {
            let [x, y, _] = mesh.node(node);
            2.0 * x + 3.0 * y + 1.0
        })
        .collect();
    let dofs: Vec<usize> = (0..vertex_values.len()).collect();
    u.vector().set_local(&dofs, &vertex_values).unwrap();

    let values = eval_at(&u, &[[0.25, 0.5, 0.0], [0.75, 0.75, 0.0]]);
    assert_matrix_eq!(DVector::from_vec(values), DVector::from_vec(vec![3.0, 4.75]), comp = abs, tol = 1e-14);
}

#[test]
fn vector_field_on_the_reference_triangle() {
    let coordinates = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    let mesh = Arc::new(Mesh::new(CellType::Triangle, 2, 1, coordinates, vec![0, 1, 2]).unwrap());
    let p1 = FiniteElement::lagrange(CellType::Triangle, 1).unwrap();
    let space = FunctionSpace::new(mesh, FiniteElement::vector(p1, 2).unwrap()).unwrap();
    let u = Function::<f64>::new(space);
    assert_eq!(u.value_shape(), &[2]);
    assert_eq!(u.value_size(), 2);
    u.interpolate_fn(point_field(2, |p| vec![p[0], p[1]])).unwrap();

    let mut out = vec![0.0; 6];
    u.eval_reference(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], &mut out)
        .unwrap();
    assert_matrix_eq!(
        DVector::from_vec(out),
        DVector::from_vec(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
        comp = abs,
        tol = 1e-15
    );
}

#[test]
fn collapsed_component_of_a_mixed_field() {
    let mesh = Arc::new(create_unit_square_tri_mesh(3));
    let p1 = || FiniteElement::lagrange(CellType::Triangle, 1).unwrap();
    let space = FunctionSpace::new(mesh, FiniteElement::mixed(vec![p1(), p1()]).unwrap()).unwrap();
    let u = Function::<f64>::new(space);
    u.interpolate_fn(point_field(2, |p| vec![p[0], p[1]])).unwrap();

    let ux = u.sub(0).unwrap().collapse().unwrap();
    assert_eq!(ux.vector().len(), 16);
    let values = eval_at(&ux, &[[0.5, 0.5, 0.0]]);
    assert!((values[0] - 0.5).abs() < 1e-14);

    let uy = u.sub(1).unwrap();
    let values = eval_at(&uy, &[[0.2, 0.7, 0.0]]);
    assert!((values[0] - 0.7).abs() < 1e-14);
}

#[test]
fn evaluation_on_a_curved_mesh() {
    // A single quadratic triangle whose hypotenuse bulges outwards
    let coordinates = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.6, 0.6, 0.0, 0.5, 0.5, 0.0];
    let mesh = Arc::new(Mesh::new(CellType::Triangle, 2, 2, coordinates, vec![0, 1, 2, 3, 4, 5]).unwrap());
    let space = FunctionSpace::new(Arc::clone(&mesh), FiniteElement::lagrange(CellType::Triangle, 2).unwrap()).unwrap();
    let u = Function::<f64>::new(space);
    // Quadratic in reference coordinates, so it is reproduced exactly
    u.interpolate_fn(point_field(1, |p| vec![p[0] + 2.0 * p[1]])).unwrap();

    let xi = [0.3, 0.6];
    let x = mesh.push_forward_point(0, &xi);
    let values = eval_at(&u, &[x, [0.1, 0.2, 0.0]]);
    assert!((values[0] - (x[0] + 2.0 * x[1])).abs() < 1e-9);
    assert!((values[1] - 0.5).abs() < 1e-9);
}

#[test]
fn surface_fields_are_evaluated_on_their_cells() {
    // Two triangles folded along the diagonal x = y
    let coordinates = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];
    let mesh = Arc::new(Mesh::new(CellType::Triangle, 3, 1, coordinates, vec![0, 1, 3, 0, 3, 2]).unwrap());
    let space = FunctionSpace::new(mesh, FiniteElement::lagrange(CellType::Triangle, 1).unwrap()).unwrap();
    let u = Function::<f64>::new(space);
    u.interpolate_fn(point_field(1, |p| vec![p[0] - p[1] + p[2]])).unwrap();

    let points = [[0.5, 0.25, 0.25], [0.2, 0.6, 0.2]];
    let values = eval_at(&u, &points);
    assert!((values[0] - 0.5).abs() < 1e-12);
    assert!((values[1] + 0.2).abs() < 1e-12);
}
