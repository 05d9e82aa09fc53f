//! Basic procedural mesh generation routines.
use crate::cell::CellType;
use crate::mesh::Mesh;

fn build(cell_type: CellType, gdim: usize, coordinates: Vec<f64>, cells: Vec<usize>) -> Mesh {
    Mesh::new(cell_type, gdim, 1, coordinates, cells).expect("Procedural meshes are always valid")
}

/// Uniform mesh of `[0, 1]` with `num_cells` intervals.
pub fn create_unit_interval_mesh(num_cells: usize) -> Mesh {
    let h = 1.0 / num_cells.max(1) as f64;
    let coordinates = (0..=num_cells).map(|i| i as f64 * h).collect();
    let cells = (0..num_cells).flat_map(|i| [i, i + 1]).collect();
    build(CellType::Interval, 1, coordinates, cells)
}

fn rectangle_grid(origin: [f64; 2], extents: [f64; 2], nx: usize, ny: usize) -> Vec<f64> {
    let mut coordinates = Vec::with_capacity(2 * (nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            coordinates.push(origin[0] + extents[0] * i as f64 / nx as f64);
            coordinates.push(origin[1] + extents[1] * j as f64 / ny as f64);
        }
    }
    coordinates
}

/// Axis-aligned rectangle with lower-left corner `origin`, split into `nx x ny` quads.
pub fn create_rectangle_quad_mesh(origin: [f64; 2], extents: [f64; 2], nx: usize, ny: usize) -> Mesh {
    if nx == 0 || ny == 0 {
        return build(CellType::Quadrilateral, 2, Vec::new(), Vec::new());
    }
    let idx = |i: usize, j: usize| (nx + 1) * j + i;
    let mut cells = Vec::with_capacity(4 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            cells.extend([idx(i, j), idx(i + 1, j), idx(i, j + 1), idx(i + 1, j + 1)]);
        }
    }
    build(CellType::Quadrilateral, 2, rectangle_grid(origin, extents, nx, ny), cells)
}

/// Axis-aligned rectangle split into `nx x ny` squares, each cut into two triangles along
/// the diagonal from its lower-left to its upper-right corner.
pub fn create_rectangle_tri_mesh(origin: [f64; 2], extents: [f64; 2], nx: usize, ny: usize) -> Mesh {
    if nx == 0 || ny == 0 {
        return build(CellType::Triangle, 2, Vec::new(), Vec::new());
    }
    let idx = |i: usize, j: usize| (nx + 1) * j + i;
    let mut cells = Vec::with_capacity(6 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            cells.extend([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
            cells.extend([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
        }
    }
    build(CellType::Triangle, 2, rectangle_grid(origin, extents, nx, ny), cells)
}

pub fn create_unit_square_tri_mesh(cells_per_dim: usize) -> Mesh {
    create_rectangle_tri_mesh([0.0, 0.0], [1.0, 1.0], cells_per_dim, cells_per_dim)
}

pub fn create_unit_square_quad_mesh(cells_per_dim: usize) -> Mesh {
    create_rectangle_quad_mesh([0.0, 0.0], [1.0, 1.0], cells_per_dim, cells_per_dim)
}

fn unit_cube_grid(n: usize) -> Vec<f64> {
    let h = 1.0 / n as f64;
    let mut coordinates = Vec::with_capacity(3 * (n + 1).pow(3));
    for k in 0..=n {
        for j in 0..=n {
            for i in 0..=n {
                coordinates.extend([i as f64 * h, j as f64 * h, k as f64 * h]);
            }
        }
    }
    coordinates
}

/// Unit cube split into `n^3` hexahedra.
pub fn create_unit_cube_hex_mesh(cells_per_dim: usize) -> Mesh {
    let n = cells_per_dim;
    if n == 0 {
        return build(CellType::Hexahedron, 3, Vec::new(), Vec::new());
    }
    let idx = |i: usize, j: usize, k: usize| (n + 1) * (n + 1) * k + (n + 1) * j + i;
    let mut cells = Vec::with_capacity(8 * n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                cells.extend([
                    idx(i, j, k),
                    idx(i + 1, j, k),
                    idx(i, j + 1, k),
                    idx(i + 1, j + 1, k),
                    idx(i, j, k + 1),
                    idx(i + 1, j, k + 1),
                    idx(i, j + 1, k + 1),
                    idx(i + 1, j + 1, k + 1),
                ]);
            }
        }
    }
    build(CellType::Hexahedron, 3, unit_cube_grid(n), cells)
}

/// Unit cube split into `n^3` cubes, each cut into six tetrahedra sharing the cube diagonal.
pub fn create_unit_cube_tet_mesh(cells_per_dim: usize) -> Mesh {
    let n = cells_per_dim;
    if n == 0 {
        return build(CellType::Tetrahedron, 3, Vec::new(), Vec::new());
    }
    let idx = |i: usize, j: usize, k: usize| (n + 1) * (n + 1) * k + (n + 1) * j + i;
    let axis_orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    let mut cells = Vec::with_capacity(24 * n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                for order in &axis_orders {
                    let mut corner = [i, j, k];
                    cells.push(idx(corner[0], corner[1], corner[2]));
                    for &axis in order {
                        corner[axis] += 1;
                        cells.push(idx(corner[0], corner[1], corner[2]));
                    }
                }
            }
        }
    }
    build(CellType::Tetrahedron, 3, unit_cube_grid(n), cells)
}
