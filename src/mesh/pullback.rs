use crate::mesh::Mesh;
use fenris_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use fenris_optimize::newton::{newton, newton_line_search, BacktrackingLineSearch};
use log::{debug, trace};
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use std::error::Error;

/// The residual $F(\xi) = \Phi(\xi) - x$ of the cell map $\Phi$ of a single cell.
struct CellMapResidual<'a> {
    mesh: &'a Mesh,
    cell: usize,
    target: [f64; 3],
}

impl VectorFunction<f64> for CellMapResidual<'_> {
    fn dimension(&self) -> usize {
        self.mesh.geometric_dimension()
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, xi: &DVectorView<f64>) {
        let x = self.mesh.push_forward_point(self.cell, xi.as_slice());
        for a in 0..f.len() {
            f[a] = x[a] - self.target[a];
        }
    }
}

impl DifferentiableVectorFunction<f64> for CellMapResidual<'_> {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        xi: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
    ) -> Result<(), Box<dyn Error>> {
        let j = self.mesh.jacobian_matrix(self.cell, xi.as_slice());
        let solution = if j.is_square() {
            j.lu().solve(rhs)
        } else {
            // Gauss-Newton step for cells embedded in a higher-dimensional space
            let jt = j.transpose();
            (&jt * &j).lu().solve(&(jt * rhs))
        };
        let solution = solution.ok_or("singular cell Jacobian")?;
        sol.copy_from(&solution);
        Ok(())
    }
}

impl Mesh {
    /// Maps the physical point `x` to reference coordinates on `cell`.
    ///
    /// Affine cells are inverted directly. Other cells use damped Newton iterations from the
    /// reference centroid, controlled by the mesh's [`PullbackSettings`](crate::settings::PullbackSettings).
    /// Returns `None` if the iteration does not converge. The result is not tested for
    /// containment in the reference cell.
    pub fn pull_back(&self, cell: usize, x: &[f64; 3]) -> Option<[f64; 3]> {
        let tdim = self.topological_dimension();
        let gdim = self.geometric_dimension();

        if self.is_affine() {
            let origin = self.push_forward_point(cell, &[0.0; 3]);
            let k = &self.jacobian(cell, &[0.0; 3]).k;
            let mut xi = [0.0; 3];
            for d in 0..tdim {
                xi[d] = (0..gdim).map(|a| k[(d, a)] * (x[a] - origin[a])).sum();
            }
            return xi.iter().all(|xi_d| xi_d.is_finite()).then_some(xi);
        }

        let settings = self
            .pullback_settings()
            .newton_settings(self.cell_diameter(cell));
        let residual = CellMapResidual {
            mesh: self,
            cell,
            target: *x,
        };
        let centroid = self.cell_type().reference_centroid();
        let mut xi = DVector::from_column_slice(&centroid[..tdim]);
        let mut f = DVector::zeros(gdim);
        let mut dx = DVector::zeros(tdim);
        // Off-surface points of a manifold cell leave a nonzero residual, which a
        // sufficient-decrease search cannot reduce. Full steps stop on the step tolerance.
        let result = if self.is_manifold() {
            newton(residual, &mut xi, &mut f, &mut dx, settings)
        } else {
            newton_line_search(residual, &mut xi, &mut f, &mut dx, settings, &mut BacktrackingLineSearch::default())
        };

        match result {
            Ok(outcome) => {
                trace!(
                    "Pulled back point {:?} on cell {} in {} iterations",
                    x,
                    cell,
                    outcome.iterations
                );
                let mut result = [0.0; 3];
                result[..tdim].copy_from_slice(xi.as_slice());
                Some(result)
            }
            Err(err) => {
                debug!("Pullback of point {:?} on cell {} failed: {}", x, cell, err);
                None
            }
        }
    }
}
