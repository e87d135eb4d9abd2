//! # Quadratic Program
//!
//! $$
//! \min_x\ \tfrac12 x^\top P x + q^\top x
//! \quad\text{s.t.}\quad Ax = b,\quad Gx \le h
//! $$
//!
//! Dense convex QP handed to the Clarabel interior-point solver in conic form
//!
//! $$
//! \begin{bmatrix} A \\ G \end{bmatrix} x + s = \begin{bmatrix} b \\ h \end{bmatrix},
//! \qquad s \in \{0\}^{p} \times \mathbb{R}_+^{m}.
//! $$

use clarabel::algebra::CscMatrix;
use clarabel::solver::DefaultSettingsBuilder;
use clarabel::solver::DefaultSolver;
use clarabel::solver::IPSolver;
use clarabel::solver::SolverStatus;
use clarabel::solver::SupportedConeT;
use nalgebra::DMatrix;
use nalgebra::DVector;
use tracing::info;

use crate::error::KellyError;
use crate::error::Result;

/// Iteration cap used by the constrained optimizer.
pub const MAX_ITERATIONS: u32 = 100;

/// Primal optimum.
#[derive(Clone, Debug)]
pub struct QpSolution {
  pub x: DVector<f64>,
  pub iterations: usize,
  pub objective: f64,
}

/// Dense convex quadratic program.
#[derive(Clone, Debug)]
pub struct QuadraticProgram {
  p: DMatrix<f64>,
  q: DVector<f64>,
  g: DMatrix<f64>,
  h: DVector<f64>,
  a: DMatrix<f64>,
  b: DVector<f64>,
}

/// Column-compressed copy of `m`, keeping only `i <= j` when `upper` is set.
fn to_csc(m: &DMatrix<f64>, upper: bool) -> CscMatrix<f64> {
  let mut colptr = Vec::with_capacity(m.ncols() + 1);
  let mut rowval = Vec::new();
  let mut nzval = Vec::new();

  colptr.push(0);
  for j in 0..m.ncols() {
    let rows = if upper { (j + 1).min(m.nrows()) } else { m.nrows() };
    for i in 0..rows {
      let v = m[(i, j)];
      if v != 0.0 {
        rowval.push(i);
        nzval.push(v);
      }
    }
    colptr.push(nzval.len());
  }

  CscMatrix::new(m.nrows(), m.ncols(), colptr, rowval, nzval)
}

impl QuadraticProgram {
  /// `P` must be symmetric positive semidefinite; dimensions are checked here.
  pub fn new(
    p: DMatrix<f64>,
    q: DVector<f64>,
    g: DMatrix<f64>,
    h: DVector<f64>,
    a: DMatrix<f64>,
    b: DVector<f64>,
  ) -> Result<Self> {
    let n = q.len();
    if n == 0 {
      return Err(KellyError::Data("quadratic program has no variables".into()));
    }
    if p.shape() != (n, n) {
      return Err(KellyError::Data(format!(
        "P is {}x{} for {n} variables",
        p.nrows(),
        p.ncols()
      )));
    }
    if g.shape() != (h.len(), n) {
      return Err(KellyError::Data(format!(
        "G is {}x{} but h has {} rows and there are {n} variables",
        g.nrows(),
        g.ncols(),
        h.len()
      )));
    }
    if a.shape() != (b.len(), n) {
      return Err(KellyError::Data(format!(
        "A is {}x{} but b has {} rows and there are {n} variables",
        a.nrows(),
        a.ncols(),
        b.len()
      )));
    }

    let finite = p.iter().chain(q.iter()).chain(g.iter()).chain(h.iter());
    if finite.chain(a.iter()).chain(b.iter()).any(|v| !v.is_finite()) {
      return Err(KellyError::Data(
        "quadratic program contains non-finite coefficients".into(),
      ));
    }

    Ok(Self { p, q, g, h, a, b })
  }

  pub fn n_variables(&self) -> usize {
    self.q.len()
  }

  pub fn n_inequalities(&self) -> usize {
    self.h.len()
  }

  pub fn n_equalities(&self) -> usize {
    self.b.len()
  }

  pub fn objective(&self, x: &DVector<f64>) -> f64 {
    0.5 * x.dot(&(&self.p * x)) + self.q.dot(x)
  }

  /// Solve with at most `max_iter` interior-point iterations.
  ///
  /// Any status other than `Solved` is a [`KellyError::Solver`].
  pub fn solve(&self, max_iter: u32) -> Result<QpSolution> {
    let n = self.n_variables();
    let m = self.n_inequalities();
    let p = self.n_equalities();

    // Equalities first, then inequalities, matching the cone order.
    let mut stacked = DMatrix::zeros(p + m, n);
    stacked.view_mut((0, 0), (p, n)).copy_from(&self.a);
    stacked.view_mut((p, 0), (m, n)).copy_from(&self.g);
    let mut rhs: Vec<f64> = self.b.iter().copied().collect();
    rhs.extend(self.h.iter());

    let mut cones = Vec::with_capacity(2);
    if p > 0 {
      cones.push(SupportedConeT::ZeroConeT(p));
    }
    if m > 0 {
      cones.push(SupportedConeT::NonnegativeConeT(m));
    }

    let settings = DefaultSettingsBuilder::default()
      .max_iter(max_iter)
      .verbose(false)
      .build()
      .map_err(|e| KellyError::Solver {
        iterations: 0,
        reason: format!("invalid solver settings: {e}"),
      })?;

    let q: Vec<f64> = self.q.iter().copied().collect();
    let mut solver = DefaultSolver::new(
      &to_csc(&self.p, true),
      &q,
      &to_csc(&stacked, false),
      &rhs,
      &cones,
      settings,
    )
    .map_err(|e| KellyError::Solver {
      iterations: 0,
      reason: format!("failed to set up solver: {e:?}"),
    })?;

    solver.solve();

    let solution = &solver.solution;
    let iterations = solution.iterations as usize;
    if !matches!(solution.status, SolverStatus::Solved) {
      return Err(KellyError::Solver {
        iterations,
        reason: format!("solver stopped with status {:?}", solution.status),
      });
    }

    let x = DVector::from_column_slice(&solution.x);
    let objective = self.objective(&x);
    info!(iterations, objective, "quadratic program solved");

    Ok(QpSolution {
      x,
      iterations,
      objective,
    })
  }
}
