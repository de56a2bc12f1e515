//! FEAST contour-integration eigensolver for dense matrix pencils.
//!
//! The solver computes every eigenpair of `A x = λ B x` lying inside a
//! user-chosen region of the complex plane. A quadrature rule on a contour
//! around the region approximates the spectral projector, which filters a
//! trial subspace; a Rayleigh–Ritz step then extracts the eigenpairs and the
//! loop repeats until the residuals fall below the tolerance.
//!
//! The crate is organised as
//!
//! - parameter arrays and typed options (`params`, `options` modules),
//! - contour construction and node distribution (`contour`, `distribute`),
//! - pencils and the shifted solves they provide (`pencil`),
//! - moment accumulation and its parallel reduction (`moments`, `parallel`),
//! - the reduced eigenproblem and the refinement loop (`projection`, `solving`).
//!
//! Hermitian pencils are searched on a real interval; general pencils on a disk.
//! Contour nodes are independent, so they are split into chunks and solved on a
//! rayon pool. The reduction always sums node contributions in the same order,
//! so the result does not depend on the number of workers.
//!
//! # Quick start
//!
//! ```no_run
//! use feast::{feast, DensePencil, FeastParams, Region};
//! use nalgebra::DMatrix;
//!
//! // Tridiagonal [-1, 2, -1]; eigenvalues 2 - 2cos(kπ/5).
//! let a = DMatrix::from_fn(4, 4, |i, j| match i.abs_diff(j) {
//!     0 => 2.0,
//!     1 => -1.0,
//!     _ => 0.0,
//! });
//! let pencil = DensePencil::from_real(&a).expect("valid pencil");
//!
//! let params = FeastParams::init();
//! let result = feast(&pencil, Region::interval(0.5, 3.0), 3, params.as_slice())
//!     .expect("converged");
//! println!("{} eigenvalues: {:?}", result.m, result.real_eigenvalues());
//! ```
//!
//! The builder route offers typed options and explicit executors:
//!
//! ```no_run
//! use feast::{DensePencil, FeastOptions, FeastProblem, Region};
//! use nalgebra::DMatrix;
//!
//! let a = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]));
//! let pencil = DensePencil::from_real(&a).expect("valid pencil");
//! let options = FeastOptions::default().with_workers(4).with_tolerance(1e-10);
//!
//! let result = FeastProblem::new(&pencil, Region::interval(1.5, 3.5), 3)
//!     .expect("well-formed problem")
//!     .with_options(options)
//!     .solve()
//!     .expect("converged");
//! assert_eq!(result.m, 2);
//! ```

pub mod contour;
pub mod distribute;
pub mod error;
pub mod moments;
pub mod options;
pub mod parallel;
pub mod params;
pub mod pencil;
pub mod problem;
pub mod projection;
pub mod result;
pub mod solving;

pub use contour::{inside_contour, inside_gcontour, Contour, ContourBuilder, Region};
pub use error::{FeastError, Result};
pub use options::{ConvergenceCriterion, FeastOptions, QuadratureRule};
pub use parallel::{ContourExecutor, SerialExecutor, ThreadPoolExecutor};
pub use params::{apply_defaults, validate_disk, validate_input, FeastParams};
pub use pencil::{CMatrix, DensePencil, DensePencilBuilder, Pencil, Symmetry};
pub use problem::{feast, FeastProblem};
pub use result::{FeastInfo, FeastResult};
pub use solving::{ConvergenceController, SolveState};
