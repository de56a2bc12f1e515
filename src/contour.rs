//! Quadrature contours enclosing the search region, and region containment tests.
//!
//! A contour approximates the spectral projector
//! `P = 1/(2πi) ∮ (zB − A)⁻¹ B dz` by the finite sum `Σ w_j (z_jB − A)⁻¹ B`.
//! Interval searches use an ellipse whose major axis is `[Emin, Emax]`; only
//! the upper half is stored because the lower half consists of the conjugate
//! nodes with conjugate weights. Disk searches use a full circle.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{FeastError, Result};
use crate::options::QuadratureRule;

/// Default minor/major axis ratio of the interval ellipse.
pub const DEFAULT_ELLIPSE_RATIO: f64 = 0.3;

/// Fraction of the local node spacing by which a singular node is moved.
const PERTURBATION_FRACTION: f64 = 1e-4;

/// Region of the complex plane searched for eigenvalues.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Region {
    /// Real interval `(emin, emax)`; eigenvalues must be real (Hermitian pencils).
    Interval { emin: f64, emax: f64 },
    /// Closed disk `|λ − center| ≤ radius`.
    Disk { center: Complex64, radius: f64 },
}

impl Region {
    /// Open real interval `(emin, emax)`.
    pub fn interval(emin: f64, emax: f64) -> Self {
        Self::Interval { emin, emax }
    }

    /// Closed disk of given center and radius.
    pub fn disk(center: Complex64, radius: f64) -> Self {
        Self::Disk { center, radius }
    }

    /// Whether `lambda` lies inside the region.
    pub fn contains(&self, lambda: Complex64) -> bool {
        match *self {
            Self::Interval { emin, emax } => inside_contour(lambda.re, emin, emax),
            Self::Disk { center, radius } => inside_gcontour(lambda, center, radius),
        }
    }

    /// Magnitude used to normalize residuals and trace changes.
    pub fn scale(&self) -> f64 {
        let scale = match *self {
            Self::Interval { emin, emax } => emin.abs().max(emax.abs()),
            Self::Disk { center, radius } => center.norm() + radius,
        };
        if scale > 0.0 {
            scale
        } else {
            1.0
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match *self {
            Self::Interval { emin, emax } => {
                if !emin.is_finite() || !emax.is_finite() || emin >= emax {
                    return Err(FeastError::InvalidInterval { emin, emax });
                }
            }
            Self::Disk { center, radius } => {
                if !center.re.is_finite()
                    || !center.im.is_finite()
                    || !radius.is_finite()
                    || radius <= 0.0
                {
                    return Err(FeastError::InvalidDisk { radius });
                }
            }
        }
        Ok(())
    }
}

/// Strict containment in the real interval `(emin, emax)`.
pub fn inside_contour(lambda: f64, emin: f64, emax: f64) -> bool {
    lambda > emin && lambda < emax
}

/// Containment in the closed disk of given center and radius.
pub fn inside_gcontour(lambda: Complex64, center: Complex64, radius: f64) -> bool {
    (lambda - center).norm() <= radius
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Shape {
    /// Upper half ellipse `c + r cos θ + i·ratio·r sin θ`, θ ∈ (0, π).
    HalfEllipse { center: f64, radius: f64, ratio: f64 },
    /// Full circle `c + r e^{iθ}`, θ ∈ (0, 2π).
    Circle { center: Complex64, radius: f64 },
}

impl Shape {
    fn point(&self, theta: f64) -> Complex64 {
        match *self {
            Self::HalfEllipse {
                center,
                radius,
                ratio,
            } => Complex64::new(center + radius * theta.cos(), ratio * radius * theta.sin()),
            Self::Circle { center, radius } => center + Complex64::from_polar(radius, theta),
        }
    }

    fn derivative(&self, theta: f64) -> Complex64 {
        match *self {
            Self::HalfEllipse { radius, ratio, .. } => {
                Complex64::new(-radius * theta.sin(), ratio * radius * theta.cos())
            }
            Self::Circle { radius, .. } => Complex64::i() * Complex64::from_polar(radius, theta),
        }
    }

    /// Length of the parameter range covered by the stored nodes.
    fn span(&self) -> f64 {
        match self {
            Self::HalfEllipse { .. } => PI,
            Self::Circle { .. } => 2.0 * PI,
        }
    }
}

/// Ordered quadrature nodes and weights along a contour.
#[derive(Clone, Debug)]
pub struct Contour {
    nodes: Vec<Complex64>,
    weights: Vec<Complex64>,
    angles: Vec<f64>,
    shape: Shape,
}

impl Contour {
    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the contour holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Quadrature nodes `Zne`.
    pub fn nodes(&self) -> &[Complex64] {
        &self.nodes
    }

    /// Quadrature weights `Wne`, paired by index with [`nodes`](Self::nodes).
    pub fn weights(&self) -> &[Complex64] {
        &self.weights
    }

    /// Whether the lower half of the contour is implied by conjugate symmetry.
    pub fn is_half(&self) -> bool {
        matches!(self.shape, Shape::HalfEllipse { .. })
    }

    /// Node `index` moved a small step along the contour, used to retry a singular shift.
    pub fn perturbed_node(&self, index: usize) -> Complex64 {
        let step = self.shape.span() / self.len() as f64 * PERTURBATION_FRACTION;
        self.shape.point(self.angles[index] + step)
    }

    /// Value of the rational filter at `lambda`: close to one inside the contour, small outside.
    pub fn filter(&self, lambda: Complex64) -> Complex64 {
        self.nodes
            .iter()
            .zip(&self.weights)
            .map(|(&z, &w)| {
                let upper = w / (z - lambda);
                if self.is_half() {
                    upper + w.conj() / (z.conj() - lambda)
                } else {
                    upper
                }
            })
            .sum()
    }
}

/// Builds contours with a configurable quadrature rule and ellipse eccentricity.
#[derive(Clone, Copy, Debug)]
pub struct ContourBuilder {
    /// Node placement along the contour parameter.
    pub rule: QuadratureRule,
    /// Minor/major axis ratio of interval ellipses; ignored for circles.
    pub ellipse_ratio: f64,
}

impl Default for ContourBuilder {
    fn default() -> Self {
        Self {
            rule: QuadratureRule::GaussLegendre,
            ellipse_ratio: DEFAULT_ELLIPSE_RATIO,
        }
    }
}

impl ContourBuilder {
    /// Builder with an explicit rule and ellipse ratio.
    pub fn new(rule: QuadratureRule, ellipse_ratio: f64) -> Self {
        Self {
            rule,
            ellipse_ratio,
        }
    }

    /// Upper half of the ellipse whose major axis is `[emin, emax]`.
    pub fn real(&self, emin: f64, emax: f64, node_count: usize) -> Result<Contour> {
        Region::interval(emin, emax).validate()?;
        if !(self.ellipse_ratio > 0.0) {
            return Err(FeastError::invalid_argument("ellipse ratio must be positive"));
        }
        let shape = Shape::HalfEllipse {
            center: 0.5 * (emin + emax),
            radius: 0.5 * (emax - emin),
            ratio: self.ellipse_ratio,
        };
        assemble(shape, self.rule, node_count)
    }

    /// Full circle of given center and radius.
    pub fn general(&self, center: Complex64, radius: f64, node_count: usize) -> Result<Contour> {
        Region::disk(center, radius).validate()?;
        assemble(Shape::Circle { center, radius }, self.rule, node_count)
    }

    /// Contour enclosing `region`.
    pub fn for_region(&self, region: &Region, node_count: usize) -> Result<Contour> {
        match *region {
            Region::Interval { emin, emax } => self.real(emin, emax, node_count),
            Region::Disk { center, radius } => self.general(center, radius, node_count),
        }
    }
}

/// Gauss–Legendre contour on the ellipse spanning `[emin, emax]` with the default ratio.
pub fn build_real_contour(emin: f64, emax: f64, node_count: usize) -> Result<Contour> {
    ContourBuilder::default().real(emin, emax, node_count)
}

/// Trapezoidal contour on the circle of given center and radius.
pub fn build_general_contour(center: Complex64, radius: f64, node_count: usize) -> Result<Contour> {
    ContourBuilder::new(QuadratureRule::Trapezoidal, 1.0).general(center, radius, node_count)
}

fn assemble(shape: Shape, rule: QuadratureRule, node_count: usize) -> Result<Contour> {
    if node_count == 0 {
        return Err(FeastError::invalid_argument(
            "contour node count must be positive",
        ));
    }
    let span = shape.span();
    let (angles, steps): (Vec<f64>, Vec<f64>) = match rule {
        QuadratureRule::GaussLegendre => {
            let (points, weights) = gauss_legendre(node_count);
            points
                .iter()
                .zip(&weights)
                .map(|(x, g)| (0.5 * span * (1.0 + x), 0.5 * span * g))
                .unzip()
        }
        QuadratureRule::Trapezoidal => {
            let step = span / node_count as f64;
            (0..node_count)
                .map(|j| ((j as f64 + 0.5) * step, step))
                .unzip()
        }
    };

    let scale = Complex64::new(0.0, 2.0 * PI);
    let nodes = angles.iter().map(|&theta| shape.point(theta)).collect();
    let weights = angles
        .iter()
        .zip(&steps)
        .map(|(&theta, &step)| shape.derivative(theta) * step / scale)
        .collect();

    Ok(Contour {
        nodes,
        weights,
        angles,
        shape,
    })
}

/// Gauss–Legendre nodes (ascending) and weights on `[-1, 1]`.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut points = vec![0.0; n];
    let mut weights = vec![0.0; n];
    for i in 0..(n + 1) / 2 {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre(n, x);
        let weight = 2.0 / ((1.0 - x * x) * dp * dp);
        points[i] = -x;
        points[n - 1 - i] = x;
        weights[i] = weight;
        weights[n - 1 - i] = weight;
    }
    (points, weights)
}

/// Legendre polynomial `P_n(x)` and its derivative.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut previous = 1.0;
    let mut current = x;
    for k in 2..=n {
        let k = k as f64;
        let next = ((2.0 * k - 1.0) * x * current - (k - 1.0) * previous) / k;
        previous = current;
        current = next;
    }
    let derivative = n as f64 * (x * current - previous) / (x * x - 1.0);
    (current, derivative)
}
