//! The 64-slot FEAST parameter array and its validation helpers.
//!
//! The array form is kept at the public boundary for compatibility with
//! FEAST's `fpm` vector; slot `i` here corresponds to `fpm(i + 1)`. Solver
//! internals read the named [`FeastOptions`](crate::options::FeastOptions)
//! built from it instead.

use num_complex::Complex64;

use crate::error::{FeastError, Result};

/// Number of slots in a parameter array.
pub const PARAM_COUNT: usize = 64;

/// Runtime reporting: 0 silent, 1 verbose.
pub const PRINT_LEVEL: usize = 0;
/// Quadrature nodes on the upper half contour for interval searches.
pub const NODE_COUNT: usize = 1;
/// Tolerance exponent for interval searches (`tol = 10^-value`).
pub const TOLERANCE_EXPONENT: usize = 2;
/// Maximum number of refinement loops.
pub const MAX_LOOPS: usize = 3;
/// 1 when the caller supplies the initial subspace.
pub const INITIAL_SUBSPACE: usize = 4;
/// Convergence criterion: 0 trace, 1 residual.
pub const CONVERGENCE_CRITERION: usize = 5;
/// Tolerance exponent for disk searches.
pub const GENERAL_TOLERANCE_EXPONENT: usize = 6;
/// Quadrature nodes on the full contour for disk searches.
pub const GENERAL_NODE_COUNT: usize = 7;
/// Worker count for contour parallelism: 0 or 1 serial.
pub const WORKER_COUNT: usize = 8;
/// Solver variant: 0 refactor every loop, 1 reuse shifted factorizations.
pub const SOLVER_VARIANT: usize = 9;
/// Quadrature rule for interval searches: 0 Gauss–Legendre, 1 trapezoidal.
pub const QUADRATURE_RULE: usize = 15;
/// Quadrature rule for disk searches: 0 Gauss–Legendre, 1 trapezoidal.
pub const GENERAL_QUADRATURE_RULE: usize = 16;
/// Contour shape: ellipse minor/major axis ratio in percent (100 is a circle).
pub const ELLIPSE_RATIO: usize = 17;

const DEFAULTS: [(usize, i32); 13] = [
    (PRINT_LEVEL, 1),
    (NODE_COUNT, 8),
    (TOLERANCE_EXPONENT, 12),
    (MAX_LOOPS, 20),
    (INITIAL_SUBSPACE, 0),
    (CONVERGENCE_CRITERION, 1),
    (GENERAL_TOLERANCE_EXPONENT, 10),
    (GENERAL_NODE_COUNT, 16),
    (WORKER_COUNT, 0),
    (SOLVER_VARIANT, 1),
    (QUADRATURE_RULE, 0),
    (GENERAL_QUADRATURE_RULE, 1),
    (ELLIPSE_RATIO, 30),
];

/// Whether `value` is acceptable for `slot`. Reserved slots accept anything.
pub(crate) fn slot_is_valid(slot: usize, value: i32) -> bool {
    match slot {
        PRINT_LEVEL | INITIAL_SUBSPACE | CONVERGENCE_CRITERION | SOLVER_VARIANT
        | QUADRATURE_RULE | GENERAL_QUADRATURE_RULE => value == 0 || value == 1,
        NODE_COUNT | GENERAL_NODE_COUNT => value > 0,
        TOLERANCE_EXPONENT | GENERAL_TOLERANCE_EXPONENT => (1..=16).contains(&value),
        MAX_LOOPS | WORKER_COUNT => value >= 0,
        ELLIPSE_RATIO => (1..=100).contains(&value),
        _ => true,
    }
}

fn default_for(slot: usize) -> i32 {
    DEFAULTS
        .iter()
        .find(|(index, _)| *index == slot)
        .map(|(_, value)| *value)
        .unwrap_or(0)
}

/// Fixed-length FEAST parameter array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeastParams([i32; PARAM_COUNT]);

impl FeastParams {
    /// Returns the documented defaults (print level 1, eight nodes, ...).
    pub fn init() -> Self {
        let mut slots = [0; PARAM_COUNT];
        for (slot, value) in DEFAULTS {
            slots[slot] = value;
        }
        Self(slots)
    }

    /// Copies a caller-provided array, rejecting any length other than 64.
    pub fn from_slice(values: &[i32]) -> Result<Self> {
        let slots: [i32; PARAM_COUNT] = values
            .try_into()
            .map_err(|_| FeastError::ParameterLength {
                found: values.len(),
            })?;
        Ok(Self(slots))
    }

    /// Sets a single slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= PARAM_COUNT`.
    pub fn set(&mut self, slot: usize, value: i32) -> &mut Self {
        self.0[slot] = value;
        self
    }

    /// Reads a single slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= PARAM_COUNT`.
    pub fn get(&self, slot: usize) -> i32 {
        self.0[slot]
    }

    /// Resets every out-of-range slot to its default.
    pub fn apply_defaults(&mut self) {
        apply_defaults(&mut self.0);
    }

    /// The 64 slots in order, as passed to [`feast`](crate::feast).
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}

impl Default for FeastParams {
    fn default() -> Self {
        Self::init()
    }
}

impl AsRef<[i32]> for FeastParams {
    fn as_ref(&self) -> &[i32] {
        &self.0
    }
}

/// Corrective pass: overwrites slots holding invalid values with their defaults.
///
/// Never fails; slots beyond the array length are left untouched.
pub fn apply_defaults(params: &mut [i32]) {
    for (slot, value) in params.iter_mut().enumerate() {
        if !slot_is_valid(slot, *value) {
            *value = default_for(slot);
        }
    }
}

fn check_common(n: usize, m0: usize, params: &[i32]) -> Result<()> {
    if n == 0 {
        return Err(FeastError::InvalidDimension { n });
    }
    if m0 == 0 || m0 > n {
        return Err(FeastError::InvalidSubspace { m0, n });
    }
    if params.len() != PARAM_COUNT {
        return Err(FeastError::ParameterLength {
            found: params.len(),
        });
    }
    Ok(())
}

/// Precondition check for an interval search. Pure, called before any numerical work.
pub fn validate_input(n: usize, m0: usize, emin: f64, emax: f64, params: &[i32]) -> Result<bool> {
    check_common(n, m0, params)?;
    if !emin.is_finite() || !emax.is_finite() || emin >= emax {
        return Err(FeastError::InvalidInterval { emin, emax });
    }
    Ok(true)
}

/// Precondition check for a disk search.
pub fn validate_disk(
    n: usize,
    m0: usize,
    center: Complex64,
    radius: f64,
    params: &[i32],
) -> Result<bool> {
    check_common(n, m0, params)?;
    if !center.re.is_finite() || !center.im.is_finite() || !(radius > 0.0) || !radius.is_finite()
    {
        return Err(FeastError::InvalidDisk { radius });
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn slot_outside_the_array_panics() {
        FeastParams::init().set(PARAM_COUNT, 1);
    }

    #[test]
    fn init_sets_documented_defaults() {
        let params = FeastParams::init();
        assert_eq!(params.as_slice().len(), PARAM_COUNT);
        assert_eq!(params.get(PRINT_LEVEL), 1);
        assert_eq!(params.get(NODE_COUNT), 8);
        assert_eq!(params.get(TOLERANCE_EXPONENT), 12);
        assert_eq!(params.get(MAX_LOOPS), 20);
        assert_eq!(params.get(40), 0);
    }

    #[test]
    fn apply_defaults_repairs_sentinels_only() {
        let mut params = FeastParams::init();
        params.set(PRINT_LEVEL, 7).set(NODE_COUNT, -3).set(MAX_LOOPS, 5);
        params.apply_defaults();
        assert_eq!(params.get(PRINT_LEVEL), 1);
        assert_eq!(params.get(NODE_COUNT), 8);
        assert_eq!(params.get(MAX_LOOPS), 5);
    }

    #[test]
    fn apply_defaults_accepts_short_arrays() {
        let mut short = vec![3, 0];
        apply_defaults(&mut short);
        assert_eq!(short, vec![1, 8]);
    }

    #[test]
    fn validate_input_accepts_well_formed_problem() {
        let params = FeastParams::init();
        assert!(validate_input(4, 2, 0.0, 2.0, params.as_slice()).unwrap());
        assert!(validate_input(4, 4, -1.0, 1.0, params.as_slice()).unwrap());
    }

    #[test]
    fn validate_input_rejects_each_violation() {
        let params = FeastParams::init();
        let slots = params.as_slice();
        assert!(matches!(
            validate_input(0, 1, 0.0, 1.0, slots),
            Err(FeastError::InvalidDimension { .. })
        ));
        assert!(matches!(
            validate_input(4, 0, 0.0, 1.0, slots),
            Err(FeastError::InvalidSubspace { .. })
        ));
        assert!(matches!(
            validate_input(4, 5, 0.0, 1.0, slots),
            Err(FeastError::InvalidSubspace { .. })
        ));
        assert!(matches!(
            validate_input(4, 2, 1.0, 1.0, slots),
            Err(FeastError::InvalidInterval { .. })
        ));
        assert!(matches!(
            validate_input(4, 2, 2.0, 1.0, slots),
            Err(FeastError::InvalidInterval { .. })
        ));
        assert!(matches!(
            validate_input(4, 2, 0.0, 1.0, &slots[..63]),
            Err(FeastError::ParameterLength { found: 63 })
        ));
    }

    #[test]
    fn validate_disk_rejects_non_positive_radius() {
        let params = FeastParams::init();
        let center = Complex64::new(1.0, 0.5);
        assert!(validate_disk(4, 2, center, 0.5, params.as_slice()).unwrap());
        assert!(matches!(
            validate_disk(4, 2, center, 0.0, params.as_slice()),
            Err(FeastError::InvalidDisk { .. })
        ));
    }

    #[test]
    fn from_slice_requires_exact_length() {
        assert!(FeastParams::from_slice(&[0; 64]).is_ok());
        assert!(matches!(
            FeastParams::from_slice(&[0; 65]),
            Err(FeastError::ParameterLength { found: 65 })
        ));
    }
}
