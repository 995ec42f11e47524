//! Bijective transforms between the constrained model parameters and the
//! unconstrained space the sampler moves in.
//!
//! Only the supports needed by the ecological inference model are covered:
//! the real line, the positive half-line and the open unit interval.

/// Smallest distance to 0 or 1 a probability may take after the logistic map.
///
/// Without the clamp, `sigmoid(z)` rounds to exactly 1.0 for `z > 37`, and the
/// Beta and Binomial log densities become infinite.
pub const PROB_FLOOR: f64 = 1e-12;

/// Transform of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bijector {
    /// `(-inf, inf)`, `theta = z`.
    Identity,
    /// `(0, inf)`, `theta = exp(z)`, `log|J| = z`.
    Exp,
    /// `(0, 1)`, `theta = 1 / (1 + exp(-z))`, `log|J| = ln(theta) + ln(1 - theta)`.
    Logit,
}

#[inline]
fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

#[inline]
pub fn sigmoid(z: f64) -> f64 {
    let p = if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    };
    p.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR)
}

impl Bijector {
    /// Picks the transform matching the support `(lower, upper)`.
    pub fn from_bounds(bounds: (f64, f64)) -> Bijector {
        match bounds {
            (lo, hi) if lo == 0.0 && hi == 1.0 => Bijector::Logit,
            (lo, hi) if lo == 0.0 && hi == f64::INFINITY => Bijector::Exp,
            _ => Bijector::Identity,
        }
    }

    #[inline]
    pub fn forward(&self, z: f64) -> f64 {
        match self {
            Bijector::Identity => z,
            Bijector::Exp => z.exp(),
            Bijector::Logit => sigmoid(z),
        }
    }

    #[inline]
    pub fn inverse(&self, theta: f64) -> f64 {
        match self {
            Bijector::Identity => theta,
            Bijector::Exp => theta.ln(),
            Bijector::Logit => {
                let p = theta.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR);
                (p / (1.0 - p)).ln()
            }
        }
    }

    /// `log|dtheta/dz|`
    #[inline]
    pub fn log_abs_det_jacobian(&self, z: f64) -> f64 {
        match self {
            Bijector::Identity => 0.0,
            Bijector::Exp => z,
            // ln(sigmoid(z)) + ln(1 - sigmoid(z)) = -softplus(-z) - softplus(z)
            Bijector::Logit => -softplus(-z) - softplus(z),
        }
    }

    /// `d/dz log|dtheta/dz|`
    #[inline]
    pub fn grad_log_abs_det_jacobian(&self, z: f64) -> f64 {
        match self {
            Bijector::Identity => 0.0,
            Bijector::Exp => 1.0,
            Bijector::Logit => 1.0 - 2.0 * sigmoid(z),
        }
    }

    /// `dtheta/dz`
    #[inline]
    pub fn jacobian(&self, z: f64) -> f64 {
        match self {
            Bijector::Identity => 1.0,
            Bijector::Exp => z.exp(),
            Bijector::Logit => {
                let p = sigmoid(z);
                p * (1.0 - p)
            }
        }
    }
}

/// One bijector per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTransform {
    bijectors: Vec<Bijector>,
}

impl ParameterTransform {
    pub fn from_bounds(bounds: &[(f64, f64)]) -> Self {
        ParameterTransform {
            bijectors: bounds.iter().map(|b| Bijector::from_bounds(*b)).collect(),
        }
    }

    pub fn dim(&self) -> usize {
        self.bijectors.len()
    }

    pub fn forward(&self, z: &[f64]) -> Vec<f64> {
        self.bijectors
            .iter()
            .zip(z.iter())
            .map(|(b, &zi)| b.forward(zi))
            .collect()
    }

    pub fn inverse(&self, theta: &[f64]) -> Vec<f64> {
        self.bijectors
            .iter()
            .zip(theta.iter())
            .map(|(b, &ti)| b.inverse(ti))
            .collect()
    }

    pub fn log_abs_det_jacobian(&self, z: &[f64]) -> f64 {
        self.bijectors
            .iter()
            .zip(z.iter())
            .map(|(b, &zi)| b.log_abs_det_jacobian(zi))
            .sum()
    }

    pub fn jacobian_diag(&self, z: &[f64]) -> Vec<f64> {
        self.bijectors
            .iter()
            .zip(z.iter())
            .map(|(b, &zi)| b.jacobian(zi))
            .collect()
    }

    pub fn grad_log_abs_det_jacobian(&self, z: &[f64]) -> Vec<f64> {
        self.bijectors
            .iter()
            .zip(z.iter())
            .map(|(b, &zi)| b.grad_log_abs_det_jacobian(zi))
            .collect()
    }
}
