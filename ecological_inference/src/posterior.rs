//! Log density interface between models and sampling engines.
//!
//! A model exposes its log density in the constrained parameterization; the
//! [`Posterior`] maps it to the unconstrained space:
//!
//! - `logpdf_unconstrained(z) = model.logpdf(transform(z)) + log|J(z)|`
//!
//! The [`Posterior`] is what the `nuts-rs` engine evaluates.

use nuts_rs::{CpuLogpFunc, LogpError};
use snafu::prelude::*;

use crate::transforms::ParameterTransform;

/// A differentiable log density over a flat parameter vector.
///
/// Non-finite values are allowed as return values of [`LogDensityModel::logpdf`]:
/// the engine treats them as regions of zero probability.
pub trait LogDensityModel {
    /// Number of parameters.
    fn dim(&self) -> usize;

    /// One name per parameter, for instance `alpha_dem[0]`.
    fn parameter_names(&self) -> Vec<String>;

    /// Support of each parameter.
    fn parameter_bounds(&self) -> Vec<(f64, f64)>;

    /// A point of the support with a finite log density.
    fn parameter_init(&self) -> Vec<f64>;

    /// Joint log density, up to a constant that does not depend on the parameters.
    fn logpdf(&self, theta: &[f64]) -> f64;

    /// Gradient of [`LogDensityModel::logpdf`].
    fn grad_logpdf(&self, theta: &[f64]) -> Vec<f64>;
}

/// Model log density seen from the unconstrained space.
pub struct Posterior<'a, M: LogDensityModel + ?Sized> {
    model: &'a M,
    transform: ParameterTransform,
}

impl<'a, M: LogDensityModel + ?Sized> Posterior<'a, M> {
    pub fn new(model: &'a M) -> Self {
        let transform = ParameterTransform::from_bounds(&model.parameter_bounds());
        Posterior { model, transform }
    }

    pub fn dim(&self) -> usize {
        self.transform.dim()
    }

    pub fn model(&self) -> &M {
        self.model
    }

    pub fn transform(&self) -> &ParameterTransform {
        &self.transform
    }

    pub fn logpdf_unconstrained(&self, z: &[f64]) -> f64 {
        let theta = self.transform.forward(z);
        self.model.logpdf(&theta) + self.transform.log_abs_det_jacobian(z)
    }

    /// Chain rule with a diagonal Jacobian:
    /// `grad_z[i] = (dtheta_i/dz_i) * grad_theta[i] + d/dz_i log|J_i|`
    pub fn grad_unconstrained(&self, z: &[f64]) -> Vec<f64> {
        let theta = self.transform.forward(z);
        let grad_theta = self.model.grad_logpdf(&theta);
        let jac_diag = self.transform.jacobian_diag(z);
        let grad_log_jac = self.transform.grad_log_abs_det_jacobian(z);

        grad_theta
            .iter()
            .zip(jac_diag.iter())
            .zip(grad_log_jac.iter())
            .map(|((&gt, &jd), &glj)| gt * jd + glj)
            .collect()
    }

    pub fn to_unconstrained(&self, theta: &[f64]) -> Vec<f64> {
        self.transform.inverse(theta)
    }

    pub fn to_constrained(&self, z: &[f64]) -> Vec<f64> {
        self.transform.forward(z)
    }
}

/// Failure of a log density evaluation in the unconstrained space.
#[derive(Debug, Snafu, PartialEq, Clone)]
pub enum DensityError {
    #[snafu(display("log density is not finite: {logp}"))]
    NonFiniteLogp { logp: f64 },

    #[snafu(display("gradient of the log density is not finite at index {index}"))]
    NonFiniteGradient { index: usize },
}

// The sampler rejects the trajectory and flags a divergence.
impl LogpError for DensityError {
    fn is_recoverable(&self) -> bool {
        true
    }
}

impl<'a, M: LogDensityModel + ?Sized> CpuLogpFunc for Posterior<'a, M> {
    type LogpError = DensityError;
    type TransformParams = ();

    fn dim(&self) -> usize {
        self.transform.dim()
    }

    fn logp(&mut self, position: &[f64], gradient: &mut [f64]) -> Result<f64, DensityError> {
        let logp = self.logpdf_unconstrained(position);
        ensure!(logp.is_finite(), NonFiniteLogpSnafu { logp });
        let grad = self.grad_unconstrained(position);
        if let Some(index) = grad.iter().position(|g| !g.is_finite()) {
            return NonFiniteGradientSnafu { index }.fail();
        }
        gradient.copy_from_slice(&grad);
        Ok(logp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A Beta(3, 2) density on a single parameter.
    struct BetaModel;

    impl LogDensityModel for BetaModel {
        fn dim(&self) -> usize {
            1
        }
        fn parameter_names(&self) -> Vec<String> {
            vec!["p".to_string()]
        }
        fn parameter_bounds(&self) -> Vec<(f64, f64)> {
            vec![(0.0, 1.0)]
        }
        fn parameter_init(&self) -> Vec<f64> {
            vec![0.5]
        }
        fn logpdf(&self, theta: &[f64]) -> f64 {
            2.0 * theta[0].ln() + (1.0 - theta[0]).ln()
        }
        fn grad_logpdf(&self, theta: &[f64]) -> Vec<f64> {
            vec![2.0 / theta[0] - 1.0 / (1.0 - theta[0])]
        }
    }

    #[test]
    fn unconstrained_gradient_matches_finite_differences() {
        let posterior = Posterior::new(&BetaModel);
        assert_eq!(posterior.dim(), 1);
        for z in [-1.5, 0.0, 0.8] {
            let h = 1e-6;
            let fd = (posterior.logpdf_unconstrained(&[z + h])
                - posterior.logpdf_unconstrained(&[z - h]))
                / (2.0 * h);
            let g = posterior.grad_unconstrained(&[z])[0];
            assert!((fd - g).abs() < 1e-6, "z={}: fd={} analytic={}", z, fd, g);
        }
    }

    #[test]
    fn unconstrained_mode_of_beta() {
        // In logit space, the density of Beta(3, 2) is p^3 (1 - p)^2, maximal at p = 0.6.
        let posterior = Posterior::new(&BetaModel);
        let z_mode = posterior.to_unconstrained(&[0.6])[0];
        let g = posterior.grad_unconstrained(&[z_mode])[0];
        assert!(g.abs() < 1e-9);
        assert!((posterior.to_constrained(&[z_mode])[0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn engine_density_fills_the_gradient() {
        let mut posterior = Posterior::new(&BetaModel);
        let mut grad = [0.0];
        let logp = CpuLogpFunc::logp(&mut posterior, &[0.3], &mut grad).unwrap();
        assert_eq!(CpuLogpFunc::dim(&posterior), 1);
        assert_eq!(logp, posterior.logpdf_unconstrained(&[0.3]));
        assert_eq!(grad[0], posterior.grad_unconstrained(&[0.3])[0]);
    }

    #[test]
    fn engine_density_rejects_non_finite_values() {
        struct Flat;
        impl LogDensityModel for Flat {
            fn dim(&self) -> usize {
                1
            }
            fn parameter_names(&self) -> Vec<String> {
                vec!["x".to_string()]
            }
            fn parameter_bounds(&self) -> Vec<(f64, f64)> {
                vec![(0.0, 1.0)]
            }
            fn parameter_init(&self) -> Vec<f64> {
                vec![0.5]
            }
            fn logpdf(&self, _theta: &[f64]) -> f64 {
                f64::NEG_INFINITY
            }
            fn grad_logpdf(&self, _theta: &[f64]) -> Vec<f64> {
                vec![0.0]
            }
        }

        let mut posterior = Posterior::new(&Flat);
        let mut grad = [0.0];
        let err = CpuLogpFunc::logp(&mut posterior, &[0.0], &mut grad).unwrap_err();
        assert!(matches!(err, DensityError::NonFiniteLogp { .. }));
        assert!(err.is_recoverable());
    }
}
