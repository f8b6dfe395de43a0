//! GSMP reduction math utilities.
//!
//! Pure numeric kernels with no model knowledge. Everything here is a value
//! computation that either succeeds or reports a [`NumericError`].

pub mod error;
pub mod math;

pub use error::{NumericError, NumericResult};
pub use math::distributions;
pub use math::fox_glynn::{fox_glynn, FoxGlynnWeights, DEFAULT_FOX_GLYNN_MAX_ITERATIONS};
pub use math::gamma::{gamma_p, gamma_q, poisson_cdf, poisson_tail};
pub use math::linalg::LuDecomposition;
pub use math::polynomial::{Polynomial, DEFAULT_ROOT_MAX_ITERATIONS};
pub use math::quadrature::{gauss_legendre, GaussLegendreRule, MAX_GAUSS_LEGENDRE_NODES};
pub use math::stable::*;
