//! Core math modules.

pub mod distributions;
pub mod fox_glynn;
pub mod gamma;
pub mod linalg;
pub mod polynomial;
pub mod quadrature;
pub mod stable;
