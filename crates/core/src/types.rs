/// The scalar type used for every coefficient in the library.
pub type Scalar = f64;

/// Number of decimal places kept in reported mating coefficients.
pub const COEFFICIENT_DECIMALS: i32 = 8;

/// Round a coefficient to [`COEFFICIENT_DECIMALS`] places for reporting.
pub fn round_coefficient(value: Scalar) -> Scalar {
    let scale = 10f64.powi(COEFFICIENT_DECIMALS);
    (value * scale).round() / scale
}
