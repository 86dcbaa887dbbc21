//! Physical constants of the atmospheric correction.

/// Standard sea level pressure [hPa]
pub const P0_HPA: f64 = 1013.25;

/// Barometric formula: `P = P0 * (1 - LAPSE * h)^EXPONENT`, `h` in metres
pub const PRESSURE_LAPSE: f64 = 2.25577e-5;
pub const PRESSURE_EXPONENT: f64 = 5.25588;

/// Rayleigh optical depth `A * λ^-4 * (1 + B * λ^-2 + C * λ^-4)`, `λ` in µm
pub const RAYLEIGH_A: f64 = 0.008569;
pub const RAYLEIGH_B: f64 = 0.0113;
pub const RAYLEIGH_C: f64 = 0.00013;

/// Ozone column unit conversion, Dobson units to atm-cm
pub const DU_PER_ATM_CM: f64 = 1000.0;

/// Wavelengths of the two SWIR bands used for deglinting [nm]
pub const SWIR_SHORT_NM: f64 = 1610.0;
pub const SWIR_LONG_NM: f64 = 2190.0;
