//! Sun and sensor geometry used by the atmospheric correction.

/// Refractive index of sea water relative to air.
pub const WATER_REFRACTIVE_INDEX: f64 = 1.333;

/// Earth-Sun distance in astronomical units for a day of year, from the
/// orbital eccentricity cosine approximation.
pub fn earth_sun_distance(day_of_year: u32) -> f64 {
    1.0 - 0.01673 * (0.0172 * (day_of_year as f64 - 2.0)).cos()
}

/// Trigonometry of one sun/sensor configuration. Angles are given in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunSensor {
    pub solar_zenith: f64,
    pub sensor_zenith: f64,
    pub cos_sz: f64,
    pub sin_sz: f64,
    pub cos_vz: f64,
    pub sin_vz: f64,
    pub cos_raz: f64,
}

impl SunSensor {
    pub fn new(solar_zenith: f64, solar_azimuth: f64, sensor_zenith: f64, sensor_azimuth: f64) -> Self {
        let (sz, vz) = (solar_zenith.to_radians(), sensor_zenith.to_radians());
        let relative_azimuth = (sensor_azimuth - solar_azimuth).to_radians();

        Self {
            solar_zenith,
            sensor_zenith,
            cos_sz: sz.cos(),
            sin_sz: sz.sin(),
            cos_vz: vz.cos(),
            sin_vz: vz.sin(),
            cos_raz: relative_azimuth.cos(),
        }
    }

    /// Cosines of the two complementary scattering angles: the direct
    /// backscatter path and the path reflected at the water surface.
    pub fn scattering_cosines(&self) -> (f64, f64) {
        let cross = self.sin_sz * self.sin_vz * self.cos_raz;
        let direct = -self.cos_sz * self.cos_vz - cross;
        let reflected = self.cos_sz * self.cos_vz - cross;
        (direct.clamp(-1.0, 1.0), reflected.clamp(-1.0, 1.0))
    }

    /// Two-way slant path factor `1/cos(sz) + 1/cos(vz)`.
    pub fn air_mass(&self) -> f64 {
        1.0 / self.cos_sz + 1.0 / self.cos_vz
    }
}

/// Rayleigh phase function for a scattering angle cosine.
pub fn rayleigh_phase(cos_theta: f64) -> f64 {
    0.75 * (1.0 + cos_theta * cos_theta)
}

/// Unpolarised Fresnel reflectance of the air-water interface for an
/// incidence angle in degrees.
pub fn fresnel_reflectance(incidence_deg: f64) -> f64 {
    let ti = incidence_deg.to_radians();
    if ti.abs() < 1e-9 {
        let r = (WATER_REFRACTIVE_INDEX - 1.0) / (WATER_REFRACTIVE_INDEX + 1.0);
        return r * r;
    }
    let tj = (ti.sin() / WATER_REFRACTIVE_INDEX).asin();
    let s = ((ti - tj).sin() / (ti + tj).sin()).powi(2);
    let p = ((ti - tj).tan() / (ti + tj).tan()).powi(2);
    0.5 * (s + p)
}
