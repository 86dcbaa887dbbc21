use std::collections::BTreeMap;
use std::f64::consts::PI;

use super::constants::*;
use super::{Corrector, Reflectance};
use crate::config::ConfigError;
use crate::raster::Raster;
use crate::sat_bands::{Band, BandSet, DEGLINT_LONG, DEGLINT_SHORT};
use crate::scene::{Geometry, Scene, SceneError};
use crate::solar::{SunSensor, earth_sun_distance, fresnel_reflectance, rayleigh_phase};

/// Surface elevation used for the pressure correction [m].
#[derive(Debug, Clone)]
pub enum Elevation {
    Constant(f64),
    Grid(Raster),
}

impl Elevation {
    fn at(&self, index: usize) -> f64 {
        match self {
            Elevation::Constant(h) => *h,
            Elevation::Grid(r) => r.buffer.get(index).copied().unwrap_or(f64::NAN),
        }
    }
}

/// Surface pressure [hPa] at elevation `h` metres.
pub fn surface_pressure(h: f64) -> f64 {
    P0_HPA * (1.0 - PRESSURE_LAPSE * h).powf(PRESSURE_EXPONENT)
}

/// Rayleigh optical depth at `wavelength_nm` for surface pressure `p_hpa`.
pub fn rayleigh_optical_depth(wavelength_nm: f64, p_hpa: f64) -> f64 {
    let l = wavelength_nm / 1000.0;
    (p_hpa / P0_HPA)
        * RAYLEIGH_A
        * l.powi(-4)
        * (1.0 + RAYLEIGH_B * l.powi(-2) + RAYLEIGH_C * l.powi(-4))
}

#[derive(Debug, Clone)]
pub struct FullAtmosphericCorrection {
    band_set: BandSet,
    elevation: Elevation,
    default_ozone_du: f64,
    /// Positions of the SWIR deglint pair within the band set.
    short: usize,
    long: usize,
}

/// Positions of the short and long SWIR deglint bands in `bands`.
fn deglint_pair(bands: &[Band]) -> Option<(usize, usize)> {
    let short = bands.iter().position(|b| b.name == DEGLINT_SHORT)?;
    let long = bands.iter().position(|b| b.name == DEGLINT_LONG)?;
    Some((short, long))
}

/// Scene constants of one band.
struct BandTerms {
    band: &'static Band,
    esun: f64,
    ozone_gain: f64,
}

impl FullAtmosphericCorrection {
    pub fn new(
        band_set: BandSet,
        elevation: Elevation,
        default_ozone_du: f64,
    ) -> Result<Self, ConfigError> {
        let (short, long) =
            deglint_pair(band_set.bands()).ok_or_else(|| ConfigError::MissingBand {
                band_set: band_set.to_string(),
                band: format!("{}/{}", DEGLINT_SHORT, DEGLINT_LONG),
            })?;
        Ok(Self {
            band_set,
            elevation,
            default_ozone_du,
            short,
            long,
        })
    }

    pub fn band_set(&self) -> BandSet {
        self.band_set
    }

    fn band_terms(&self, geometry: &Geometry, sun_sensor: &SunSensor) -> Vec<BandTerms> {
        self.band_set
            .bands()
            .iter()
            .map(|band| {
                let ozone_depth = band.ozone_coef * geometry.ozone_du / DU_PER_ATM_CM;
                BandTerms {
                    band,
                    esun: geometry.esun(band.name).unwrap_or(f64::NAN),
                    ozone_gain: (ozone_depth * sun_sensor.air_mass()).exp(),
                }
            })
            .collect()
    }
}

impl Corrector for FullAtmosphericCorrection {
    fn correct(&self, scene: &Scene, scaled: &Reflectance) -> Result<Reflectance, SceneError> {
        let geometry = scene.metadata(self.band_set.names(), self.default_ozone_du)?;

        let mut inputs = Vec::with_capacity(self.band_set.bands().len());
        for band in self.band_set.bands() {
            let raster = scaled
                .bands
                .get(band.name)
                .ok_or_else(|| SceneError::MissingBand {
                    scene: scene.id.clone(),
                    band: band.name.to_string(),
                })?;
            inputs.push(raster);
        }

        let template = inputs[0];
        if inputs.iter().any(|r| !r.same_grid(template)) {
            return Err(SceneError::GridMismatch {
                scene: scene.id.clone(),
                band: "reflectance".to_string(),
            });
        }
        if let Elevation::Grid(dem) = &self.elevation {
            if !dem.same_grid(template) {
                return Err(SceneError::GridMismatch {
                    scene: scene.id.clone(),
                    band: "elevation".to_string(),
                });
            }
        }

        let sun_sensor = SunSensor::new(
            geometry.solar_zenith,
            geometry.solar_azimuth,
            geometry.sensor_zenith,
            geometry.sensor_azimuth,
        );
        let d = earth_sun_distance(geometry.day_of_year());
        let d2 = d * d;
        let terms = self.band_terms(&geometry, &sun_sensor);

        let (cos_direct, cos_reflected) = sun_sensor.scattering_cosines();
        let surface = fresnel_reflectance(sun_sensor.solar_zenith)
            + fresnel_reflectance(sun_sensor.sensor_zenith);
        let phase = rayleigh_phase(cos_direct) + surface * rayleigh_phase(cos_reflected);

        let (short, long) = (self.short, self.long);

        let pixels = template.len();
        let mut outputs = vec![Vec::with_capacity(pixels); terms.len()];
        let mut lrc = vec![0.0; terms.len()];
        let mut tau_r = vec![0.0; terms.len()];

        for i in 0..pixels {
            let pressure = surface_pressure(self.elevation.at(i));

            // Ozone and Rayleigh corrected radiance
            for (k, t) in terms.iter().enumerate() {
                let rho = inputs[k].buffer[i];
                let l_toa = rho * t.esun * sun_sensor.cos_sz / (PI * d2);
                let l_t = l_toa * t.ozone_gain;

                tau_r[k] = rayleigh_optical_depth(t.band.center_nm as f64, pressure);
                let l_r = t.esun * tau_r[k] * phase / (4.0 * PI * sun_sensor.cos_vz);
                lrc[k] = l_t - l_r;
            }

            // Aerosol and glint from the SWIR pair
            let (l_short, e_short) = (lrc[short], terms[short].esun);
            let (l_long, e_long) = (lrc[long], terms[long].esun);
            let epsilon =
                ((l_long / e_long).ln() - (l_short / e_short).ln()) / (SWIR_LONG_NM - SWIR_SHORT_NM);

            for (k, t) in terms.iter().enumerate() {
                let wavelength = t.band.center_nm as f64;
                let l_a = l_long * (t.esun / e_long) * (epsilon * (wavelength - SWIR_LONG_NM)).exp();
                let transmittance = (-tau_r[k] / 2.0 / sun_sensor.cos_vz).exp();
                let l_w = (lrc[k] - l_a) / transmittance;
                let rrs = l_w * d2 / (t.esun * sun_sensor.cos_sz);
                outputs[k].push(if rrs.is_finite() { rrs } else { f64::NAN });
            }
        }

        let bands: BTreeMap<String, Raster> = terms
            .iter()
            .zip(outputs)
            .map(|(t, buffer)| {
                (
                    t.band.name.to_string(),
                    Raster {
                        width: template.width,
                        height: template.height,
                        scale_m: template.scale_m,
                        buffer,
                    },
                )
            })
            .collect();

        log::debug!(
            "Corrected scene {} (d = {:.5} AU, ozone = {} DU)",
            scene.id,
            d,
            geometry.ozone_du
        );

        Ok(Reflectance {
            scene: scene.id.clone(),
            timestamp: scene.timestamp,
            bands,
        })
    }
}
