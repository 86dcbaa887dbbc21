use serde::Deserialize;
use std::fmt::Display;

/// Spectral band of the Sentinel-2 MultiSpectral Instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub name: &'static str,
    /// Band centre wavelength [nm]
    pub center_nm: u32,
    /// Ozone absorption coefficient [cm^-1]
    pub ozone_coef: f64,
}

const fn band(name: &'static str, center_nm: u32, ozone_coef: f64) -> Band {
    Band {
        name,
        center_nm,
        ozone_coef,
    }
}

// Bands 1 to 8A, 11 and 12
const STANDARD: &[Band] = &[
    band("B1", 443, 0.0039),
    band("B2", 490, 0.0213),
    band("B3", 560, 0.1052),
    band("B4", 665, 0.0505),
    band("B5", 705, 0.0205),
    band("B6", 740, 0.0112),
    band("B7", 783, 0.0075),
    band("B8", 842, 0.0021),
    band("B8A", 865, 0.0019),
    band("B11", 1610, 0.0),
    band("B12", 2190, 0.0),
];

// Same plus band 9, the narrow water vapour band
const WATER_VAPOUR: &[Band] = &[
    band("B1", 443, 0.0039),
    band("B2", 490, 0.0213),
    band("B3", 560, 0.1052),
    band("B4", 665, 0.0505),
    band("B5", 705, 0.0205),
    band("B6", 740, 0.0112),
    band("B7", 783, 0.0075),
    band("B8", 842, 0.0021),
    band("B8A", 865, 0.0019),
    band("B9", 945, 0.0),
    band("B11", 1610, 0.0),
    band("B12", 2190, 0.0),
];

/// SWIR bands used to estimate the aerosol and glint contribution.
pub const DEGLINT_SHORT: &str = "B11";
pub const DEGLINT_LONG: &str = "B12";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSet {
    #[default]
    Standard,
    WaterVapour,
}

impl BandSet {
    pub fn bands(&self) -> &'static [Band] {
        match self {
            BandSet::Standard => STANDARD,
            BandSet::WaterVapour => WATER_VAPOUR,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.bands().iter().map(|b| b.name)
    }

    pub fn find(&self, name: &str) -> Option<&'static Band> {
        self.bands().iter().find(|b| b.name == name)
    }
}

impl Display for BandSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandSet::Standard => write!(f, "standard"),
            BandSet::WaterVapour => write!(f, "water_vapour"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_water_vapour_set_adds_b9() {
        assert!(BandSet::Standard.find("B9").is_none());
        assert_eq!(BandSet::WaterVapour.find("B9").unwrap().center_nm, 945);
        assert_eq!(
            BandSet::WaterVapour.bands().len(),
            BandSet::Standard.bands().len() + 1
        );
    }

    #[test]
    fn test_deglint_bands_present_in_both_sets() {
        for set in [BandSet::Standard, BandSet::WaterVapour] {
            assert!(set.find(DEGLINT_SHORT).is_some());
            assert!(set.find(DEGLINT_LONG).is_some());
        }
    }
}
