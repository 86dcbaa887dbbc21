use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bbox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Bbox {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<Self, String> {
        if !(-180.0..=180.0).contains(&xmin) || !(-180.0..=180.0).contains(&xmax) {
            return Err("Longitude values must be between -180 and 180".to_string());
        }

        if !(-90.0..=90.0).contains(&ymin) || !(-90.0..=90.0).contains(&ymax) {
            return Err("Latitude values must be between -90 and 90".to_string());
        }

        if xmin > xmax || ymin > ymax {
            return Err("Min values must be <= max values".to_string());
        }

        Ok(Bbox {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }

    /// Bounding box of a `[lon, lat]` ring.
    pub fn from_ring(ring: &[[f64; 2]]) -> Result<Self, String> {
        if ring.is_empty() {
            return Err("Polygon ring is empty".to_string());
        }
        if ring.iter().flatten().any(|v| !v.is_finite()) {
            return Err("Polygon coordinates must be finite".to_string());
        }

        let (xmin, xmax, ymin, ymax) = ring.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
            |(xmin, xmax, ymin, ymax), &[x, y]| (xmin.min(x), xmax.max(x), ymin.min(y), ymax.max(y)),
        );

        Bbox::new(xmin, xmax, ymin, ymax)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn center_lat(&self) -> f64 {
        (self.ymin + self.ymax) / 2.0
    }
}

#[cfg(test)]
mod test {
    use crate::bbox::Bbox;
    #[test]
    fn test_bbox_coords_are_within_ranges() {
        // Test valid coordinates
        let valid_bbox = Bbox::new(99.14, 99.16, 9.93, 9.95);
        assert!(valid_bbox.is_ok());

        // Test longitude out of range
        let invalid_lon = Bbox::new(-200.0, 0.0, 0.0, 10.0);
        assert!(invalid_lon.is_err());

        let invalid_lon2 = Bbox::new(0.0, 200.0, 0.0, 10.0);
        assert!(invalid_lon2.is_err());

        // Test latitude out of range
        let invalid_lat = Bbox::new(0.0, 10.0, -100.0, 0.0);
        assert!(invalid_lat.is_err());

        let invalid_lat2 = Bbox::new(0.0, 10.0, 0.0, 100.0);
        assert!(invalid_lat2.is_err());

        // Test min > max
        let invalid_order_lon = Bbox::new(10.0, 0.0, 0.0, 10.0);
        assert!(invalid_order_lon.is_err());

        let invalid_order_lat = Bbox::new(0.0, 10.0, 10.0, 0.0);
        assert!(invalid_order_lat.is_err());
    }

    #[test]
    fn test_bbox_from_ring() {
        let ring = [
            [99.1553557, 9.9445364],
            [99.1452277, 9.9403305],
            [99.1457856, 9.9399712],
            [99.1553557, 9.9445364],
        ];
        let bbox = Bbox::from_ring(&ring).unwrap();
        assert_eq!(bbox.xmin, 99.1452277);
        assert_eq!(bbox.xmax, 99.1553557);
        assert_eq!(bbox.ymin, 9.9399712);
        assert_eq!(bbox.ymax, 9.9445364);

        assert!(Bbox::from_ring(&[]).is_err());
        assert!(Bbox::from_ring(&[[f64::NAN, 1.0]]).is_err());
        assert!(Bbox::from_ring(&[[181.0, 1.0], [0.0, 0.0]]).is_err());
    }
}
