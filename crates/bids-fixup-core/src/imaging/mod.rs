pub mod external;

use crate::error::Error;
use std::path::Path;

pub use external::{select_provider, AfniTool, FslTool};

/// Volume count and geometry of an image file.
///
/// The crate decodes no image formats itself; implementations ask a host tool.
pub trait ImageInfoProvider {
    fn name(&self) -> &str;

    fn volume_count(&self, image: &Path) -> Result<u64, Error>;

    /// First three dimensions followed by the first three voxel sizes.
    fn dimensions_and_voxel_sizes(&self, image: &Path) -> Result<Vec<f64>, Error>;
}

/// Geometry values rendered at 3 decimals and joined, for exact comparison.
pub fn geometry_signature(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| {
            let s = format!("{:.3}", v);
            // -0.000 and 0.000 are the same geometry
            if s.trim_start_matches('-').chars().all(|c| c == '0' || c == '.') {
                s.trim_start_matches('-').to_string()
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_signature_rounds_to_three_decimals() {
        let a = geometry_signature(&[64.0, 64.0, 36.0, 3.0001, 3.0004, 3.3]);
        let b = geometry_signature(&[64.0, 64.0, 36.0, 3.0002, 3.0, 3.30004]);
        assert_eq!(a, "64.000,64.000,36.000,3.000,3.000,3.300");
        assert_eq!(a, b);
    }

    #[test]
    fn test_geometry_signature_differs_at_third_decimal() {
        assert_ne!(
            geometry_signature(&[2.0, 2.0, 2.0]),
            geometry_signature(&[2.0, 2.0, 2.01])
        );
    }

    #[test]
    fn test_geometry_signature_negative_zero() {
        assert_eq!(geometry_signature(&[-0.0001]), "0.000");
    }
}
