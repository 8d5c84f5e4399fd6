//! Band catalogs for common sensors.
//!
//! Converters reuse these descriptors so that datasets derived from the same
//! sensor share canonical band names and aliases, which keeps band selection
//! and statistics comparable across datasets.

use crate::models::band::BandInfo;

/// Sentinel-1 IW GRD product channels: VV/VH complex components and their
/// LEE-filtered derivatives, all at 10m.
pub fn sentinel1_8_bands() -> Vec<BandInfo> {
    [
        "01 - VH.Real",
        "02 - VH.Imaginary",
        "03 - VV.Real",
        "04 - VV.Imaginary",
        "05 - VH.LEE Filtered",
        "06 - VV.LEE Filtered",
        "07 - VH.LEE Filtered.Real",
        "08 - VV.LEE Filtered.Imaginary",
    ]
    .iter()
    .map(|name| BandInfo::plain(name, &[], 10.0))
    .collect()
}

/// The 13 Sentinel-2 L1C bands with centre wavelengths in micrometers and
/// their native resolutions.
pub fn sentinel2_13_bands() -> Vec<BandInfo> {
    vec![
        BandInfo::spectral("01 - Coastal aerosol", &["1", "01"], 60.0, 0.443),
        BandInfo::spectral("02 - Blue", &["2", "02", "blue"], 10.0, 0.49),
        BandInfo::spectral("03 - Green", &["3", "03", "green"], 10.0, 0.56),
        BandInfo::spectral("04 - Red", &["4", "04", "red"], 10.0, 0.665),
        BandInfo::spectral("05 - Vegetation Red Edge", &["5", "05"], 20.0, 0.705),
        BandInfo::spectral("06 - Vegetation Red Edge", &["6", "06"], 20.0, 0.74),
        BandInfo::spectral("07 - Vegetation Red Edge", &["7", "07"], 20.0, 0.783),
        BandInfo::spectral("08 - NIR", &["8", "08", "NIR"], 20.0, 0.842),
        BandInfo::spectral("08A - Vegetation Red Edge", &["8A", "08A"], 20.0, 0.865),
        BandInfo::spectral("09 - Water vapour", &["9", "09"], 60.0, 0.945),
        BandInfo::spectral("10 - SWIR - Cirrus", &["10"], 60.0, 1.375),
        BandInfo::spectral("11 - SWIR", &["11"], 20.0, 1.61),
        BandInfo::spectral("12 - SWIR", &["12"], 20.0, 2.19),
    ]
}

/// Landsat 8/9 OLI and TIRS-1 bands (band 8, the panchromatic band, is
/// omitted as in the source collections).
pub fn landsat8_9_bands() -> Vec<BandInfo> {
    vec![
        BandInfo::spectral("01 - Coastal aerosol", &["1", "01", "B1"], 30.0, 0.443),
        BandInfo::spectral("02 - Blue", &["2", "02", "B2", "blue"], 15.0, 0.482),
        BandInfo::spectral("03 - Green", &["3", "03", "B3", "green"], 15.0, 0.5614),
        BandInfo::spectral("04 - Red", &["4", "04", "B4", "red"], 15.0, 0.6546),
        BandInfo::spectral("05 - NIR", &["5", "05", "B5", "nir"], 30.0, 0.8647),
        BandInfo::spectral("06 - SWIR1", &["6", "06", "B6", "swir1"], 30.0, 1.6089),
        BandInfo::spectral("07 - SWIR2", &["7", "07", "B7", "swir2"], 30.0, 2.2007),
        BandInfo::spectral("09 - Cirrus", &["9", "09", "B9", "cirrus"], 30.0, 1.370),
        BandInfo::spectral("10 - Tirs1", &["10", "B10", "tirs1"], 100.0, 10.9),
    ]
}

/// Plain RGB triple for datasets built from ordinary imagery, at the given
/// resolution. Wavelengths follow the Sentinel-2 visible bands.
pub fn make_rgb_bands(spatial_resolution: f64) -> Vec<BandInfo> {
    vec![
        BandInfo::spectral("Red", &["red"], spatial_resolution, 0.665),
        BandInfo::spectral("Green", &["green"], spatial_resolution, 0.56),
        BandInfo::spectral("Blue", &["blue"], spatial_resolution, 0.49),
    ]
}

/// Cloud probability mask, e.g. the s2cloudless layer shipped with some
/// Sentinel-2 collections.
pub fn cloud_probability(spatial_resolution: f64) -> BandInfo {
    BandInfo::mask("Cloud Probability", &[], spatial_resolution)
}

/// Digital elevation model band.
pub fn elevation(spatial_resolution: f64) -> BandInfo {
    BandInfo::plain("Elevation", &["elevation", "dem"], spatial_resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::band::BandKind;

    #[test]
    fn catalogs_have_unique_names_and_aliases() {
        for catalog in [sentinel1_8_bands(), sentinel2_13_bands(), landsat8_9_bands()] {
            let mut seen = std::collections::HashSet::new();
            for info in &catalog {
                for name in info.all_names() {
                    assert!(seen.insert(name.to_string()), "duplicate name {name}");
                }
            }
        }
    }

    #[test]
    fn sentinel2_red_band() {
        let bands = sentinel2_13_bands();
        let red = bands.iter().find(|b| b.name == "04 - Red").unwrap();
        assert!(red.alt_names.iter().any(|a| a == "red"));
        assert!(matches!(red.kind, BandKind::Spectral { wavelength } if wavelength == 0.665));
    }
}
