//! Sample: the set of bands (possibly across acquisition dates) plus a label
//! that together form one training example.
//!
//! A sample builds an index over its bands at construction time: distinct
//! dates sorted ascending, distinct band descriptors sorted by canonical
//! name, and a dense `n_dates x n_bands` grid of band slots. Packing
//! assembles selected cells of that grid into dense aligned arrays.

use ndarray::{concatenate, stack, Array3, Array4, Axis};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{Result, TerrabenchError};
use crate::formats::{self, SampleFormat};
use crate::models::band::{format_date, AcquisitionDate, Band, BandInfo};
use crate::processing;

/// Label of a sample: either a raster band whose descriptor is a label kind,
/// or an arbitrary JSON value (e.g. a class index or a structured record).
#[derive(Debug, Clone)]
pub enum Label {
    Raster(Band),
    Value(serde_json::Value),
}

/// Options for [`Sample::pack_to_4d`] and [`Sample::pack_to_3d`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Subset of dates to select. `None` selects all dates in index order.
    pub dates: Option<Vec<Option<AcquisitionDate>>>,
    /// Subset of bands to select, by canonical name or any alias.
    /// `None` selects all bands in canonical-name order.
    pub band_names: Option<Vec<String>>,
    /// Resample bands smaller than the target shape instead of failing.
    pub resample: bool,
    /// Fill missing (date, band) cells with this value instead of failing.
    pub fill_value: Option<f32>,
    /// Interpolation order passed to [`processing::zoom`].
    pub resample_order: usize,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            dates: None,
            band_names: None,
            resample: false,
            fill_value: None,
            resample_order: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sample {
    bands: Vec<Band>,
    label: Option<Label>,
    sample_name: String,
    dates: Vec<Option<AcquisitionDate>>,
    date_map: HashMap<Option<AcquisitionDate>, usize>,
    band_infos: Vec<BandInfo>,
    band_name_map: HashMap<String, usize>,
    /// Dense `n_dates x n_bands` grid, row-major, holding indices into `bands`.
    grid: Vec<Option<usize>>,
}

impl Sample {
    /// Build a sample and its band index.
    ///
    /// Two bands falling on the same (date, canonical name) cell are
    /// rejected with [`TerrabenchError::DuplicateBand`].
    pub fn new(bands: Vec<Band>, label: Option<Label>, sample_name: &str) -> Result<Self> {
        let date_set: BTreeSet<Option<AcquisitionDate>> =
            bands.iter().map(|band| band.date().copied()).collect();
        let dates: Vec<_> = date_set.into_iter().collect();
        let date_map: HashMap<_, _> = dates
            .iter()
            .enumerate()
            .map(|(idx, date)| (*date, idx))
            .collect();

        let info_set: BTreeSet<BandInfo> =
            bands.iter().map(|band| band.band_info().clone()).collect();
        let band_infos: Vec<_> = info_set.into_iter().collect();

        let mut band_name_map = HashMap::new();
        for (idx, info) in band_infos.iter().enumerate() {
            for name in info.all_names() {
                match band_name_map.get(name) {
                    None => {
                        band_name_map.insert(name.to_string(), idx);
                    }
                    Some(&existing) if existing != idx => {
                        tracing::warn!(
                            name,
                            "band name is ambiguous between {} and {}; keeping the first",
                            band_infos[existing].name,
                            info.name
                        );
                    }
                    Some(_) => {}
                }
            }
        }

        let mut grid = vec![None; dates.len() * band_infos.len()];
        for (band_idx, band) in bands.iter().enumerate() {
            let date_idx = date_map[&band.date().copied()];
            let name_idx = band_name_map[&band.band_info().name];
            let slot = &mut grid[date_idx * band_infos.len() + name_idx];
            if slot.is_some() {
                return Err(TerrabenchError::DuplicateBand {
                    name: band.band_info().name.clone(),
                    date: format_date(band.date()),
                });
            }
            *slot = Some(band_idx);
        }

        Ok(Self {
            bands,
            label,
            sample_name: sample_name.to_string(),
            dates,
            date_map,
            band_infos,
            band_name_map,
            grid,
        })
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    pub fn sample_name(&self) -> &str {
        &self.sample_name
    }

    /// Distinct acquisition dates, ascending; an absent date sorts first.
    pub fn dates(&self) -> &[Option<AcquisitionDate>] {
        &self.dates
    }

    /// Distinct band descriptors, sorted by canonical name.
    pub fn band_infos(&self) -> &[BandInfo] {
        &self.band_infos
    }

    /// Canonical band names in index order.
    pub fn band_names(&self) -> Vec<String> {
        self.band_infos.iter().map(|info| info.name.clone()).collect()
    }

    /// Look up a band descriptor by canonical name or alias.
    pub fn get_band_info(&self, band_name: &str) -> Result<&BandInfo> {
        self.band_name_map
            .get(band_name)
            .map(|&idx| &self.band_infos[idx])
            .ok_or_else(|| TerrabenchError::UnknownBand {
                name: band_name.to_string(),
            })
    }

    pub fn is_time_series(&self) -> bool {
        self.dates.len() > 1
    }

    /// Raw sub-selection of the internal (date x band) grid, without packing
    /// or resampling. Returns the grid rows together with the selected dates
    /// and the selected canonical band names.
    pub fn get_band_array(
        &self,
        dates: Option<&[Option<AcquisitionDate>]>,
        band_names: Option<&[String]>,
    ) -> Result<(Vec<Vec<Option<&Band>>>, Vec<Option<AcquisitionDate>>, Vec<String>)> {
        let band_indexes: Vec<usize> = match band_names {
            Some(names) => names
                .iter()
                .map(|name| {
                    self.band_name_map.get(name.as_str()).copied().ok_or_else(|| {
                        TerrabenchError::UnknownBand { name: name.clone() }
                    })
                })
                .collect::<Result<_>>()?,
            None => (0..self.band_infos.len()).collect(),
        };
        let date_indexes: Vec<usize> = match dates {
            Some(dates) => dates
                .iter()
                .map(|date| {
                    self.date_map.get(date).copied().ok_or_else(|| {
                        TerrabenchError::UnknownDate {
                            date: format_date(date.as_ref()),
                        }
                    })
                })
                .collect::<Result<_>>()?,
            None => (0..self.dates.len()).collect(),
        };

        let selected_names = band_indexes
            .iter()
            .map(|&idx| self.band_infos[idx].name.clone())
            .collect();
        let selected_dates = date_indexes.iter().map(|&idx| self.dates[idx]).collect();

        let rows = date_indexes
            .iter()
            .map(|&di| {
                band_indexes
                    .iter()
                    .map(|&bi| {
                        self.grid[di * self.band_infos.len() + bi]
                            .map(|band_idx| &self.bands[band_idx])
                    })
                    .collect()
            })
            .collect();

        Ok((rows, selected_dates, selected_names))
    }

    /// Pack the selected bands into a dense `[n_dates, height, width,
    /// n_channels]` array. Returns the array together with the selected
    /// dates and the expanded per-channel band names.
    ///
    /// The target height/width is the element-wise maximum over all selected
    /// present bands. Absent cells are filled with `fill_value` or fail with
    /// [`TerrabenchError::MissingBand`];
    /// smaller bands are resampled when `resample` is set (uniform zoom
    /// factor required) or fail with [`TerrabenchError::ShapeMismatch`].
    pub fn pack_to_4d(
        &self,
        options: &PackOptions,
    ) -> Result<(Array4<f32>, Vec<Option<AcquisitionDate>>, Vec<String>)> {
        let (rows, dates, names) =
            self.get_band_array(options.dates.as_deref(), options.band_names.as_deref())?;

        let (height, width) = largest_shape(&rows);
        let mut date_planes = Vec::with_capacity(rows.len());
        for (row, date) in rows.iter().zip(&dates) {
            let mut planes: Vec<Array3<f32>> = Vec::with_capacity(row.len());
            for (cell, name) in row.iter().zip(&names) {
                match cell {
                    None => match options.fill_value {
                        Some(fill) => {
                            let channels = self.get_band_info(name)?.n_channels();
                            planes.push(Array3::from_elem((height, width, channels), fill));
                        }
                        None => {
                            return Err(TerrabenchError::MissingBand {
                                band: name.clone(),
                                date: format_date(date.as_ref()),
                            })
                        }
                    },
                    Some(band) => {
                        let data = band.data().to_f32();
                        let (band_height, band_width, _) = data.dim();
                        if (band_height, band_width) == (height, width) {
                            planes.push(data);
                        } else if options.resample {
                            let y_factor = height as f64 / band_height as f64;
                            let x_factor = width as f64 / band_width as f64;
                            if (y_factor - x_factor).abs() > 1e-9 {
                                return Err(TerrabenchError::NonUniformZoom {
                                    band: name.clone(),
                                    y_factor,
                                    x_factor,
                                });
                            }
                            planes.push(processing::zoom(
                                &data,
                                y_factor,
                                options.resample_order,
                            )?);
                        } else {
                            return Err(TerrabenchError::ShapeMismatch {
                                band: name.clone(),
                                actual: (band_height, band_width),
                                expected: (height, width),
                            });
                        }
                    }
                }
            }
            let views: Vec<_> = planes.iter().map(|p| p.view()).collect();
            date_planes.push(concatenate(Axis(2), &views)?);
        }

        let views: Vec<_> = date_planes.iter().map(|p| p.view()).collect();
        let array = stack(Axis(0), &views)?;

        let mut expanded_names = Vec::new();
        for name in &names {
            expanded_names.extend(self.get_band_info(name)?.expand_name());
        }

        Ok((array, dates, expanded_names))
    }

    /// Pack a single-date sample into a `[height, width, n_channels]` array.
    /// Fails with [`TerrabenchError::MultipleDates`] when more than one date
    /// would be selected.
    pub fn pack_to_3d(&self, options: &PackOptions) -> Result<(Array3<f32>, Vec<String>)> {
        let (array, dates, names) = self.pack_to_4d(options)?;
        if dates.len() != 1 {
            return Err(TerrabenchError::MultipleDates {
                sample: self.sample_name.clone(),
                n_dates: dates.len(),
            });
        }
        Ok((array.index_axis_move(Axis(0), 0), names))
    }

    /// Persist this sample under `dataset_dir` in the given encoding.
    pub fn write(&self, dataset_dir: &Path, format: SampleFormat) -> Result<PathBuf> {
        formats::write_sample(self, dataset_dir, format)
    }
}

/// Element-wise maximum height/width across all present bands.
fn largest_shape(rows: &[Vec<Option<&Band>>]) -> (usize, usize) {
    let mut shape = (0, 0);
    for row in rows {
        for band in row.iter().flatten() {
            shape.0 = shape.0.max(band.data().height());
            shape.1 = shape.1.max(band.data().width());
        }
    }
    shape
}
