//! Id to label lookups from the metadata subtables of a dataset.

use log::{debug, trace};

use crate::{
    constants::STOKES_LABELS,
    engine::{EngineError, SubTable, VisTable},
    error::StatsError,
};

/// A row of the SPECTRAL_WINDOW table.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralWindowDescriptor {
    /// row index in the SPECTRAL_WINDOW table
    pub id: i64,
    /// `NAME`
    pub name: String,
    /// `CHAN_FREQ`, one value per channel
    pub channel_freq: Vec<f64>,
    /// `CHAN_WIDTH`, one value per channel
    pub channel_width: Vec<f64>,
}

/// A row of the DATA_DESCRIPTION table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescription {
    /// `SPECTRAL_WINDOW_ID`
    pub spectral_window_id: i64,
    /// `POLARIZATION_ID`
    pub polarization_id: i64,
}

/// The label of a casacore correlation type code, e.g. `9` is `XX`.
///
/// Codes outside the casacore Stokes enumeration become `CORR<code>`.
pub fn correlation_label(code: i32) -> String {
    usize::try_from(code)
        .ok()
        .and_then(|idx| STOKES_LABELS.get(idx))
        .map_or_else(|| format!("CORR{code}"), |label| label.to_string())
}

/// All the lookup tables needed to label flag statistics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatasetMetadata {
    /// antenna names, indexed by antenna id
    pub antenna_names: Vec<String>,
    /// field names, indexed by field id
    pub field_names: Vec<String>,
    /// data descriptions, indexed by data description id
    pub data_descriptions: Vec<DataDescription>,
    /// spectral windows, indexed by spectral window id
    pub spectral_windows: Vec<SpectralWindowDescriptor>,
    /// correlation labels, indexed by polarization id then correlation index
    pub polarizations: Vec<Vec<String>>,
}

fn missing_to_stats(err: EngineError) -> StatsError {
    match err {
        EngineError::MissingSubtable { dataset, subtable } => StatsError::MetadataMissing {
            dataset,
            subtable: subtable.to_string(),
        },
        other => StatsError::Engine(other),
    }
}

impl DatasetMetadata {
    /// Load every metadata subtable of `table`.
    ///
    /// # Errors
    ///
    /// - [`StatsError::MetadataMissing`] if any of ANTENNA, FIELD,
    ///   DATA_DESCRIPTION, SPECTRAL_WINDOW or POLARIZATION is absent.
    /// - [`StatsError::Engine`] if a subtable lacks a column or can't be read.
    pub fn from_table<T: VisTable + ?Sized>(table: &T) -> Result<Self, StatsError> {
        let antenna_names = table
            .read_strings(SubTable::Antenna, "NAME")
            .map_err(missing_to_stats)?;
        let field_names = table
            .read_strings(SubTable::Field, "NAME")
            .map_err(missing_to_stats)?;

        let spw_ids = table
            .read_ints(SubTable::DataDescription, "SPECTRAL_WINDOW_ID")
            .map_err(missing_to_stats)?;
        let pol_ids = table
            .read_ints(SubTable::DataDescription, "POLARIZATION_ID")
            .map_err(missing_to_stats)?;
        let data_descriptions = spw_ids
            .into_iter()
            .zip(pol_ids)
            .map(|(spw, pol)| DataDescription {
                spectral_window_id: spw as i64,
                polarization_id: pol as i64,
            })
            .collect();

        let spw_names = table
            .read_strings(SubTable::SpectralWindow, "NAME")
            .map_err(missing_to_stats)?;
        let chan_freqs = table
            .read_float_arrays(SubTable::SpectralWindow, "CHAN_FREQ")
            .map_err(missing_to_stats)?;
        let chan_widths = table
            .read_float_arrays(SubTable::SpectralWindow, "CHAN_WIDTH")
            .map_err(missing_to_stats)?;
        let spectral_windows = spw_names
            .into_iter()
            .zip(chan_freqs)
            .zip(chan_widths)
            .enumerate()
            .map(
                |(id, ((name, channel_freq), channel_width))| SpectralWindowDescriptor {
                    id: id as i64,
                    name,
                    channel_freq,
                    channel_width,
                },
            )
            .collect();

        let polarizations = table
            .read_int_arrays(SubTable::Polarization, "CORR_TYPE")
            .map_err(missing_to_stats)?
            .into_iter()
            .map(|codes| codes.into_iter().map(correlation_label).collect())
            .collect();

        let result = Self {
            antenna_names,
            field_names,
            data_descriptions,
            spectral_windows,
            polarizations,
        };
        debug!(
            "{}: {} antennas, {} fields, {} data descriptions, {} spectral windows, {} polarizations",
            table.name(),
            result.antenna_names.len(),
            result.field_names.len(),
            result.data_descriptions.len(),
            result.spectral_windows.len(),
            result.polarizations.len()
        );
        trace!("{:?}", result);
        Ok(result)
    }

    /// The name of antenna `antenna_id`.
    ///
    /// # Errors
    ///
    /// [`StatsError::UnresolvedAntenna`] if there is no such antenna.
    pub fn antenna_name(&self, antenna_id: i64) -> Result<&str, StatsError> {
        lookup(&self.antenna_names, antenna_id)
            .map(String::as_str)
            .ok_or(StatsError::UnresolvedAntenna {
                antenna_id,
                num_antennas: self.antenna_names.len(),
            })
    }

    /// The name of field `field_id`.
    ///
    /// # Errors
    ///
    /// [`StatsError::UnresolvedField`] if there is no such field.
    pub fn field_name(&self, field_id: i64) -> Result<&str, StatsError> {
        lookup(&self.field_names, field_id)
            .map(String::as_str)
            .ok_or(StatsError::UnresolvedField {
                field_id,
                num_fields: self.field_names.len(),
            })
    }

    /// The data description `data_desc_id`.
    ///
    /// # Errors
    ///
    /// [`StatsError::UnresolvedDataDescription`] if there is no such row.
    pub fn data_description(&self, data_desc_id: i64) -> Result<&DataDescription, StatsError> {
        lookup(&self.data_descriptions, data_desc_id).ok_or(
            StatsError::UnresolvedDataDescription {
                data_desc_id,
                num_data_descs: self.data_descriptions.len(),
            },
        )
    }

    /// The spectral window id of data description `data_desc_id`.
    ///
    /// # Errors
    ///
    /// [`StatsError::UnresolvedDataDescription`] if there is no such row.
    pub fn spectral_window_id(&self, data_desc_id: i64) -> Result<i64, StatsError> {
        Ok(self.data_description(data_desc_id)?.spectral_window_id)
    }

    /// The spectral window `spectral_window_id`.
    ///
    /// # Errors
    ///
    /// [`StatsError::UnresolvedSpectralWindow`] if there is no such window.
    pub fn spectral_window(
        &self,
        spectral_window_id: i64,
    ) -> Result<&SpectralWindowDescriptor, StatsError> {
        lookup(&self.spectral_windows, spectral_window_id).ok_or(
            StatsError::UnresolvedSpectralWindow {
                spectral_window_id,
                num_spectral_windows: self.spectral_windows.len(),
            },
        )
    }

    /// The correlation labels of data description `data_desc_id`, in
    /// correlation axis order.
    ///
    /// # Errors
    ///
    /// [`StatsError::UnresolvedDataDescription`] or
    /// [`StatsError::UnresolvedPolarization`].
    pub fn correlation_labels(&self, data_desc_id: i64) -> Result<&[String], StatsError> {
        let polarization_id = self.data_description(data_desc_id)?.polarization_id;
        lookup(&self.polarizations, polarization_id)
            .map(Vec::as_slice)
            .ok_or(StatsError::UnresolvedPolarization {
                polarization_id,
                num_polarizations: self.polarizations.len(),
            })
    }
}

fn lookup<T>(values: &[T], id: i64) -> Option<&T> {
    usize::try_from(id).ok().and_then(|idx| values.get(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::MemoryTable, test_common::with_standard_metadata};

    #[test]
    fn test_correlation_label() {
        assert_eq!(correlation_label(1), "I");
        assert_eq!(correlation_label(5), "RR");
        assert_eq!(correlation_label(9), "XX");
        assert_eq!(correlation_label(10), "XY");
        assert_eq!(correlation_label(12), "YY");
        assert_eq!(correlation_label(32), "Pangle");
        assert_eq!(correlation_label(33), "CORR33");
        assert_eq!(correlation_label(-1), "CORR-1");
    }

    #[test]
    fn test_from_table_loads_lookups() {
        let table = with_standard_metadata(MemoryTable::new("meta.ms"), 4);
        let metadata = DatasetMetadata::from_table(&table).unwrap();

        assert_eq!(metadata.antenna_name(0).unwrap(), "Tile000");
        assert_eq!(metadata.field_name(1).unwrap(), "J0408-6545");
        assert_eq!(metadata.spectral_window_id(0).unwrap(), 0);
        assert_eq!(metadata.spectral_window(0).unwrap().channel_freq.len(), 4);
        assert_eq!(metadata.correlation_labels(0).unwrap(), ["XX", "YY"]);
    }

    #[test]
    fn test_unresolved_ids() {
        let table = with_standard_metadata(MemoryTable::new("meta.ms"), 4);
        let metadata = DatasetMetadata::from_table(&table).unwrap();

        assert!(matches!(
            metadata.antenna_name(99),
            Err(StatsError::UnresolvedAntenna { antenna_id: 99, .. })
        ));
        assert!(matches!(
            metadata.antenna_name(-1),
            Err(StatsError::UnresolvedAntenna { antenna_id: -1, .. })
        ));
        assert!(matches!(
            metadata.field_name(2),
            Err(StatsError::UnresolvedField { field_id: 2, .. })
        ));
        assert!(matches!(
            metadata.spectral_window_id(5),
            Err(StatsError::UnresolvedDataDescription { .. })
        ));
        assert!(matches!(
            metadata.spectral_window(5),
            Err(StatsError::UnresolvedSpectralWindow { .. })
        ));
    }

    #[test]
    fn test_missing_subtable_is_metadata_missing() {
        let mut table = with_standard_metadata(MemoryTable::new("meta.ms"), 4);
        table.drop_subtable(SubTable::Field);
        assert!(matches!(
            DatasetMetadata::from_table(&table),
            Err(StatsError::MetadataMissing { subtable, .. }) if subtable == "FIELD"
        ));
    }

    #[test]
    fn test_missing_subtable_column_is_engine_error() {
        let mut table = with_standard_metadata(MemoryTable::new("meta.ms"), 4);
        table.drop_subtable(SubTable::Antenna);
        table.set_string_column(SubTable::Antenna, "STATION", vec!["A".into()]);
        assert!(matches!(
            DatasetMetadata::from_table(&table),
            Err(StatsError::Engine(EngineError::MissingColumn { .. }))
        ));
    }
}
