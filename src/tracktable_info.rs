use crate::error::TrackTableError;
use crate::options::{FeatureValue, TrackOptions, TrackParameter, TrackType, ValueEncoding};
use crate::reader;
use crate::tracktable_utils::{
    is_recognized_color_name, parse_color_spec, RECOGNIZED_MARKER_TYPES,
};
use indexmap::{IndexMap, IndexSet};
use lazy_static::lazy_static;
use polars::{lazy::prelude::*, prelude::*};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};

// we give each track table a unique program identifier which is the
// order in which it was created.
lazy_static! {
    static ref TRACKTABLE_COUNTER: AtomicU32 = AtomicU32::new(0);
}

fn next_signature() -> u64 {
    (TRACKTABLE_COUNTER.fetch_add(1, Ordering::SeqCst) as u64) << 32
}

/// Ordered map of feature key to decoded [`FeatureValue`] inside one feature
/// group.
pub type FeatureGroup = IndexMap<String, FeatureValue>;
/// Ordered map of feature-group name (`general` for the type-defining column,
/// else the parameter name) to its features, for a single track.
pub type TrackFeatures = IndexMap<String, FeatureGroup>;
/// Ordered map of track name to that track's feature groups.
pub type FeatureMap = IndexMap<String, TrackFeatures>;

/// One decoded row of the parsed metadata table, corresponding to one raw
/// value column of the input.
///
/// ### Fields
///
/// * `track_name` - the track this column belongs to (non-unique; a track may
///   own several columns).
/// * `parameter` - whether this is the track's type-defining row or a named
///   parameter row.
/// * `parameter_value` - the resolved type name, the literal `default` before
///   resolution, or the parameter name. `None` until an untagged type row is
///   resolved.
/// * `feature_list` - the raw feature descriptor tokens of the header, in
///   order, if any.
/// * `attachment` - the host track this column is attached to, if any.
/// * `column_name` - the original header, used as the lookup key back into
///   the table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ColumnMeta {
    pub track_name: String,
    pub parameter: TrackParameter,
    pub parameter_value: Option<String>,
    pub feature_list: Option<Vec<String>>,
    pub attachment: Option<String>,
    pub column_name: String,
}

/// The parsed metadata table: one [`ColumnMeta`] row per raw value column, in
/// the original column order.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct TrackMetadata {
    rows: Vec<ColumnMeta>,
}

impl TrackMetadata {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnMeta> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[ColumnMeta] {
        &self.rows
    }

    /// Returns every distinct track name, in order of first appearance.
    pub fn track_names(&self) -> Vec<String> {
        let mut seen: IndexSet<String> = IndexSet::new();
        for row in &self.rows {
            seen.insert(row.track_name.clone());
        }
        seen.into_iter().collect()
    }

    /// Returns the distinct track names that own a type-defining row, in
    /// order of first appearance of that row.
    pub fn tracks_with_type_row(&self) -> Vec<String> {
        let mut seen: IndexSet<String> = IndexSet::new();
        for row in &self.rows {
            if row.parameter.is_type() {
                seen.insert(row.track_name.clone());
            }
        }
        seen.into_iter().collect()
    }

    /// Returns the distinct names of tracks that have a type-defining row and
    /// no attachment. These are the host tracks of the attachment-resolving
    /// split.
    pub fn independent_tracks(&self) -> Vec<String> {
        let mut seen: IndexSet<String> = IndexSet::new();
        for row in &self.rows {
            if row.parameter.is_type() && row.attachment.is_none() {
                seen.insert(row.track_name.clone());
            }
        }
        seen.into_iter().collect()
    }

    /// Returns the distinct names of tracks whose type-defining row is
    /// attached to `host`. Only direct attachment is considered; chains of
    /// attachments are not followed.
    pub fn attached_to(&self, host: &str) -> Vec<String> {
        let mut seen: IndexSet<String> = IndexSet::new();
        for row in &self.rows {
            if row.parameter.is_type() && row.attachment.as_deref() == Some(host) {
                seen.insert(row.track_name.clone());
            }
        }
        seen.into_iter().collect()
    }

    /// Iterates over all metadata rows of one track, in column order.
    pub fn rows_for_track<'a>(
        &'a self,
        track_name: &'a str,
    ) -> impl Iterator<Item = &'a ColumnMeta> + 'a {
        self.rows.iter().filter(move |r| r.track_name == track_name)
    }

    /// Returns the original column headers owned by one track, in column
    /// order.
    pub fn column_names_for_track(&self, track_name: &str) -> Vec<String> {
        self.rows_for_track(track_name)
            .map(|r| r.column_name.clone())
            .collect()
    }

    /// Returns the resolved [`TrackType`] of a track, or [`None`] if the
    /// track has no type row or its type row is not resolved to a recognized
    /// type yet.
    pub fn track_type(&self, track_name: &str) -> Option<TrackType> {
        self.rows_for_track(track_name)
            .find(|r| r.parameter.is_type())
            .and_then(|r| r.parameter_value.as_deref())
            .and_then(|v| v.parse::<TrackType>().ok())
    }

    /// Renders the metadata table as a [`DataFrame`] with the columns
    /// `track_name`, `parameter`, `parameter_value`, `feature_list`,
    /// `attachment` and `column_name`. This is the parse summary reported
    /// after a successful [`TrackTable::parse`].
    pub fn to_df(&self) -> Result<DataFrame, TrackTableError> {
        let track_names: Vec<&str> = self.rows.iter().map(|r| r.track_name.as_str()).collect();
        let parameters: Vec<&str> = self.rows.iter().map(|r| r.parameter.as_str()).collect();
        let parameter_values: Vec<Option<String>> =
            self.rows.iter().map(|r| r.parameter_value.clone()).collect();
        let attachments: Vec<Option<String>> =
            self.rows.iter().map(|r| r.attachment.clone()).collect();
        let column_names: Vec<&str> = self.rows.iter().map(|r| r.column_name.as_str()).collect();
        let feature_lists: ListChunked = self
            .rows
            .iter()
            .map(|r| {
                r.feature_list
                    .as_ref()
                    .map(|fl| Series::new("".into(), fl.clone()))
            })
            .collect();

        let df = DataFrame::new(vec![
            Column::new("track_name".into(), track_names),
            Column::new("parameter".into(), parameters),
            Column::new("parameter_value".into(), parameter_values),
            Column::from(feature_lists.with_name("feature_list".into()).into_series()),
            Column::new("attachment".into(), attachments),
            Column::new("column_name".into(), column_names),
        ])?;
        Ok(df)
    }
}

/// Represents a track table: a data frame of per-region values for one or
/// more named, typed tracks, together with the decoded per-column metadata.
///
/// The first column of the frame is the scaffold id (a non-unique string key;
/// each row is one start/end-bounded region of a scaffold), followed by the
/// integer `start` and `end` columns and the raw value columns, whose headers
/// encode the track grammar described in [`crate::options::Separators`].
///
/// A freshly constructed table is *unparsed*: the value columns are untyped
/// and no metadata is attached. [`TrackTable::parse`] consumes it and returns
/// the parsed table, in which
///
/// * every value column has been converted according to its resolved type or
///   parameter value (fan-out conversions become struct columns whose fields
///   are the `c0, c1, ...` sub-columns),
/// * the parsed metadata table and the per-track feature dictionary are
///   attached,
/// * `parsed()` reports `true`.
///
/// Parsed tables can be split into independent per-track tables (with or
/// without attachment resolution) or into per-scaffold tables. Every split
/// result owns its data; nothing is shared with the parent.
#[derive(Clone, Debug)]
pub struct TrackTable {
    /// The underlying data frame.
    pub df: DataFrame,
    /// The construction-time options (separators and default track type).
    pub options: TrackOptions,
    /// The parsed metadata table. [`None`] until parsed.
    pub metadata: Option<TrackMetadata>,
    /// The per-track feature dictionary. Empty until parsed.
    pub features: FeatureMap,
    /// Tables of tracks attached to this one, filled by the
    /// attachment-resolving split.
    pub attached: IndexMap<String, TrackTable>,
    /// Names of tracks whose type was auto-detected during parsing.
    pub autodetected: Vec<String>,
    /// Names of tracks that received the configured default type.
    pub defaulted: Vec<String>,
    /// Whether this table went through [`TrackTable::parse`].
    pub parsed: bool,
    /// The process-unique signature of this table. The upper 32 bits are a
    /// sequential construction counter, the lower 32 bits a version bumped on
    /// parse.
    pub signature: u64,
}

impl TrackTable {
    /// Creates a new, unparsed [`TrackTable`] over the provided frame.
    ///
    /// No validation happens here; the structural invariants are checked when
    /// [`TrackTable::parse`] runs.
    pub fn new(df: DataFrame, options: TrackOptions) -> TrackTable {
        TrackTable {
            df,
            options,
            metadata: None,
            features: IndexMap::new(),
            attached: IndexMap::new(),
            autodetected: Vec::new(),
            defaulted: Vec::new(),
            parsed: false,
            signature: next_signature(),
        }
    }

    /// Creates an unparsed [`TrackTable`] from a tab-separated file.
    ///
    /// The file may be gzip compressed; compression is auto-detected. The
    /// first column is read as the scaffold id and `.` is treated as the
    /// missing-value sentinel.
    pub fn from_tsv<P: AsRef<Path>>(
        path: P,
        options: TrackOptions,
    ) -> Result<TrackTable, TrackTableError> {
        let df = reader::tsv::read_track_tsv(path)?;
        Ok(TrackTable::new(df, options))
    }

    /// Get a reference to the underlying [`DataFrame`].
    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    /// Get a mutable reference to the underlying [`DataFrame`].
    pub fn df_mut(&mut self) -> &mut DataFrame {
        &mut self.df
    }

    /// The parsed metadata table, or an [`TrackTableError::Unparsed`] error if
    /// [`TrackTable::parse`] has not run.
    pub fn metadata(&self) -> Result<&TrackMetadata, TrackTableError> {
        self.metadata.as_ref().ok_or(TrackTableError::Unparsed)
    }

    /// The per-track feature dictionary.
    pub fn features(&self) -> &FeatureMap {
        &self.features
    }

    /// Tables of tracks attached to this one. Filled only on the results of
    /// an attachment-resolving split.
    pub fn attached(&self) -> &IndexMap<String, TrackTable> {
        &self.attached
    }

    pub fn parsed(&self) -> bool {
        self.parsed
    }

    pub fn signature(&self) -> u64 {
        self.signature
    }

    /// The name of the scaffold id column (the first column of the frame).
    pub fn scaffold_column_name(&self) -> &str {
        self.df.get_columns()[0].name().as_str()
    }

    /// Returns every distinct scaffold id, in order of first appearance.
    pub fn scaffold_ids(&self) -> Result<Vec<String>, TrackTableError> {
        let ca = self.df.get_columns()[0].str()?;
        let mut seen: IndexSet<String> = IndexSet::new();
        for v in ca.into_iter().flatten() {
            seen.insert(v.to_string());
        }
        Ok(seen.into_iter().collect())
    }

    /// Decodes the track table.
    ///
    /// This runs the full pipeline over the raw frame:
    ///
    /// 1. structural validation of the input invariants;
    /// 2. per-column header grammar parsing into the metadata table;
    /// 3. type auto-detection for type rows without an explicit tag;
    /// 4. default-type assignment for tracks tagged `default` or failing
    ///    detection (requires a configured default track type);
    /// 5. feature-dictionary extraction;
    /// 6. type-specific conversion of every value column and reshaping of the
    ///    frame (fan-out conversions become struct columns).
    ///
    /// Auto-detected and defaulted tracks are reported at warning level; the
    /// full metadata table is reported at info level on success.
    ///
    /// ### Returns
    ///
    /// The parsed table on success. Any failure consumes the input and
    /// surfaces as a [`TrackTableError`]; there is no partially parsed state.
    pub fn parse(mut self) -> Result<TrackTable, TrackTableError> {
        self.check_input_data()?;

        let value_columns: Vec<String> = self
            .df
            .get_columns()
            .iter()
            .skip(3)
            .map(|c| c.name().to_string())
            .collect();

        let mut metadata = parse_column_headers(&value_columns, &self.options);
        let (autodetected, defaulted) =
            resolve_track_types(&self.df, &mut metadata, self.options.default_tracktype)?;
        let features = extract_features(&metadata)?;
        let df = reshape(&self.df, &metadata)?;

        info!("results of track metadata parsing:\n{}", metadata.to_df()?);

        self.df = df;
        self.metadata = Some(metadata);
        self.features = features;
        self.autodetected = autodetected;
        self.defaulted = defaulted;
        self.parsed = true;
        self.signature += 1;
        Ok(self)
    }

    // input data should have scaffold ids in the first column, and the two
    // following columns should be start and end of the region, i.e. integers
    fn check_input_data(&self) -> Result<(), TrackTableError> {
        let empty = self.df.height() == 0;
        let columns = self.df.get_columns();

        if !matches!(columns.first().map(|c| c.dtype()), Some(DataType::String)) {
            return Err(TrackTableError::StructuralValidation(String::from(
                "the scaffold id column (first column) contains non string values",
            )));
        }

        if empty {
            if columns.len() < 3 {
                return Err(TrackTableError::StructuralValidation(String::from(
                    "an empty track table must contain at least the scaffold id, start and end columns",
                )));
            }
        } else if columns.len() < 4 {
            return Err(TrackTableError::StructuralValidation(String::from(
                "a non empty track table must contain the scaffold id, start, end and values for at least a single track",
            )));
        }

        if !columns[1].dtype().is_integer() {
            return Err(TrackTableError::StructuralValidation(String::from(
                "the second column, i.e. 'start', contains non integer values",
            )));
        }
        if !columns[2].dtype().is_integer() {
            return Err(TrackTableError::StructuralValidation(String::from(
                "the third column, i.e. 'end', contains non integer values",
            )));
        }

        if !empty {
            let seps = &self.options.separators;
            for c in &columns[3..] {
                let name = c.name().as_str();
                if name.matches(seps.parameter.as_str()).count() > 1 {
                    return Err(TrackTableError::StructuralValidation(format!(
                        "column name '{}' contains more than one parameter separator '{}'. \
                         Change the parameter separator or rename the column",
                        name, seps.parameter
                    )));
                }
                if name.matches(seps.attachment.as_str()).count() > 1 {
                    return Err(TrackTableError::StructuralValidation(format!(
                        "column name '{}' contains more than one attachment separator '{}'. \
                         Change the attachment separator or rename the column",
                        name, seps.attachment
                    )));
                }
            }
        }

        Ok(())
    }

    /// Returns the two-level view of the current column headers as ordered
    /// `(column name, sub-column name)` pairs.
    ///
    /// Plain columns contribute a single pair whose sub-column name equals
    /// the column name; struct columns contribute one pair per field.
    pub fn column_index(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for c in self.df.get_columns() {
            match c.dtype() {
                DataType::Struct(fields) => {
                    for f in fields {
                        pairs.push((c.name().to_string(), f.name().to_string()));
                    }
                }
                _ => pairs.push((c.name().to_string(), c.name().to_string())),
            }
        }
        pairs
    }

    /// Resolves one sub-column of the reshaped frame.
    ///
    /// For a struct column this extracts the named field; for a plain column
    /// the sub-column name must equal the column name.
    pub fn sub_column(
        &self,
        column_name: &str,
        element: &str,
    ) -> Result<Series, TrackTableError> {
        let column = self.df.column(column_name)?;
        match column.dtype() {
            DataType::Struct(_) => Ok(column
                .as_materialized_series()
                .struct_()?
                .field_by_name(element)?),
            _ if element == column_name => Ok(column.as_materialized_series().clone()),
            _ => Err(TrackTableError::Polars(PolarsError::ColumnNotFound(
                format!("column '{}' has no sub-column '{}'", column_name, element).into(),
            ))),
        }
    }

    /// Splits the parsed table into independent per-track tables.
    ///
    /// With `resolve_attachments` set, only tracks without an attachment are
    /// emitted as hosts, and every track directly attached to a host is
    /// stored as a child table under the host's `attached` map (one level of
    /// nesting; attachment chains are not followed). Without it, one table
    /// per distinct track name is emitted and attachments are ignored.
    ///
    /// Each result owns a copy of its column slice, its metadata rows and its
    /// feature-dictionary slice.
    ///
    /// ### Returns
    ///
    /// The materialized tables in metadata order, or
    /// [`TrackTableError::Unparsed`] if the table was never parsed.
    pub fn split_tracks(
        &self,
        resolve_attachments: bool,
    ) -> Result<Vec<TrackTable>, TrackTableError> {
        self.split_tracks_iter(resolve_attachments)?.collect()
    }

    /// Lazy variant of [`TrackTable::split_tracks`]: produces one table at a
    /// time with identical per-item semantics. The iterator is single pass
    /// and not restartable; dropping it early is always safe.
    pub fn split_tracks_iter(
        &self,
        resolve_attachments: bool,
    ) -> Result<impl Iterator<Item = Result<TrackTable, TrackTableError>> + '_, TrackTableError>
    {
        let metadata = self.metadata()?;
        let names = if resolve_attachments {
            metadata.independent_tracks()
        } else {
            metadata.track_names()
        };
        Ok(names
            .into_iter()
            .map(move |name| self.single_track_table(&name, resolve_attachments)))
    }

    fn single_track_table(
        &self,
        track_name: &str,
        resolve_attachments: bool,
    ) -> Result<TrackTable, TrackTableError> {
        let mut table = self.track_slice(track_name)?;
        if resolve_attachments {
            let metadata = self.metadata()?;
            for attached_name in metadata.attached_to(track_name) {
                let child = self.track_slice(&attached_name)?;
                table.attached.insert(attached_name, child);
            }
        }
        Ok(table)
    }

    // a new table holding scaffold/start/end plus all columns of one track,
    // with that track's metadata rows and feature slice
    fn track_slice(&self, track_name: &str) -> Result<TrackTable, TrackTableError> {
        let metadata = self.metadata()?;
        let columns = self.df.get_columns();
        let mut names: Vec<String> = vec![
            columns[0].name().to_string(),
            columns[1].name().to_string(),
            columns[2].name().to_string(),
        ];
        names.extend(metadata.column_names_for_track(track_name));
        let sub_df = self.df.select(names)?;

        let sub_metadata = TrackMetadata {
            rows: metadata.rows_for_track(track_name).cloned().collect(),
        };
        let mut features: FeatureMap = IndexMap::new();
        if let Some(track_features) = self.features.get(track_name) {
            features.insert(track_name.to_string(), track_features.clone());
        }

        Ok(TrackTable {
            df: sub_df,
            options: self.options.clone(),
            metadata: Some(sub_metadata),
            features,
            attached: IndexMap::new(),
            autodetected: Vec::new(),
            defaulted: Vec::new(),
            parsed: true,
            signature: next_signature(),
        })
    }

    /// Splits the table by scaffold id, producing one table per distinct
    /// scaffold in order of first appearance. Every result keeps the full
    /// column set and a copy of the parent's metadata and features.
    pub fn split_by_scaffolds(&self) -> Result<Vec<TrackTable>, TrackTableError> {
        self.split_by_scaffolds_iter()?.collect()
    }

    /// Lazy variant of [`TrackTable::split_by_scaffolds`].
    pub fn split_by_scaffolds_iter(
        &self,
    ) -> Result<impl Iterator<Item = Result<TrackTable, TrackTableError>> + '_, TrackTableError>
    {
        let ids = self.scaffold_ids()?;
        Ok(ids.into_iter().map(move |id| self.scaffold_slice(&id)))
    }

    fn scaffold_slice(&self, scaffold_id: &str) -> Result<TrackTable, TrackTableError> {
        let ca = self.df.get_columns()[0].str()?;
        let mask: Vec<bool> = ca.into_iter().map(|v| v == Some(scaffold_id)).collect();
        let sub_df = self.df.filter(&BooleanChunked::new("mask".into(), mask))?;
        Ok(TrackTable {
            df: sub_df,
            options: self.options.clone(),
            metadata: self.metadata.clone(),
            features: self.features.clone(),
            attached: self.attached.clone(),
            autodetected: self.autodetected.clone(),
            defaulted: self.defaulted.clone(),
            parsed: self.parsed,
            signature: next_signature(),
        })
    }
}

/// Decodes the raw value-column headers into the metadata table.
///
/// Each header is parsed independently, right to left: the attachment suffix
/// first, then the feature descriptor segments, then the track name and the
/// optional type tag or parameter name. The separator-count invariants are
/// assumed to have been validated already.
pub(crate) fn parse_column_headers(
    column_names: &[String],
    options: &TrackOptions,
) -> TrackMetadata {
    let seps = &options.separators;
    let mut rows = Vec::with_capacity(column_names.len());

    for column_name in column_names {
        // extract the attachment
        let att_parts: Vec<&str> = column_name.split(seps.attachment.as_str()).collect();
        let attachment = if att_parts.len() == 1 {
            None
        } else {
            Some(att_parts[att_parts.len() - 1].to_string())
        };
        let prefix = att_parts[0];

        // extract the subtypes/features
        let sub_parts: Vec<&str> = prefix.split(seps.subtype.as_str()).collect();
        let feature_list = if sub_parts.len() == 1 {
            None
        } else {
            Some(sub_parts[1..].iter().map(|s| s.to_string()).collect())
        };
        let pre_prefix = sub_parts[0];

        // extract the type/parameter
        let par_parts: Vec<&str> = pre_prefix.split(seps.parameter.as_str()).collect();
        let (parameter, parameter_value) = if par_parts.len() == 1 {
            (TrackParameter::Type, None)
        } else if TrackType::is_recognized(par_parts[1]) {
            (TrackParameter::Type, Some(par_parts[1].to_string()))
        } else if par_parts[1] == "default" {
            (TrackParameter::Type, Some(String::from("default")))
        } else {
            // anything else is a parameter name; it lands in the value slot
            (TrackParameter::Parameter, Some(par_parts[1].to_string()))
        };

        rows.push(ColumnMeta {
            track_name: par_parts[0].to_string(),
            parameter,
            parameter_value,
            feature_list,
            attachment,
            column_name: column_name.clone(),
        });
    }

    TrackMetadata { rows }
}

/// Resolves every type row of the metadata table to a concrete track type.
///
/// Untagged type rows go through auto-detection against the raw column
/// values; rows that stay unresolved or were tagged `default` receive the
/// configured default type. Both soft paths emit a warning listing the
/// affected track names. Returns the auto-detected and defaulted track name
/// lists.
pub(crate) fn resolve_track_types(
    df: &DataFrame,
    metadata: &mut TrackMetadata,
    default_tracktype: Option<TrackType>,
) -> Result<(Vec<String>, Vec<String>), TrackTableError> {
    let mut autodetected = Vec::new();
    let mut defaulted = Vec::new();

    let unresolved: Vec<usize> = metadata
        .rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.parameter.is_type() && r.parameter_value.is_none())
        .map(|(i, _)| i)
        .collect();

    if !unresolved.is_empty() {
        let names: Vec<&str> = unresolved
            .iter()
            .map(|&i| metadata.rows[i].track_name.as_str())
            .collect();
        warn!(
            "some tracks ({}) don't have a type preset. Trying auto detection",
            names.join(", ")
        );
        for i in unresolved {
            let column_name = metadata.rows[i].column_name.clone();
            let detected = detect_track_type(df.column(&column_name)?.as_materialized_series());
            match detected {
                Some(track_type) => {
                    autodetected.push(metadata.rows[i].track_name.clone());
                    metadata.rows[i].parameter_value = Some(track_type.as_str().to_string());
                }
                None => {
                    metadata.rows[i].parameter_value = Some(String::from("default"));
                }
            }
        }
    }

    let defaultish: Vec<usize> = metadata
        .rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.parameter.is_type() && r.parameter_value.as_deref() == Some("default"))
        .map(|(i, _)| i)
        .collect();

    if !defaultish.is_empty() {
        let names: Vec<&str> = defaultish
            .iter()
            .map(|&i| metadata.rows[i].track_name.as_str())
            .collect();
        warn!(
            "some tracks ({}) have preset type 'default' or failed auto detection. \
             Assigning the default track type to them",
            names.join(", ")
        );
        let default_tracktype = match default_tracktype {
            Some(tt) => tt,
            None => {
                return Err(TrackTableError::Configuration(format!(
                    "default track type is not set. Set types for the corresponding tracks ({}) \
                     manually in the header",
                    names.join(", ")
                )))
            }
        };
        for i in defaultish {
            defaulted.push(metadata.rows[i].track_name.clone());
            metadata.rows[i].parameter_value = Some(default_tracktype.as_str().to_string());
        }
    }

    Ok((autodetected, defaulted))
}

/// Tries each per-type check in [`TrackType::DETECTION_ORDER`] and returns
/// the first type whose check passes, or [`None`] when nothing matches (the
/// caller then falls back to the default type).
pub(crate) fn detect_track_type(series: &Series) -> Option<TrackType> {
    for track_type in TrackType::DETECTION_ORDER {
        let hit = match track_type {
            TrackType::Marker => check_if_marker(series),
            TrackType::Plot => check_if_plot(series),
            TrackType::Window => check_if_window(series),
            TrackType::Hist => check_if_hist(series),
        };
        debug!("is {}?: {}", track_type, hit);
        if hit {
            return Some(track_type);
        }
    }
    None
}

fn first_non_null_str(ca: &StringChunked) -> Option<&str> {
    ca.into_iter().flatten().next()
}

// values in the column should encode a recognizable marker type
pub(crate) fn check_if_marker(series: &Series) -> bool {
    let ca = match series.str() {
        Ok(ca) => ca,
        Err(_) => return false,
    };
    match first_non_null_str(ca) {
        Some(first) => RECOGNIZED_MARKER_TYPES.contains(&first),
        None => false,
    }
}

// values in the column should be numerical or strings convertible to a
// single numerical value
pub(crate) fn check_if_plot(series: &Series) -> bool {
    let dtype = series.dtype();
    if dtype.is_integer() || dtype.is_float() {
        return series.len() > series.null_count();
    }
    let ca = match series.str() {
        Ok(ca) => ca,
        Err(_) => return false,
    };
    match first_non_null_str(ca) {
        Some(first) => first.trim().parse::<f64>().is_ok(),
        None => false,
    }
}

// values in the column should encode a single color, either a recognizable
// color name or an RGB/RGBA specification
pub(crate) fn check_if_window(series: &Series) -> bool {
    let ca = match series.str() {
        Ok(ca) => ca,
        Err(_) => return false,
    };
    let first = match first_non_null_str(ca) {
        Some(first) => first,
        None => return false,
    };
    if is_recognized_color_name(first) {
        return true;
    }
    if first.contains(',') {
        // comma-separated lists belong to hist columns
        return false;
    }
    parse_color_spec(first).is_some()
}

// values in the column should be strings containing a comma-separated list
// of float values
pub(crate) fn check_if_hist(series: &Series) -> bool {
    let ca = match series.str() {
        Ok(ca) => ca,
        Err(_) => return false,
    };
    let first = match first_non_null_str(ca) {
        Some(first) => first,
        None => return false,
    };
    let tokens: Vec<&str> = first.split(',').collect();
    if tokens.len() < 2 {
        return false;
    }
    tokens.iter().all(|t| t.trim().parse::<f64>().is_ok())
}

/// Builds the per-track feature dictionary from the metadata table.
///
/// Only tracks owning a type row participate. Every metadata row of such a
/// track contributes one feature group: `general` for the type row, the
/// parameter name for parameter rows. A feature token with more than one `=`
/// is a [`TrackTableError::MalformedFeatureToken`].
pub(crate) fn extract_features(
    metadata: &TrackMetadata,
) -> Result<FeatureMap, TrackTableError> {
    let mut features: FeatureMap = IndexMap::new();

    for track_name in metadata.tracks_with_type_row() {
        let mut track_features: TrackFeatures = IndexMap::new();
        for row in metadata.rows_for_track(&track_name) {
            let group = if row.parameter.is_type() {
                String::from("general")
            } else {
                row.parameter_value.clone().unwrap_or_default()
            };
            let mut group_map: FeatureGroup = IndexMap::new();
            if let Some(feature_list) = &row.feature_list {
                for token in feature_list {
                    let parts: Vec<&str> = token.split('=').collect();
                    match parts.len() {
                        1 => {
                            group_map.insert(parts[0].to_string(), FeatureValue::Bool(true));
                        }
                        2 => {
                            group_map.insert(
                                parts[0].to_string(),
                                FeatureValue::from_token_value(parts[1]),
                            );
                        }
                        _ => {
                            return Err(TrackTableError::MalformedFeatureToken(token.clone()));
                        }
                    }
                }
            }
            track_features.insert(group, group_map);
        }
        features.insert(track_name, track_features);
    }

    Ok(features)
}

/// Converts every raw value column according to its resolved type or
/// parameter value and rebuilds the frame as scaffold, start, end, then one
/// output column per raw column in the original order. Raw columns are
/// dropped; fan-out conversions land as struct columns.
pub(crate) fn reshape(
    df: &DataFrame,
    metadata: &TrackMetadata,
) -> Result<DataFrame, TrackTableError> {
    let columns = df.get_columns();
    let mut out: Vec<Column> = vec![
        columns[0].clone(),
        columns[1].clone(),
        columns[2].clone(),
    ];

    for row in metadata.iter() {
        let value = row.parameter_value.as_deref().ok_or_else(|| {
            TrackTableError::UnrecognizedTrackType(format!(
                "track '{}' has no resolved type",
                row.track_name
            ))
        })?;
        let encoding = ValueEncoding::from_parameter_value(value)?;
        let series = df.column(&row.column_name)?.as_materialized_series();
        let column = match encoding {
            ValueEncoding::Marker | ValueEncoding::Window | ValueEncoding::BgColor => {
                Column::from(parse_string_column(series)?)
            }
            ValueEncoding::Plot => Column::from(parse_float_column(series)?),
            ValueEncoding::Hist => {
                struct_column(&row.column_name, parse_float_list_column(series)?)?
            }
            ValueEncoding::Colors => {
                struct_column(&row.column_name, parse_string_list_column(series)?)?
            }
        };
        out.push(column);
    }

    Ok(DataFrame::new(out)?)
}

// string passthrough, single sub-column
pub(crate) fn parse_string_column(series: &Series) -> Result<Series, TrackTableError> {
    Ok(series.clone())
}

// float cast, single sub-column
pub(crate) fn parse_float_column(series: &Series) -> Result<Series, TrackTableError> {
    let out = match series.dtype() {
        DataType::String => {
            let ca = series.str()?;
            let values = ca
                .into_iter()
                .map(|opt| opt.map(|v| v.trim().parse::<f64>()).transpose())
                .collect::<Result<Vec<Option<f64>>, _>>()?;
            Series::new(series.name().clone(), values)
        }
        _ => series.cast(&DataType::Float64)?,
    };
    Ok(out)
}

// comma-split float fan-out; blank and missing tokens become nulls
pub(crate) fn parse_float_list_column(
    series: &Series,
) -> Result<Vec<Series>, TrackTableError> {
    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;
    let mut rows: Vec<Vec<Option<f64>>> = Vec::with_capacity(series.len());
    for opt in ca.into_iter() {
        match opt {
            None => rows.push(vec![None]),
            Some(value) => {
                let mut tokens = Vec::new();
                for token in value.split(',') {
                    let token = token.trim();
                    if token.is_empty() {
                        tokens.push(None);
                    } else {
                        tokens.push(Some(token.parse::<f64>()?));
                    }
                }
                rows.push(tokens);
            }
        }
    }

    let width = rows.iter().map(|r| r.len()).max().unwrap_or(1);
    let mut fields = Vec::with_capacity(width);
    for i in 0..width {
        let values: Vec<Option<f64>> = rows.iter().map(|r| r.get(i).copied().flatten()).collect();
        fields.push(Series::new(format!("c{}", i).into(), values));
    }
    Ok(fields)
}

// comma-split string fan-out; tokens are passed through verbatim
pub(crate) fn parse_string_list_column(
    series: &Series,
) -> Result<Vec<Series>, TrackTableError> {
    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;
    let mut rows: Vec<Vec<Option<String>>> = Vec::with_capacity(series.len());
    for opt in ca.into_iter() {
        match opt {
            None => rows.push(vec![None]),
            Some(value) => rows.push(value.split(',').map(|t| Some(t.to_string())).collect()),
        }
    }

    let width = rows.iter().map(|r| r.len()).max().unwrap_or(1);
    let mut fields = Vec::with_capacity(width);
    for i in 0..width {
        let values: Vec<Option<String>> = rows
            .iter()
            .map(|r| r.get(i).cloned().flatten())
            .collect();
        fields.push(Series::new(format!("c{}", i).into(), values));
    }
    Ok(fields)
}

// assembles the fields of one fan-out conversion into a struct column named
// after the original header
fn struct_column(name: &str, fields: Vec<Series>) -> Result<Column, TrackTableError> {
    let field_names: Vec<String> = fields.iter().map(|s| s.name().to_string()).collect();
    let tmp = DataFrame::new(fields.into_iter().map(Column::from).collect())?;
    let exprs: Vec<Expr> = field_names.iter().map(|n| col(n.as_str())).collect();
    let out = tmp
        .lazy()
        .select([as_struct(exprs).alias(name)])
        .collect()?;
    Ok(out.column(name)?.clone())
}
