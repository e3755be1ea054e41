use crate::error::TrackTableError;

/// Represents the closed set of track types a value column can resolve to.
///
/// Every track in a track table must end up with exactly one of these types,
/// either because the column header carries an explicit type tag, because the
/// type was auto-detected from the column values, or because the configured
/// default type was assigned. The type governs both the structural-validity
/// check used during auto-detection and the value-conversion routine applied
/// while reshaping the table.
///
/// # Variants
///
/// * `Marker` - per-region marker shapes (`rectangle`, `ellipse`, `circle` or
///   their one-letter short forms).
/// * `Plot` - a single numeric value per region, converted to floats.
/// * `Window` - a single color specification per region (a recognized color
///   name, a hex code or a grayscale value).
/// * `Hist` - a comma-separated list of numeric values per region, fanned out
///   into `c0, c1, ...` sub-columns.
///
/// The set is fixed and small, so dispatch is a `match` over this enum rather
/// than a runtime registry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum TrackType {
    Marker,
    Plot,
    Window,
    Hist,
}

impl TrackType {
    /// The fixed order in which the per-type checks are tried during
    /// auto-detection. The first check that passes wins, so this order is the
    /// tie-break when a column would satisfy more than one check.
    pub const DETECTION_ORDER: [TrackType; 4] = [
        TrackType::Marker,
        TrackType::Plot,
        TrackType::Window,
        TrackType::Hist,
    ];

    /// Returns the lowercase name of the track type, as it appears in column
    /// headers and in the parsed metadata table.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackType::Marker => "marker",
            TrackType::Plot => "plot",
            TrackType::Window => "window",
            TrackType::Hist => "hist",
        }
    }

    /// Returns `true` if `s` names a recognized track type.
    pub fn is_recognized(s: &str) -> bool {
        s.parse::<TrackType>().is_ok()
    }
}

impl std::str::FromStr for TrackType {
    type Err = TrackTableError;

    /// Converts from a [`&str`] to the corresponding [`TrackType`]. The error
    /// variant is [`TrackTableError::Configuration`], since an unrecognized
    /// name can only come from configuration; header tags that are not a
    /// recognized type are routed to the parameter branch of the grammar
    /// before this conversion is ever attempted.
    fn from_str(s: &str) -> Result<TrackType, TrackTableError> {
        let tt = match s {
            "marker" => TrackType::Marker,
            "plot" => TrackType::Plot,
            "window" => TrackType::Window,
            "hist" => TrackType::Hist,
            _ => {
                return Err(TrackTableError::Configuration(format!(
                    "unrecognized track type ({}). Allowed track types: marker, plot, window, hist",
                    s
                )))
            }
        };
        Ok(tt)
    }
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of a parsed metadata row: either the type-defining row of a track
/// or an additional named-parameter row attached to the same track name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TrackParameter {
    Type,
    Parameter,
}

impl TrackParameter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackParameter::Type => "type",
            TrackParameter::Parameter => "parameter",
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, TrackParameter::Type)
    }
}

/// The conversion routine selected for one raw value column while reshaping.
///
/// Resolved track types and the recognized parameter values share one dispatch
/// table: `colors` and `bg_color` are parameter value encodings, not track
/// types, but they convert columns the same way the four track types do.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueEncoding {
    Marker,
    Plot,
    Window,
    Hist,
    Colors,
    BgColor,
}

impl ValueEncoding {
    /// Resolves a metadata row's `parameter_value` to its conversion routine.
    ///
    /// Returns [`TrackTableError::UnrecognizedTrackType`] when no routine is
    /// registered for the value, which is how arbitrary parameter names
    /// surface if the table is reshaped with them present.
    pub fn from_parameter_value(value: &str) -> Result<ValueEncoding, TrackTableError> {
        let enc = match value {
            "marker" => ValueEncoding::Marker,
            "plot" => ValueEncoding::Plot,
            "window" => ValueEncoding::Window,
            "hist" => ValueEncoding::Hist,
            "colors" => ValueEncoding::Colors,
            "bg_color" => ValueEncoding::BgColor,
            _ => return Err(TrackTableError::UnrecognizedTrackType(value.to_string())),
        };
        Ok(enc)
    }

    /// Returns `true` for encodings that split each value on commas and fan
    /// out into `c0, c1, ...` sub-columns of a struct column.
    pub fn is_fan_out(&self) -> bool {
        matches!(self, ValueEncoding::Hist | ValueEncoding::Colors)
    }
}

/// The three separator strings of the column header grammar.
///
/// A header is decoded right to left: the text after the attachment separator
/// names the host track this column is attached to, the segments after the
/// subtype separator are feature descriptors, and the leading segment is split
/// on the parameter separator into the track name and an optional type tag or
/// parameter name.
///
/// The defaults match the headers the toolkit's window-counting scripts emit,
/// for example `cov&plot$color=red@geneTrack`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Separators {
    /// Splits the track name from the type tag or parameter name. Default `&`.
    pub parameter: String,
    /// Splits the feature descriptor segments. Default `$`.
    pub subtype: String,
    /// Splits the attachment suffix. Default `@`.
    pub attachment: String,
}

impl Default for Separators {
    fn default() -> Self {
        Separators {
            parameter: String::from("&"),
            subtype: String::from("$"),
            attachment: String::from("@"),
        }
    }
}

impl Separators {
    pub fn new<T: AsRef<str>>(parameter: T, subtype: T, attachment: T) -> Separators {
        Separators {
            parameter: parameter.as_ref().to_string(),
            subtype: subtype.as_ref().to_string(),
            attachment: attachment.as_ref().to_string(),
        }
    }
}

/// Construction-time options of a [`crate::TrackTable`].
#[derive(Clone, Debug, Default)]
pub struct TrackOptions {
    /// The header grammar separators.
    pub separators: Separators,
    /// The type assigned to tracks whose type is `default` or failed
    /// auto-detection. Leaving it unset makes such tracks a hard error.
    pub default_tracktype: Option<TrackType>,
}

impl TrackOptions {
    pub fn new(separators: Separators, default_tracktype: Option<TrackType>) -> TrackOptions {
        TrackOptions {
            separators,
            default_tracktype,
        }
    }
}

/// A single feature value decoded from a header's feature descriptor segment.
///
/// Bare keys (`$mark`) become `Bool(true)`. Valued keys (`$width=2`) are
/// coerced to an integer first, then to a float, and fall back to the raw
/// string when neither parse succeeds.
#[derive(Clone, PartialEq, Debug)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FeatureValue {
    /// Coerces the value part of a `key=value` feature token.
    pub fn from_token_value(value: &str) -> FeatureValue {
        if let Ok(i) = value.trim().parse::<i64>() {
            return FeatureValue::Int(i);
        }
        if let Ok(f) = value.trim().parse::<f64>() {
            return FeatureValue::Float(f);
        }
        FeatureValue::Str(value.to_string())
    }
}

impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureValue::Bool(b) => write!(f, "{}", b),
            FeatureValue::Int(i) => write!(f, "{}", i),
            FeatureValue::Float(v) => write!(f, "{}", v),
            FeatureValue::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracktype_from_str() {
        assert_eq!("marker".parse::<TrackType>().unwrap(), TrackType::Marker);
        assert_eq!("hist".parse::<TrackType>().unwrap(), TrackType::Hist);
        assert!("default".parse::<TrackType>().is_err());
        assert!("Plot".parse::<TrackType>().is_err());
        assert!(TrackType::is_recognized("window"));
        assert!(!TrackType::is_recognized("colors"));
    }

    #[test]
    fn test_value_encoding_dispatch() {
        assert_eq!(
            ValueEncoding::from_parameter_value("plot").unwrap(),
            ValueEncoding::Plot
        );
        assert_eq!(
            ValueEncoding::from_parameter_value("bg_color").unwrap(),
            ValueEncoding::BgColor
        );
        assert!(ValueEncoding::from_parameter_value("colors")
            .unwrap()
            .is_fan_out());
        assert!(!ValueEncoding::from_parameter_value("window")
            .unwrap()
            .is_fan_out());
        assert!(matches!(
            ValueEncoding::from_parameter_value("linewidth"),
            Err(TrackTableError::UnrecognizedTrackType(_))
        ));
    }

    #[test]
    fn test_separator_defaults() {
        let seps = Separators::default();
        assert_eq!(seps.parameter, "&");
        assert_eq!(seps.subtype, "$");
        assert_eq!(seps.attachment, "@");
    }

    #[test]
    fn test_feature_value_coercion() {
        assert_eq!(FeatureValue::from_token_value("3"), FeatureValue::Int(3));
        assert_eq!(
            FeatureValue::from_token_value("2.5"),
            FeatureValue::Float(2.5)
        );
        assert_eq!(
            FeatureValue::from_token_value("red"),
            FeatureValue::Str(String::from("red"))
        );
        // an integer-looking float stays a float
        assert_eq!(
            FeatureValue::from_token_value("1.0"),
            FeatureValue::Float(1.0)
        );
    }
}
