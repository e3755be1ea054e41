use polars::prelude::*;
use std::io::Write;
use tracktable::options::{Separators, TrackOptions, TrackType};
use tracktable::{TrackTable, TrackTableError};

fn raw_df() -> DataFrame {
    df!(
        "scaffold" => ["chr1", "chr1", "chr2"],
        "start" => [0i64, 100, 0],
        "end" => [100i64, 200, 100],
        "cov&plot" => [Some("1.5"), Some("2.0"), None],
        "snp&hist" => [Some("0.1,0.2,0.3"), None, Some("0.4,0.5")],
        "ann@geneTrack" => ["r", "e", "c"],
        "geneTrack&window$color=blue" => ["red", "blue", "green"],
    )
    .unwrap()
}

#[test]
fn test_parse_decodes_metadata() {
    let table = TrackTable::new(raw_df(), TrackOptions::default())
        .parse()
        .unwrap();
    assert!(table.parsed());

    let metadata = table.metadata().unwrap();
    assert_eq!(metadata.len(), 4);
    assert_eq!(
        metadata.track_names(),
        vec!["cov", "snp", "ann", "geneTrack"]
    );
    assert_eq!(metadata.track_type("cov"), Some(TrackType::Plot));
    assert_eq!(metadata.track_type("snp"), Some(TrackType::Hist));
    assert_eq!(metadata.track_type("geneTrack"), Some(TrackType::Window));

    // ann has no explicit tag and marker-vocabulary values
    assert_eq!(metadata.track_type("ann"), Some(TrackType::Marker));
    assert_eq!(table.autodetected, vec!["ann"]);
    assert!(table.defaulted.is_empty());
}

#[test]
fn test_parse_reshapes_plot_column() {
    let table = TrackTable::new(raw_df(), TrackOptions::default())
        .parse()
        .unwrap();

    let cov = table.sub_column("cov&plot", "cov&plot").unwrap();
    assert_eq!(cov.dtype(), &DataType::Float64);
    let ca = cov.f64().unwrap();
    assert_eq!(ca.get(0), Some(1.5));
    assert_eq!(ca.get(1), Some(2.0));
    assert_eq!(ca.get(2), None);
}

#[test]
fn test_parse_fans_out_hist_column() {
    let df = df!(
        "scaffold" => ["s1"],
        "start" => [0i64],
        "end" => [10i64],
        "snp&hist" => ["0.1,0.2,0.3"],
    )
    .unwrap();
    let table = TrackTable::new(df, TrackOptions::default()).parse().unwrap();

    for (element, expected) in [("c0", 0.1), ("c1", 0.2), ("c2", 0.3)] {
        let sub = table.sub_column("snp&hist", element).unwrap();
        assert_eq!(sub.f64().unwrap().get(0), Some(expected));
    }
}

#[test]
fn test_parse_column_index_pairs() {
    let table = TrackTable::new(raw_df(), TrackOptions::default())
        .parse()
        .unwrap();

    let pairs: Vec<(String, String)> = table.column_index();
    let expected: Vec<(String, String)> = [
        ("scaffold", "scaffold"),
        ("start", "start"),
        ("end", "end"),
        ("cov&plot", "cov&plot"),
        ("snp&hist", "c0"),
        ("snp&hist", "c1"),
        ("snp&hist", "c2"),
        ("ann@geneTrack", "ann@geneTrack"),
        ("geneTrack&window$color=blue", "geneTrack&window$color=blue"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();
    assert_eq!(pairs, expected);

    // nulls in short hist rows
    let c2 = table.sub_column("snp&hist", "c2").unwrap();
    assert_eq!(c2.f64().unwrap().get(2), None);
}

#[test]
fn test_parse_extracts_features() {
    let table = TrackTable::new(raw_df(), TrackOptions::default())
        .parse()
        .unwrap();

    let gene_track = table.features().get("geneTrack").unwrap();
    let general = gene_track.get("general").unwrap();
    assert_eq!(general.len(), 1);
    assert_eq!(format!("{}", general.get("color").unwrap()), "blue");

    // tracks without feature descriptors still own an empty general group
    let cov = table.features().get("cov").unwrap();
    assert!(cov.get("general").unwrap().is_empty());
}

// renders every sub-column with its values, so two frames compare equal
// exactly when their column sets and contents (nulls included) match
fn df_snapshot(table: &TrackTable) -> Vec<String> {
    table
        .column_index()
        .iter()
        .map(|(column, element)| {
            let sub = table.sub_column(column, element).unwrap();
            format!("{}:{}:{:?}", column, element, sub)
        })
        .collect()
}

#[test]
fn test_parse_is_deterministic() {
    let first = TrackTable::new(raw_df(), TrackOptions::default())
        .parse()
        .unwrap();
    let second = TrackTable::new(raw_df(), TrackOptions::default())
        .parse()
        .unwrap();

    assert_eq!(df_snapshot(&first), df_snapshot(&second));
    assert_eq!(first.metadata().unwrap(), second.metadata().unwrap());
    assert_eq!(first.features(), second.features());
}

#[test]
fn test_parse_defaulted_track() {
    let df = df!(
        "scaffold" => ["s1"],
        "start" => [0i64],
        "end" => [10i64],
        "odd&default" => ["??"],
    )
    .unwrap();
    let options = TrackOptions::new(Separators::default(), Some(TrackType::Window));
    let table = TrackTable::new(df, options).parse().unwrap();

    assert_eq!(table.defaulted, vec!["odd"]);
    assert_eq!(
        table.metadata().unwrap().track_type("odd"),
        Some(TrackType::Window)
    );
}

#[test]
fn test_parse_unset_default_type_fails() {
    let df = df!(
        "scaffold" => ["s1"],
        "start" => [0i64],
        "end" => [10i64],
        "odd" => ["??"],
    )
    .unwrap();
    let err = TrackTable::new(df, TrackOptions::default())
        .parse()
        .unwrap_err();
    assert!(matches!(err, TrackTableError::Configuration(_)));
}

#[test]
fn test_parse_malformed_feature_token_fails() {
    let df = df!(
        "scaffold" => ["s1"],
        "start" => [0i64],
        "end" => [10i64],
        "cov&plot$a=1=2" => [1.0f64],
    )
    .unwrap();
    let err = TrackTable::new(df, TrackOptions::default())
        .parse()
        .unwrap_err();
    assert!(matches!(err, TrackTableError::MalformedFeatureToken(_)));
}

#[test]
fn test_parse_custom_separators() {
    let df = df!(
        "scaffold" => ["s1"],
        "start" => [0i64],
        "end" => [10i64],
        "cov|plot%width=2^host" => [1.0f64],
        "host|window" => ["red"],
    )
    .unwrap();
    let options = TrackOptions::new(Separators::new("|", "%", "^"), None);
    let table = TrackTable::new(df, options).parse().unwrap();

    let metadata = table.metadata().unwrap();
    assert_eq!(metadata.track_type("cov"), Some(TrackType::Plot));
    assert_eq!(metadata.attached_to("host"), vec!["cov"]);
}

#[test]
fn test_from_tsv_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        b"scaffold\tstart\tend\tcov&plot\tsnp&hist\n\
          chr1\t0\t100\t1.5\t0.1,0.2\n\
          chr1\t100\t200\t.\t.\n",
    )
    .unwrap();

    let table = TrackTable::from_tsv(file.path(), TrackOptions::default())
        .unwrap()
        .parse()
        .unwrap();

    let cov = table.sub_column("cov&plot", "cov&plot").unwrap();
    assert_eq!(cov.f64().unwrap().get(0), Some(1.5));
    assert_eq!(cov.f64().unwrap().get(1), None);

    let c1 = table.sub_column("snp&hist", "c1").unwrap();
    assert_eq!(c1.f64().unwrap().get(0), Some(0.2));
    assert_eq!(c1.f64().unwrap().get(1), None);
}
