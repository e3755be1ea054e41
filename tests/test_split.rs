use polars::prelude::*;
use tracktable::options::TrackOptions;
use tracktable::{TrackTable, TrackTableError};

fn parsed_table() -> TrackTable {
    let df = df!(
        "scaffold" => ["chr1", "chr1", "chr2"],
        "start" => [0i64, 100, 0],
        "end" => [100i64, 200, 100],
        "cov&plot" => [Some("1.5"), Some("2.0"), None],
        "snp&hist" => [Some("0.1,0.2,0.3"), None, Some("0.4,0.5")],
        "ann@geneTrack" => ["r", "e", "c"],
        "geneTrack&window$color=blue" => ["red", "blue", "green"],
    )
    .unwrap();
    TrackTable::new(df, TrackOptions::default()).parse().unwrap()
}

fn value_column_names(table: &TrackTable) -> Vec<String> {
    table
        .df()
        .get_columns()
        .iter()
        .skip(3)
        .map(|c| c.name().to_string())
        .collect()
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
fn test_attachment_resolving_split() {
    let table = parsed_table();
    let tracks = table.split_tracks(true).unwrap();

    // ann is attached to geneTrack, so only three hosts are emitted
    assert_eq!(tracks.len(), 3);
    let names: Vec<String> = tracks
        .iter()
        .map(|t| t.metadata().unwrap().track_names().join(","))
        .collect();
    assert_eq!(names, vec!["cov", "snp", "geneTrack"]);

    let gene_track = &tracks[2];
    assert!(gene_track.parsed());
    assert_eq!(gene_track.attached().len(), 1);
    let ann = gene_track.attached().get("ann").unwrap();
    assert_eq!(
        value_column_names(ann),
        vec![String::from("ann@geneTrack")]
    );
    assert_eq!(ann.df().height(), 3);

    // hosts without attachments carry an empty attached map
    assert!(tracks[0].attached().is_empty());

    // each split result owns its feature slice
    assert_eq!(gene_track.features().len(), 1);
    assert!(gene_track.features().contains_key("geneTrack"));
    assert!(ann.features().contains_key("ann"));
}

#[test]
fn test_flat_split_round_trip() {
    let table = parsed_table();
    let tracks = table.split_tracks(false).unwrap();

    // one table per track name, attachments ignored
    assert_eq!(tracks.len(), 4);
    assert!(tracks.iter().all(|t| t.attached().is_empty()));

    // re-concatenating all per-track value columns reproduces the parent's
    // column set with nothing lost and nothing duplicated
    let mut collected: Vec<String> = tracks.iter().flat_map(|t| value_column_names(t)).collect();
    let mut expected = value_column_names(&table);
    collected.sort();
    expected.sort();
    assert_eq!(collected, expected);
}

#[test]
fn test_lazy_split_matches_eager_split() {
    let table = parsed_table();

    let eager = table.split_tracks(true).unwrap();
    let lazy: Vec<TrackTable> = table
        .split_tracks_iter(true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(eager.len(), lazy.len());
    for (e, l) in eager.iter().zip(lazy.iter()) {
        assert_eq!(df_snapshot(e), df_snapshot(l));
        assert_eq!(e.metadata().unwrap(), l.metadata().unwrap());
        assert_eq!(e.features(), l.features());
        assert_eq!(
            e.attached().keys().collect::<Vec<_>>(),
            l.attached().keys().collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_split_by_scaffolds() {
    let table = parsed_table();
    let blocks = table.split_by_scaffolds().unwrap();

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].df().height(), 2);
    assert_eq!(blocks[1].df().height(), 1);
    // the full column set is retained
    for block in &blocks {
        assert_eq!(block.df().width(), table.df().width());
    }
    assert_eq!(blocks[0].scaffold_ids().unwrap(), vec!["chr1"]);
    assert_eq!(blocks[1].scaffold_ids().unwrap(), vec!["chr2"]);

    let lazy: Vec<TrackTable> = table
        .split_by_scaffolds_iter()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(lazy.len(), blocks.len());
    for (e, l) in blocks.iter().zip(lazy.iter()) {
        assert_eq!(df_snapshot(e), df_snapshot(l));
    }
}

#[test]
fn test_split_before_parse_fails() {
    let df = df!(
        "scaffold" => ["s1"],
        "start" => [0i64],
        "end" => [10i64],
        "cov&plot" => [1.0f64],
    )
    .unwrap();
    let table = TrackTable::new(df, TrackOptions::default());
    assert!(matches!(
        table.split_tracks(true),
        Err(TrackTableError::Unparsed)
    ));
}

#[test]
fn test_split_results_are_independent() {
    let table = parsed_table();
    let mut tracks = table.split_tracks(false).unwrap();

    tracks[0].features.clear();
    assert!(!table.features().is_empty());

    // distinct instances get distinct signatures
    assert_ne!(tracks[0].signature(), tracks[1].signature());
    assert_ne!(tracks[0].signature(), table.signature());
}
