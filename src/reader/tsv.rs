use crate::error::TrackTableError;
use crate::tracktable_utils::is_gzipped;
use flate2::read::GzDecoder;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use tracing::trace;

/// Reads a tab-separated track table into a raw [`DataFrame`].
///
/// The file may be gzip compressed; this is auto-detected from the magic
/// bytes. A header row is required, `.` is treated as the missing-value
/// sentinel, and the first column (the scaffold id) is always read as
/// strings, even when every id in the file looks numeric.
///
/// The returned frame is raw: value columns keep whatever types the reader
/// inferred, and no header decoding has happened yet. Hand it to
/// [`crate::TrackTable::new`], or use [`crate::TrackTable::from_tsv`]
/// directly.
pub fn read_track_tsv<P: AsRef<Path>>(path: P) -> Result<DataFrame, TrackTableError> {
    let file = File::open(path.as_ref())?;
    let mut inner_rdr = BufReader::new(file);

    let mut bytes = Vec::new();
    if is_gzipped(&mut inner_rdr)? {
        trace!("auto-detected gzipped track table - reading via decompression");
        GzDecoder::new(inner_rdr).read_to_end(&mut bytes)?;
    } else {
        inner_rdr.read_to_end(&mut bytes)?;
    }

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(b'\t')
                .with_null_values(Some(NullValues::AllColumnsSingle(".".into()))),
        )
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    // scaffold ids are strings no matter what the reader inferred
    let scaffold = df.get_columns()[0].cast(&DataType::String)?;
    df.with_column(scaffold)?;

    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const TSV: &str = "scaffold\tstart\tend\tcov&plot\tsnp&hist\n\
                       chr1\t0\t100\t1.5\t0.1,0.2\n\
                       chr1\t100\t200\t.\t.\n\
                       chr2\t0\t100\t2.5\t0.3,0.4\n";

    #[test]
    fn test_read_plain_tsv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TSV.as_bytes()).unwrap();

        let df = read_track_tsv(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 5);
        assert_eq!(df.get_columns()[0].dtype(), &DataType::String);
        assert!(df.get_columns()[1].dtype().is_integer());
        // "." became a null
        assert_eq!(df.column("snp&hist").unwrap().null_count(), 1);
    }

    #[test]
    fn test_read_gzipped_tsv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(TSV.as_bytes()).unwrap();
        file.write_all(&enc.finish().unwrap()).unwrap();

        let df = read_track_tsv(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 5);
    }

    #[test]
    fn test_numeric_scaffold_ids_become_strings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"scaffold\tstart\tend\tcov&plot\n1\t0\t100\t1.5\n2\t0\t100\t2.5\n")
            .unwrap();

        let df = read_track_tsv(file.path()).unwrap();
        assert_eq!(df.get_columns()[0].dtype(), &DataType::String);
        assert_eq!(df.get_columns()[0].str().unwrap().get(0), Some("1"));
    }
}
