//! CSV dataset loading
//!
//! Reads raw traffic observations with a header row. Columns are matched by
//! name, in any order; unknown columns are ignored and empty cells become
//! absent fields.

use congestion_core::{CongestionError, Record, Result, TARGET_COLUMN};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Load every record from a CSV file
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let records = read_records(file)?;
    info!(path = %path.display(), "Loaded {} rows", records.len());
    Ok(records)
}

/// Parse records from any CSV reader
pub fn read_records<R: Read>(reader: R) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let headers = reader.headers().map_err(csv_error)?;
    if !headers.iter().any(|h| h == TARGET_COLUMN) {
        return Err(CongestionError::MissingColumn {
            column: TARGET_COLUMN.to_string(),
            row: None,
        });
    }

    let records = reader
        .deserialize::<Record>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(csv_error)?;

    if records.is_empty() {
        return Err(CongestionError::EmptyInput("dataset has no data rows"));
    }
    Ok(records)
}

/// Write records as CSV with a header row
pub fn write_csv<P: AsRef<Path>>(path: P, records: &[Record]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_records(file, records)
}

pub fn write_records<W: Write>(writer: W, records: &[Record]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for record in records {
        writer.serialize(record).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(err: csv::Error) -> CongestionError {
    let line = err.position().map(|p| p.line());
    match err.into_kind() {
        csv::ErrorKind::Io(e) => CongestionError::Io(e),
        kind => {
            let field = line.map_or_else(|| "csv".to_string(), |l| format!("csv line {l}"));
            CongestionError::invalid_input(field, format!("{kind:?}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "timestamp,lat,lng,temperature,humidity,weather_condition,congestion_level";

    fn create_test_csv(body: &str) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{body}")?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_csv() -> Result<()> {
        let file = create_test_csv(&format!(
            "{HEADER}\n\
             2024-03-04T08:00:00,40.7,-74.0,12.5,60,Rain,0.8\n\
             2024-03-04T14:00:00,40.7,-74.0,15,,Clear,0.3\n"
        ))?;
        let records = load_csv(file.path())?;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].weather_condition.as_deref(), Some("Rain"));
        assert_eq!(records[0].congestion_level, Some(0.8));
        assert_eq!(records[1].humidity, None);
        Ok(())
    }

    #[test]
    fn test_columns_matched_by_name() -> Result<()> {
        let csv = "congestion_level,road_id,weather_condition,timestamp\n\
                   0.5,A12,Clouds,2024-01-01 09:00:00\n";
        let records = read_records(csv.as_bytes())?;

        assert_eq!(records[0].congestion_level, Some(0.5));
        assert_eq!(records[0].timestamp.as_deref(), Some("2024-01-01 09:00:00"));
        assert_eq!(records[0].lat, None);
        Ok(())
    }

    #[test]
    fn test_missing_target_header() {
        let err =
            read_records("timestamp,lat\n2024-01-01T00:00:00,1.0\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            CongestionError::MissingColumn { ref column, row: None } if column == TARGET_COLUMN
        ));
    }

    #[test]
    fn test_malformed_cell_reports_line() {
        let csv = format!(
            "{HEADER}\n\
             2024-03-04T08:00:00,40.7,-74.0,12.5,60,Rain,0.8\n\
             2024-03-04T09:00:00,north,-74.0,12.5,60,Rain,0.8\n"
        );
        let err = read_records(csv.as_bytes()).unwrap_err();
        let CongestionError::InvalidInput { field, .. } = err else {
            panic!("expected invalid input, got {err:?}");
        };
        assert_eq!(field, "csv line 3");
    }

    #[test]
    fn test_empty_dataset() {
        let err = read_records(format!("{HEADER}\n").as_bytes()).unwrap_err();
        assert_eq!(err.kind(), "empty_input");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_csv("/nonexistent/historical_traffic_data.csv").unwrap_err();
        assert_eq!(err.kind(), "io_error");
    }

    #[test]
    fn test_write_then_read() -> Result<()> {
        let records = vec![Record {
            timestamp: Some("2024-05-05T17:30:00".into()),
            lat: Some(48.85),
            lng: Some(2.35),
            temperature: None,
            humidity: Some(55.0),
            weather_condition: Some("Clear".into()),
            congestion_level: Some(0.72),
        }];
        let mut buf = Vec::new();
        write_records(&mut buf, &records)?;

        assert_eq!(read_records(buf.as_slice())?, records);
        Ok(())
    }
}
