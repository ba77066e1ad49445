// THEORY:
// The tabular form of a record sequence: one CSV row per frame with the header
// `frame,x,y,visible`. Rows must run 0, 1, 2, ... with no gaps, and a row
// that is not visible always reads back with the (-1, -1) sentinel whatever
// coordinates the file holds.

use crate::core_modules::record::{DetectionRecord, Point};
use crate::error::RecordsError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct RecordRow {
    frame: u64,
    x: f64,
    y: f64,
    visible: u8,
}

impl From<&DetectionRecord> for RecordRow {
    fn from(record: &DetectionRecord) -> Self {
        let position = record.position();
        Self {
            frame: record.frame_index(),
            x: position.x,
            y: position.y,
            visible: u8::from(record.is_visible()),
        }
    }
}

pub fn write_records<W: io::Write>(writer: W, records: &[DetectionRecord]) -> Result<(), RecordsError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(RecordRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes `records` to `path`, creating parent directories as needed.
pub fn write_records_to_path(path: impl AsRef<Path>, records: &[DetectionRecord]) -> Result<(), RecordsError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_records(File::create(path)?, records)
}

pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<DetectionRecord>, RecordsError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for (expected, row) in csv_reader.deserialize::<RecordRow>().enumerate() {
        let row = row?;
        let expected = expected as u64;
        if row.frame != expected {
            return Err(RecordsError::NonContiguous {
                expected,
                found: row.frame,
            });
        }
        let record = match row.visible {
            0 => DetectionRecord::hidden(row.frame),
            1 => DetectionRecord::visible(row.frame, Point::new(row.x, row.y)),
            value => {
                return Err(RecordsError::InvalidVisibility {
                    frame: row.frame,
                    value,
                })
            }
        };
        records.push(record);
    }
    Ok(records)
}

pub fn read_records_from_path(path: impl AsRef<Path>) -> Result<Vec<DetectionRecord>, RecordsError> {
    read_records(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_csv_has_expected_layout() {
        let records = vec![
            DetectionRecord::visible(0, Point::new(12.0, 34.5)),
            DetectionRecord::hidden(1),
        ];
        let mut buffer = Vec::new();
        write_records(&mut buffer, &records).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "frame,x,y,visible");
        assert_eq!(lines[1], "0,12.0,34.5,1");
        assert_eq!(lines[2], "1,-1.0,-1.0,0");
    }

    #[test]
    fn integer_coordinates_are_accepted() {
        let text = "frame,x,y,visible\n0,640,360,1\n1,-1,-1,0\n";
        let records = read_records(text.as_bytes()).unwrap();
        assert_eq!(records[0].visible_position(), Some(Point::new(640.0, 360.0)));
        assert!(!records[1].is_visible());
    }

    #[test]
    fn hidden_rows_are_normalised_to_sentinel() {
        let text = "frame,x,y,visible\n0,500,200,0\n";
        let records = read_records(text.as_bytes()).unwrap();
        assert_eq!(records[0].position(), Point::new(-1.0, -1.0));
    }

    #[test]
    fn gaps_in_frame_numbers_are_rejected() {
        let text = "frame,x,y,visible\n0,1,1,1\n2,1,1,1\n";
        assert!(matches!(
            read_records(text.as_bytes()),
            Err(RecordsError::NonContiguous { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn bad_visibility_is_rejected() {
        let text = "frame,x,y,visible\n0,1,1,7\n";
        assert!(matches!(
            read_records(text.as_bytes()),
            Err(RecordsError::InvalidVisibility { frame: 0, value: 7 })
        ));
    }

    #[test]
    fn file_round_trip_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.csv");
        let records = vec![
            DetectionRecord::hidden(0),
            DetectionRecord::visible(1, Point::new(92.0, 184.0)),
            DetectionRecord::visible(2, Point::new(100.25, 200.0)),
        ];
        write_records_to_path(&path, &records).unwrap();
        assert_eq!(read_records_from_path(&path).unwrap(), records);
    }
}
