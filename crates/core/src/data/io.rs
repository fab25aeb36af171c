use std::path::Path;

use crate::error::{InbreedingError, Result};
use crate::genetics::records::{AncestorRecord, AncestorSlot};

/// Read flattened ancestor records from a CSV file.
///
/// The first row is a header. The subject column is `id`, `animal` or
/// `subject`; the remaining recognised columns are `sire`, `dam` and the slot
/// codes `ss`, `sd`, `ds`, `dd`, `sss` ... `ddd` (case-insensitive). Other
/// columns are ignored. Unknown ancestors may be empty or any missing-value
/// token (`0`, `NA`, `unknown`, ...).
///
/// # Errors
/// Returns an error if the file cannot be read, the CSV is malformed, or no
/// subject column is present.
pub fn read_ancestor_records<P: AsRef<Path>>(path: P) -> Result<Vec<AncestorRecord>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;
    read_records(reader)
}

/// Same as [`read_ancestor_records`] over any reader.
pub fn read_ancestor_records_from<R: std::io::Read>(input: R) -> Result<Vec<AncestorRecord>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(input);
    read_records(reader)
}

fn read_records<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<AncestorRecord>> {
    // Column index for every recognised slot; the first matching column wins.
    let mut columns: Vec<(AncestorSlot, usize)> = Vec::new();
    for (i, header) in reader.headers()?.iter().enumerate() {
        match AncestorSlot::from_header(header) {
            Some(slot) if !columns.iter().any(|(s, _)| *s == slot) => columns.push((slot, i)),
            Some(_) => log::warn!("Duplicate column '{}' ignored", header),
            None => log::debug!("Column '{}' is not an ancestor slot; ignored", header),
        }
    }

    if !columns.iter().any(|(slot, _)| *slot == AncestorSlot::Subject) {
        return Err(InbreedingError::Pedigree(
            "CSV missing 'id' (or 'animal') column".to_string(),
        ));
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        let mut record = AncestorRecord::default();
        for &(slot, col) in &columns {
            record.set(slot, row.get(col));
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Helper: write CSV content to a temporary file and return the path.
    fn write_temp_csv(content: &str) -> String {
        let dir = std::env::temp_dir();
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let file_name = format!("test_records_{}_{}.csv", std::process::id(), id);
        let path = dir.join(file_name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_read_basic() {
        let csv = "id,sire,dam,ss,sd\nX,S,D,SS,NA\nY,0,D,,\n";
        let path = write_temp_csv(csv);
        let records = read_ancestor_records(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subject(), Some("X"));
        assert_eq!(records[0].get(AncestorSlot::Sire), Some("S"));
        assert_eq!(records[0].get(AncestorSlot::SireSire), Some("SS"));
        assert_eq!(records[0].get(AncestorSlot::SireDam), None);
        assert_eq!(records[1].get(AncestorSlot::Sire), None);
        assert_eq!(records[1].get(AncestorSlot::Dam), Some("D"));
    }

    #[test]
    fn test_read_great_grandparents_and_extra_columns() {
        let csv = "Animal,Breed,Sire,Dam,DDD,SSS\n  A1 ,Angus,B1,C1,Z9,Y9\n";
        let records = read_ancestor_records_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject(), Some("A1"));
        assert_eq!(records[0].get(AncestorSlot::DamDamDam), Some("Z9"));
        assert_eq!(records[0].get(AncestorSlot::SireSireSire), Some("Y9"));
    }

    #[test]
    fn test_missing_subject_is_kept_as_unidentifiable() {
        let csv = "id,sire,dam\nNA,S,D\n";
        let records = read_ancestor_records_from(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subject(), None);
    }

    #[test]
    fn test_missing_id_column() {
        let csv = "name,sire,dam\nX,S,D\n";
        let result = read_ancestor_records_from(csv.as_bytes());
        assert!(matches!(result, Err(InbreedingError::Pedigree(_))));
    }

    #[test]
    fn test_ragged_rows_error() {
        let csv = "id,sire,dam\nX,S\n";
        let result = read_ancestor_records_from(csv.as_bytes());
        assert!(matches!(result, Err(InbreedingError::Csv(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = read_ancestor_records("/nonexistent/records.csv");
        assert!(result.is_err());
    }
}
