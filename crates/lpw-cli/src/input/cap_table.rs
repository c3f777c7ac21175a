use lpw_core::cap_table::{CapTable, CapTableRow, ShareClass};

use crate::input::{file, stdin};

/// Load a cap table from a file path or piped JSON.
///
/// `.csv` paths go through the tabular loader (current and legacy column
/// headings both accepted); any other path is parsed as a JSON array of
/// share classes, as is piped stdin.
pub fn load(path: Option<&str>) -> Result<CapTable, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        if path.to_ascii_lowercase().ends_with(".csv") {
            return read_csv(path);
        }
        let classes: Vec<ShareClass> = file::read_json(path)?;
        return Ok(CapTable::new(classes)?);
    }

    if let Some(value) = stdin::read_stdin()? {
        let classes: Vec<ShareClass> = serde_json::from_value(value)?;
        return Ok(CapTable::new(classes)?);
    }

    Err("--cap-table <file.csv|file.json> or piped JSON required".into())
}

fn read_csv(path: &str) -> Result<CapTable, Box<dyn std::error::Error>> {
    let canonical = file::resolve_path(path)?;
    let mut reader = csv::Reader::from_path(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;

    let mut rows: Vec<CapTableRow> = Vec::new();
    for record in reader.deserialize() {
        let row: CapTableRow =
            record.map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
        rows.push(row);
    }

    Ok(CapTable::from_rows(rows)?)
}
