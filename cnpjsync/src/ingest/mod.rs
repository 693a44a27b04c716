//! Ingest pipelines for the three external sources

pub mod determined;
pub mod mapping;
pub mod registry;

use calamine::Data;

/// Render a spreadsheet cell as the string the source meant.
///
/// The association stores MCC codes numerically, so calamine hands them
/// back as floats; an integral float is rendered without the `.0` artifact.
/// Returns `None` for empty cells.
pub(crate) fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", *f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%d/%m/%Y %H:%M").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(_) => None,
    }
}
