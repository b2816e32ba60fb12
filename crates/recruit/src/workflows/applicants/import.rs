use std::io::Read;

use serde::{Deserialize, Deserializer};

/// One applicant row of a job-board export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRecord {
    pub site: String,
    pub outer_id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to parse board export: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

#[derive(Debug, Deserialize)]
struct BoardRow {
    #[serde(rename = "Site")]
    site: String,
    #[serde(rename = "Outer ID")]
    outer_id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Email", default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
}

pub fn parse_board_export<R: Read>(reader: R) -> Result<Vec<BoardRecord>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, record) in csv_reader.deserialize::<BoardRow>().enumerate() {
        let row = record?;
        let line = index + 2;
        if row.site.is_empty() || row.outer_id.is_empty() {
            return Err(ImportError::InvalidRow {
                row: line,
                reason: "site and outer id are required".to_string(),
            });
        }
        if row.name.is_empty() {
            return Err(ImportError::InvalidRow {
                row: line,
                reason: "name is required".to_string(),
            });
        }

        records.push(BoardRecord {
            site: row.site,
            outer_id: row.outer_id,
            name: row.name,
            email: row.email.map(|email| email.to_ascii_lowercase()),
        });
    }

    Ok(records)
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
