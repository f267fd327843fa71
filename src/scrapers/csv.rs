//! Minimal RFC 4180 reader shared by the CSV export scrapers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A parsed CSV file with a header row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// One data row, addressed by header name
#[derive(Debug, Clone, Copy)]
pub(crate) struct CsvRow<'a> {
    headers: &'a [String],
    fields: &'a [String],
    /// 1-based record number, header excluded
    pub number: usize,
}

impl CsvTable {
    pub fn parse(content: &str) -> Self {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut records = split_records(content).into_iter();
        let mut headers = records.next().unwrap_or_default();
        // exports may end every line with a separator
        while headers.last().is_some_and(|h| h.is_empty()) {
            headers.pop();
        }
        let rows = records
            .map(|mut fields| {
                while fields.len() > headers.len() && fields.last().is_some_and(|f| f.is_empty()) {
                    fields.pop();
                }
                fields
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows in file order. A row whose width differs from the header is
    /// returned as `Err` with its record number.
    pub fn rows(&self) -> impl Iterator<Item = Result<CsvRow<'_>, usize>> {
        self.rows.iter().enumerate().map(|(i, fields)| {
            if fields.len() == self.headers.len() {
                Ok(CsvRow {
                    headers: &self.headers,
                    fields,
                    number: i + 1,
                })
            } else {
                Err(i + 1)
            }
        })
    }
}

impl<'a> CsvRow<'a> {
    /// Field under `name`, empty when the column does not exist
    pub fn get(&self, name: &str) -> &'a str {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// `;`-separated list under `name`, trimmed, blanks dropped
    pub fn list(&self, name: &str) -> Vec<&'a str> {
        self.get(name)
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Split CSV text into records, honoring quoted fields with embedded
/// separators, newlines and doubled quotes. Blank lines are dropped.
pub(crate) fn split_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = record.len() == 1 && record[0].is_empty();
    if !blank {
        records.push(record);
    }
}

/// First line of a file, or `None` if it cannot be read
pub(crate) fn first_line(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut line = String::new();
    BufReader::new(file).read_line(&mut line).ok()?;
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_fields() {
        let records = split_records("a,b,c\n\"x, y\",\"he said \"\"hi\"\"\",\"multi\nline\"\r\n\n1,,3");
        assert_eq!(
            records,
            vec![
                vec!["a", "b", "c"],
                vec!["x, y", "he said \"hi\"", "multi\nline"],
                vec!["1", "", "3"],
            ]
        );
    }

    #[test]
    fn test_rows_by_header() {
        let table = CsvTable::parse("\u{feff}\"Title\",\"Tags\"\n\"A\",\"x; y;;\"\n\"short\"\n");
        assert_eq!(table.headers(), ["Title", "Tags"]);

        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows.len(), 2);
        let row = rows[0].as_ref().unwrap();
        assert_eq!(row.get("Title"), "A");
        assert_eq!(row.get("Missing"), "");
        assert_eq!(row.list("Tags"), vec!["x", "y"]);
        assert_eq!(rows[1].as_ref().unwrap_err(), &2);
    }

    #[test]
    fn test_trailing_separator() {
        let table = CsvTable::parse("a,b,\n1,2,\n3,4\n");
        assert_eq!(table.headers(), ["a", "b"]);
        assert!(table.rows().all(|r| r.is_ok()));
    }

    #[test]
    fn test_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "head,er\nrow\n").unwrap();
        assert_eq!(first_line(&path).as_deref(), Some("head,er\n"));
        assert_eq!(first_line(&dir.path().join("missing.csv")), None);
    }
}
