//! Delimited text export of column metadata.

use std::borrow::Cow;
use std::io::{self, Write};

use common::models::catalog::ColumnEntry;

const HEADER: [&str; 5] = ["TABNAME", "COLNAME", "TYPENAME", "COLNO", "NULLS"];

/// Writes a header plus one line per column.
pub fn write_columns<W: Write>(mut out: W, columns: &[ColumnEntry], delimiter: char) -> io::Result<()> {
    write_record(&mut out, HEADER.iter().copied(), delimiter)?;
    for column in columns {
        let position = column.position.to_string();
        let fields = [
            column.table.as_str(),
            column.name.as_str(),
            column.type_name.as_str(),
            position.as_str(),
            if column.nullable { "Y" } else { "N" },
        ];
        write_record(&mut out, fields.into_iter(), delimiter)?;
    }
    out.flush()
}

fn write_record<'a, W: Write>(
    out: &mut W,
    fields: impl Iterator<Item = &'a str>,
    delimiter: char,
) -> io::Result<()> {
    let line: Vec<Cow<'a, str>> = fields.map(|f| quote(f, delimiter)).collect();
    writeln!(out, "{}", line.join(&delimiter.to_string()))
}

/// Quotes a field when it holds the delimiter, a quote or a line break.
fn quote(field: &str, delimiter: char) -> Cow<'_, str> {
    if field.contains(|c: char| c == delimiter || c == '"' || c == '\n' || c == '\r') {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn column(table: &str, position: i64, name: &str, type_name: &str, nullable: bool) -> ColumnEntry {
        ColumnEntry {
            table: table.into(),
            position,
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }

    #[test]
    fn test_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("database_schema.csv");
        let columns = vec![
            column("AIRPLANES", 1, "AIRPLANE_ID", "INTEGER", false),
            column("AIRPLANES", 2, "MODEL", "VARCHAR", true),
        ];
        write_columns(fs::File::create(&path).unwrap(), &columns, ',').unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "TABNAME,COLNAME,TYPENAME,COLNO,NULLS\n\
             AIRPLANES,AIRPLANE_ID,INTEGER,1,N\n\
             AIRPLANES,MODEL,VARCHAR,2,Y\n"
        );
    }

    #[test]
    fn test_fields_with_delimiter_are_quoted() {
        let mut out = Vec::new();
        let columns = vec![column("TICKETS", 3, "TOTAL_AMOUNT", "DECIMAL(10,2)", true)];
        write_columns(&mut out, &columns, ',').unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("TICKETS,TOTAL_AMOUNT,\"DECIMAL(10,2)\",3,Y\n"));
    }

    #[test]
    fn test_quote_escapes_quotes() {
        assert_eq!(quote("say \"hi\"", ';'), "\"say \"\"hi\"\"\"");
        assert_eq!(quote("a,b", ';'), "a,b");
        assert_eq!(quote("a;b", ';'), "\"a;b\"");
    }
}
