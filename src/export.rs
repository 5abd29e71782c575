//! CSV and Excel (SpreadsheetML 2003) exports of list rows.

use crate::service::Record;
use crate::view::ExportFormat;

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// RFC 4180 CSV: header row then one line per record, NULL as an empty field.
pub fn to_csv(columns: &[&str], records: &[Record]) -> String {
    let mut out = String::new();
    out.push_str(&columns.iter().map(|c| csv_field(c)).collect::<Vec<_>>().join(","));
    out.push_str("\r\n");
    for r in records {
        let line = r
            .values(columns)
            .into_iter()
            .map(|v| csv_field(v.unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push_str("\r\n");
    }
    out
}

pub fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            c => out.push(c),
        }
    }
    out
}

/// Excel worksheet names: at most 31 chars, none of `[]:*?/\`.
fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    if cleaned.is_empty() {
        "Sheet1".into()
    } else {
        cleaned
    }
}

fn xml_row(out: &mut String, cells: impl Iterator<Item = Option<String>>) {
    out.push_str("   <Row>\n");
    for cell in cells {
        match cell {
            Some(v) => {
                out.push_str("    <Cell><Data ss:Type=\"String\">");
                out.push_str(&xml_escape(&v));
                out.push_str("</Data></Cell>\n");
            }
            None => out.push_str("    <Cell/>\n"),
        }
    }
    out.push_str("   </Row>\n");
}

/// Single-worksheet SpreadsheetML workbook that Excel opens as .xls.
pub fn to_spreadsheet_xml(table: &str, columns: &[&str], records: &[Record]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <?mso-application progid=\"Excel.Sheet\"?>\n\
         <Workbook xmlns=\"urn:schemas-microsoft-com:office:spreadsheet\" \
         xmlns:ss=\"urn:schemas-microsoft-com:office:spreadsheet\">\n",
    );
    out.push_str(&format!(" <Worksheet ss:Name=\"{}\">\n  <Table>\n", xml_escape(&sheet_name(table))));
    xml_row(&mut out, columns.iter().map(|c| Some(c.to_string())));
    for r in records {
        xml_row(&mut out, r.values(columns).into_iter().map(|v| v.map(str::to_string)));
    }
    out.push_str("  </Table>\n </Worksheet>\n</Workbook>\n");
    out
}

/// Body, content type and download filename for an export.
pub struct ExportFile {
    pub body: String,
    pub content_type: &'static str,
    pub filename: String,
}

pub fn render_export(
    format: ExportFormat,
    table: &str,
    columns: &[&str],
    records: &[Record],
    stamp: chrono::DateTime<chrono::Utc>,
) -> ExportFile {
    let filename = format!(
        "{}_{}.{}",
        crate::registry::sanitize_endpoint(table),
        stamp.format("%Y-%m-%d_%H-%M-%S"),
        format.extension()
    );
    match format {
        ExportFormat::Csv => ExportFile {
            body: to_csv(columns, records),
            content_type: "text/csv; charset=utf-8",
            filename,
        },
        ExportFormat::Xls => ExportFile {
            body: to_spreadsheet_xml(table, columns, records),
            content_type: "application/vnd.ms-excel",
            filename,
        },
    }
}
