//! CSV reporter
//!
//! One row per score record followed by one row per failure. Fields are
//! quoted per RFC 4180 when they contain a comma, quote or newline.

use super::Template;
use crate::error::Result;
use crate::models::Report;

const HEADER: [&str; 9] = [
    "status",
    "revision",
    "path",
    "scope",
    "language",
    "score",
    "band",
    "timestamp",
    "error",
];

pub struct CsvTemplate;

impl Template for CsvTemplate {
    fn name(&self) -> &str {
        "csv"
    }

    fn render(&self, report: &Report) -> Result<String> {
        Ok(render(report))
    }

    fn extension(&self) -> &str {
        "csv"
    }
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_row(out: &mut String, fields: &[String]) {
    let row: Vec<String> = fields.iter().map(|f| quote(f)).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

pub fn render(report: &Report) -> String {
    let mut out = HEADER.join(",");
    out.push('\n');

    for record in &report.records {
        push_row(
            &mut out,
            &[
                "ok".to_string(),
                record.unit.revision.clone(),
                record.unit.path.clone(),
                record
                    .unit
                    .scope
                    .as_ref()
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
                record.language.to_string(),
                format!("{:.6}", record.score),
                record.band.to_string(),
                record.timestamp.to_rfc3339(),
                String::new(),
            ],
        );
    }

    for failure in &report.failures {
        push_row(
            &mut out,
            &[
                failure.error.kind().to_string(),
                failure.unit.revision.clone(),
                failure.unit.path.clone(),
                failure
                    .unit
                    .scope
                    .as_ref()
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                failure.error.to_string(),
            ],
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_csv_rows() {
        let out = render(&test_report());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "status,revision,path,scope,language,score,band,timestamp,error");
        assert_eq!(lines.len(), 1 + 3 + 1);
        assert!(lines[1].starts_with("ok,bbbbbbbbbbbbbbbb,src/app.py,,Python,0.720000,high,"));
        assert!(lines[2].contains(",src/util.py,helper,"));
        assert!(lines[4].starts_with("parse,bbbbbbbbbbbbbbbb,src/broken.py,"));
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
