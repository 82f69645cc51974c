//! Report rendering.
//!
//! Every rule contributes exactly one line. A line carries either its
//! rendered value or the error that prevented it; errors are printed in
//! place of the value and never stop the remaining lines.

use crate::rules::{Rule, RuleError, RuleResults};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{rule} could not be computed: {source}")]
    Rule {
        rule: Rule,
        #[source]
        source: RuleError,
    },

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Output format for the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// One `description: value` line per rule
    #[default]
    Text,
    /// A single JSON document
    Json,
}

/// One rule's entry in the report.
#[derive(Debug)]
pub struct ReportLine {
    rule: Rule,
    description: String,
    value: Result<String, ReportError>,
}

impl ReportLine {
    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn is_ok(&self) -> bool {
        self.value.is_ok()
    }

    pub fn render(&self) -> String {
        match &self.value {
            Ok(value) => format!("{}: {}", self.description, value),
            Err(err) => failure_line(&self.description, err),
        }
    }
}

fn failure_line(description: &str, err: &dyn std::fmt::Display) -> String {
    format!("Error printing data for {}: {}", description, err)
}

/// Write `text` and its newline with a single call, so a failure never
/// leaves half a line behind for the next one to be glued onto.
fn write_line<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(format!("{text}\n").as_bytes())
}

/// Write queued failure lines, keeping the ones the output still rejects.
fn write_pending<W: Write>(out: &mut W, pending: &mut Vec<String>) {
    pending.retain(|note| write_line(out, note).is_err());
}

/// Counts from writing a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct Report {
    year: i32,
    lines: Vec<ReportLine>,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    rule: Rule,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    year: i32,
    results: Vec<JsonLine<'a>>,
}

/// Build the report lines for `results`, in rule order.
pub fn build_report(results: &RuleResults) -> Report {
    let year = results.year();
    let lines = results
        .iter()
        .map(|(rule, result)| ReportLine {
            rule,
            description: rule.description(year),
            value: match result {
                Ok(output) => Ok(output.to_string()),
                Err(source) => Err(ReportError::Rule {
                    rule,
                    source: source.clone(),
                }),
            },
        })
        .collect();

    Report { year, lines }
}

impl Report {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Rendered lines, failures included.
    pub fn render(&self) -> Vec<String> {
        self.lines.iter().map(ReportLine::render).collect()
    }

    /// Write every line to `out`.
    ///
    /// A line that cannot be written is logged and replaced by a failure
    /// line, printed ahead of the next line that goes through (or at the
    /// end). The remaining lines are still attempted.
    pub fn write_to<W: Write>(&self, out: &mut W) -> WriteSummary {
        let mut summary = WriteSummary::default();
        let mut pending: Vec<String> = Vec::new();

        for line in &self.lines {
            if !line.is_ok() {
                warn!("{}", line.render());
            }

            write_pending(out, &mut pending);
            match write_line(out, &line.render()) {
                Ok(()) => summary.written += 1,
                Err(err) => {
                    summary.failed += 1;
                    let err = ReportError::from(err);
                    warn!("Failed to print {} line: {}", line.rule, err);
                    pending.push(failure_line(&line.description, &err));
                }
            }
        }

        write_pending(out, &mut pending);
        for note in &pending {
            warn!("Output rejected failure line: {}", note);
        }

        if let Err(err) = out.flush() {
            warn!("Failed to flush report output: {}", err);
        }
        summary
    }

    pub fn to_json(&self) -> serde_json::Value {
        let report = JsonReport {
            year: self.year,
            results: self
                .lines
                .iter()
                .map(|line| JsonLine {
                    rule: line.rule,
                    description: &line.description,
                    value: line.value.as_ref().ok().map(String::as_str),
                    error: line.value.as_ref().err().map(ToString::to_string),
                })
                .collect(),
        };
        serde_json::to_value(report).unwrap_or_else(|err| {
            serde_json::json!({ "year": self.year, "error": err.to_string() })
        })
    }

    /// Write in the requested format.
    pub fn write_format<W: Write>(&self, out: &mut W, format: ReportFormat) -> WriteSummary {
        match format {
            ReportFormat::Text => self.write_to(out),
            ReportFormat::Json => {
                let document = self.to_json();
                let written = serde_json::to_writer_pretty(&mut *out, &document)
                    .map_err(std::io::Error::from)
                    .and_then(|_| writeln!(out));
                match written {
                    Ok(()) => WriteSummary {
                        written: self.lines.len(),
                        failed: 0,
                    },
                    Err(err) => {
                        warn!("Failed to print JSON report: {}", err);
                        WriteSummary {
                            written: 0,
                            failed: self.lines.len(),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleOutput;
    use std::io;

    fn results() -> RuleResults {
        RuleResults::new(
            2006,
            vec![
                (
                    Rule::TopTitleWorldwide,
                    Ok(RuleOutput::Title("Wii Sports".to_string())),
                ),
                (
                    Rule::TopGenresEurope,
                    Ok(RuleOutput::Names(vec![
                        "Action".to_string(),
                        "Sports".to_string(),
                    ])),
                ),
                (
                    Rule::TopPlatformsNorthAmerica,
                    Err(RuleError::no_data(2006, "no releases above the sales threshold")),
                ),
                (
                    Rule::TopPublishersJapan,
                    Ok(RuleOutput::Names(vec!["Nintendo".to_string()])),
                ),
                (Rule::EuropeOverJapanCount, Ok(RuleOutput::Count(7))),
            ],
        )
    }

    /// Fails every write whose chunk contains `marker`.
    struct FailingWriter {
        marker: &'static str,
        buffer: Vec<u8>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if String::from_utf8_lossy(buf).contains(self.marker) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lines_follow_rule_order() {
        let report = build_report(&results());
        let rules: Vec<Rule> = report.lines().iter().map(ReportLine::rule).collect();
        assert_eq!(rules, Rule::ALL.to_vec());
    }

    #[test]
    fn test_render_lines() {
        let lines = build_report(&results()).render();

        assert_eq!(lines[0], "Best-selling game worldwide in 2006: Wii Sports");
        assert_eq!(lines[1], "Best-selling genres in Europe in 2006: Action,Sports");
        assert_eq!(
            lines[4],
            "Games that sold better in Europe than in Japan in 2006: 7"
        );
    }

    #[test]
    fn test_rule_failure_rendered_inline() {
        let lines = build_report(&results()).render();

        assert!(lines[2].starts_with(
            "Error printing data for Platforms with the most million-selling games in North America in 2006"
        ));
        assert!(lines[2].contains("no data for 2006"));
        assert_eq!(lines[3], "Publishers with the highest average sales in Japan in 2006: Nintendo");
    }

    #[test]
    fn test_write_to_buffer() {
        let report = build_report(&results());
        let mut out = Vec::new();

        let summary = report.write_to(&mut out);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert_eq!(summary, WriteSummary { written: 5, failed: 0 });
    }

    #[test]
    fn test_write_failure_does_not_stop_other_lines() {
        let report = build_report(&results());
        let mut out = FailingWriter {
            marker: "Action,Sports",
            buffer: Vec::new(),
        };

        let summary = report.write_to(&mut out);

        let text = String::from_utf8(out.buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(summary, WriteSummary { written: 4, failed: 1 });
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Best-selling game worldwide in 2006: Wii Sports");
        assert!(lines[1]
            .starts_with("Error printing data for Best-selling genres in Europe in 2006"));
        assert!(lines[1].contains("pipe closed"));
        assert!(!text.contains("Action,Sports"));
        assert_eq!(lines[4], "Games that sold better in Europe than in Japan in 2006: 7");
    }

    #[test]
    fn test_failed_last_line_is_reported_at_end() {
        let report = build_report(&results());
        let mut out = FailingWriter {
            marker: "2006: 7",
            buffer: Vec::new(),
        };

        let summary = report.write_to(&mut out);

        let text = String::from_utf8(out.buffer).unwrap();
        let last = text.lines().last().unwrap();
        assert_eq!(summary, WriteSummary { written: 4, failed: 1 });
        assert!(last.starts_with(
            "Error printing data for Games that sold better in Europe than in Japan in 2006"
        ));
    }

    /// Records every chunk handed to `write`.
    #[derive(Default)]
    struct ChunkWriter {
        chunks: Vec<String>,
    }

    impl Write for ChunkWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.chunks.push(String::from_utf8_lossy(buf).into_owned());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_each_line_is_written_in_one_piece() {
        let report = build_report(&results());
        let mut out = ChunkWriter::default();

        report.write_to(&mut out);

        assert_eq!(out.chunks.len(), 5);
        assert!(out.chunks.iter().all(|chunk| chunk.ends_with('\n')));
        let expected: Vec<String> = report.render().iter().map(|l| format!("{l}\n")).collect();
        assert_eq!(out.chunks, expected);
    }

    #[test]
    fn test_json_report() {
        let report = build_report(&results());
        let json = report.to_json();

        assert_eq!(json["year"], 2006);
        assert_eq!(json["results"][0]["rule"], "top_title_worldwide");
        assert_eq!(json["results"][1]["value"], "Action,Sports");
        assert!(json["results"][2]["value"].is_null());
        assert!(json["results"][2]["error"]
            .as_str()
            .unwrap()
            .contains("no data for 2006"));
    }

    #[test]
    fn test_write_json_format() {
        let report = build_report(&results());
        let mut out = Vec::new();

        let summary = report.write_format(&mut out, ReportFormat::Json);

        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["results"].as_array().unwrap().len(), 5);
        assert_eq!(summary.written, 5);
    }
}
