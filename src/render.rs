//! Presentation layer over the visualization output.
//!
//! The core classifies bytes; this module turns a classification into either
//! ANSI-colored text for the terminal or a JSON report for tooling.

use anyhow::Result;
use serde::Serialize;

use crate::compile::{Captured, MatchOutcome};
use crate::config::ColorScheme;
use crate::visualize::Visualization;

/// Render the analyzed source with one SGR span per attribute run.
///
/// With `color` off the source passes through unchanged.
pub fn render_ansi(
    source: &[u8],
    viz: &Visualization,
    scheme: &ColorScheme,
    color: bool,
) -> String {
    if !color {
        return String::from_utf8_lossy(source).into_owned();
    }
    let mut out = String::new();
    for run in viz.runs() {
        let end = run.end.min(source.len());
        if end <= run.start {
            continue;
        }
        let text = String::from_utf8_lossy(&source[run.start..end]);
        out.push_str("\x1b[");
        out.push_str(scheme.code(run.attr));
        out.push('m');
        out.push_str(&text);
        out.push_str("\x1b[0m");
    }
    out
}

#[derive(Serialize)]
struct Report {
    matched: bool,
    captures: Vec<ReportCapture>,
    spans: Vec<ReportSpan>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ReportCapture {
    Node {
        tag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        start: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        end: Option<usize>,
    },
    Name {
        value: String,
    },
    Absent,
}

#[derive(Serialize)]
struct ReportSpan {
    start: usize,
    end: usize,
    attribute: &'static str,
}

/// Machine-readable run report: match outcome, captures, and the
/// per-attribute byte spans of the visualization.
pub fn render_json(outcome: &MatchOutcome, viz: &Visualization) -> Result<String> {
    let captures = outcome
        .captures
        .iter()
        .map(|c| match c {
            Captured::Node { tag, span, .. } => ReportCapture::Node {
                tag: tag.clone(),
                start: span.map(|s| s.start),
                end: span.map(|s| s.end),
            },
            Captured::Name(value) => ReportCapture::Name {
                value: value.clone(),
            },
            Captured::Absent => ReportCapture::Absent,
        })
        .collect();

    let spans = viz
        .runs()
        .into_iter()
        .map(|run| ReportSpan {
            start: run.start,
            end: run.end,
            attribute: run.attr.label(),
        })
        .collect();

    let report = Report {
        matched: outcome.matched,
        captures,
        spans,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::DebugCompiler;
    use crate::pattern::parse_pattern;
    use crate::ruby::analyze;
    use crate::trace::Trace;
    use crate::visualize::visualize;

    fn run_pipeline(pattern: &str, source: &str) -> (MatchOutcome, Visualization, Vec<u8>) {
        let analysis = analyze(source.as_bytes()).unwrap();
        let ast = parse_pattern(pattern).unwrap();
        let compiled = DebugCompiler::new().compile(&ast).unwrap();
        let mut trace = Trace::new();
        let outcome = compiled.run_traced(&analysis.root, &mut trace).unwrap();
        let viz = visualize(&analysis.root, &trace, analysis.source.len());
        (outcome, viz, analysis.source)
    }

    #[test]
    fn ansi_output_wraps_runs_in_sgr() {
        let (_, viz, source) = run_pipeline("(send nil? :foo)", "foo");
        let scheme = ColorScheme::default();
        let out = render_ansi(&source, &viz, &scheme, true);
        assert_eq!(out, "\x1b[32mfoo\x1b[0m");
    }

    #[test]
    fn no_color_passes_source_through() {
        let (_, viz, source) = run_pipeline("(send nil? :foo)", "foo");
        let scheme = ColorScheme::default();
        assert_eq!(render_ansi(&source, &viz, &scheme, false), "foo");
    }

    #[test]
    fn failed_match_renders_red() {
        let (outcome, viz, source) = run_pipeline("(send nil? :foo)", "bar");
        assert!(!outcome.matched);
        let scheme = ColorScheme::default();
        let out = render_ansi(&source, &viz, &scheme, true);
        assert_eq!(out, "\x1b[31mbar\x1b[0m");
    }

    #[test]
    fn json_report_shape() {
        let (outcome, viz, _) = run_pipeline("(send $_ :abs)", "1.abs");
        let json = render_json(&outcome, &viz).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["matched"], true);
        assert_eq!(value["captures"][0]["kind"], "node");
        assert_eq!(value["captures"][0]["tag"], "int");
        assert_eq!(value["spans"][0]["attribute"], "matched");
    }

    #[test]
    fn json_report_failed_run() {
        let (outcome, viz, _) = run_pipeline("(send nil? :foo)", "bar");
        let json = render_json(&outcome, &viz).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["matched"], false);
        assert!(value["captures"].as_array().unwrap().is_empty());
        assert_eq!(value["spans"][0]["attribute"], "not_matched");
    }
}
