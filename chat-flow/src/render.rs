//! Projection of raw model payloads into display sections.
//!
//! Each AI transcript entry is re-parsed on render. The projection is pure:
//! the same payload always yields the same view, and a payload that is not
//! valid structured data falls back to a verbatim raw-text view instead of
//! an error. Sections degrade independently, so one malformed field never
//! hides its siblings.

use serde::Serialize;

use crate::schema::{
    BodyPart, ChartKind, KeyFinding, LabStatus, Severity, StructuredResponse, Visualization,
};

/// Result of rendering one AI transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RenderedReply {
    /// The payload parsed as a structured response.
    Structured(ResponseView),
    /// The payload was not valid structured data; show it verbatim behind a
    /// "could not parse" indicator.
    Unparsed { raw: String },
}

/// Per-section view of one structured response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView {
    pub summary: String,
    pub charts: Vec<ChartView>,
    pub findings: Vec<FindingView>,
    pub body: Option<BodyDiagramView>,
    pub advice: Option<AdviceView>,
    pub labs: Vec<LabView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub title: String,
    pub bars: Vec<BarView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarView {
    pub label: String,
    pub value: f64,
    /// Bar length as a percentage of the chart's largest value.
    pub width_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingView {
    pub title: String,
    pub explanation: String,
    pub severity: Severity,
}

/// Findings that name a concrete body part, plus the worst severity seen per
/// part for the silhouette. `blood` findings are listed but have no
/// silhouette region; `general` findings are not localized at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyDiagramView {
    pub part_severities: Vec<PartSeverity>,
    pub localized: Vec<LocalizedFindingView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSeverity {
    pub part: BodyPart,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedFindingView {
    pub part: BodyPart,
    pub title: String,
    pub explanation: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceView {
    pub title: String,
    pub advice: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabView {
    pub name: String,
    pub value: String,
    pub unit: String,
    pub normal_range: String,
    pub status: LabStatus,
    pub flagged: bool,
    /// Gauge position (0-100) inside the normal range. Absent whenever the
    /// value or the range is not numeric; the textual fields still render.
    pub marker: Option<f64>,
}

/// Render one raw model payload. Never panics, never errors.
pub fn render_reply(text: &str) -> RenderedReply {
    match serde_json::from_str::<StructuredResponse>(text) {
        Ok(response) => RenderedReply::Structured(project(response)),
        Err(_) => RenderedReply::Unparsed {
            raw: text.to_string(),
        },
    }
}

fn project(response: StructuredResponse) -> ResponseView {
    let charts = response
        .visualizations
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .filter_map(chart_view)
        .collect();

    let findings = response
        .key_findings
        .iter()
        .map(|finding| FindingView {
            title: finding.title.clone(),
            explanation: finding.explanation.clone(),
            severity: finding.severity,
        })
        .collect();

    let body = body_diagram(&response.key_findings);

    let advice = response.doctor_advice.map(|advice| AdviceView {
        title: advice.title,
        advice: advice.advice,
        recommendations: advice.recommendations,
    });

    let labs = response
        .lab_results
        .unwrap_or_default()
        .into_iter()
        .map(|lab| {
            let marker = lab_marker(&lab.value, &lab.normal_range);
            LabView {
                name: lab.name,
                value: lab.value,
                unit: lab.unit,
                normal_range: lab.normal_range,
                status: lab.status,
                flagged: lab.status.is_flagged(),
                marker,
            }
        })
        .collect();

    ResponseView {
        summary: response.summary,
        charts,
        findings,
        body,
        advice,
        labs,
    }
}

/// Unsupported chart kinds render nothing rather than failing the response.
fn chart_view(chart: &Visualization) -> Option<ChartView> {
    if chart.kind != ChartKind::Bar {
        return None;
    }

    let max = chart
        .data
        .iter()
        .map(|point| point.value)
        .fold(0.0_f64, f64::max);

    let bars = chart
        .data
        .iter()
        .map(|point| BarView {
            label: point.label.clone(),
            value: point.value,
            width_pct: if max > 0.0 {
                point.value / max * 100.0
            } else {
                0.0
            },
        })
        .collect();

    Some(ChartView {
        title: chart.title.clone(),
        bars,
    })
}

fn body_diagram(findings: &[KeyFinding]) -> Option<BodyDiagramView> {
    let localized: Vec<(&KeyFinding, BodyPart)> = findings
        .iter()
        .filter_map(|finding| match finding.affected_body_part {
            Some(part) if part != BodyPart::General => Some((finding, part)),
            _ => None,
        })
        .collect();

    if localized.is_empty() {
        return None;
    }

    // Worst severity per part, in first-seen order. Blood has no silhouette
    // region so it only appears in the list below.
    let mut part_severities: Vec<PartSeverity> = Vec::new();
    for (finding, part) in &localized {
        if *part == BodyPart::Blood {
            continue;
        }
        match part_severities.iter_mut().find(|entry| entry.part == *part) {
            Some(entry) => {
                if finding.severity > entry.severity {
                    entry.severity = finding.severity;
                }
            }
            None => part_severities.push(PartSeverity {
                part: *part,
                severity: finding.severity,
            }),
        }
    }

    let localized = localized
        .into_iter()
        .map(|(finding, part)| LocalizedFindingView {
            part,
            title: finding.title.clone(),
            explanation: finding.explanation.clone(),
            severity: finding.severity,
        })
        .collect();

    Some(BodyDiagramView {
        part_severities,
        localized,
    })
}

/// Gauge position for a lab value inside its normal range, or `None` when
/// either side is not numeric.
fn lab_marker(value: &str, normal_range: &str) -> Option<f64> {
    let parts: Vec<&str> = normal_range.split('-').collect();
    if parts.len() != 2 {
        return None;
    }
    let min = leading_number(parts[0])?;
    let max = leading_number(parts[1])?;
    let value = leading_number(value)?;
    Some(marker_position(value, min, max))
}

fn marker_position(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        return 0.0;
    }
    if value > max {
        return 100.0;
    }
    if (max - min).abs() < f64::EPSILON {
        return 50.0;
    }
    (value - min) / (max - min) * 100.0
}

/// Parse the leading numeric prefix of a free-form value such as `"45%"` or
/// `"15.0 g/dL"`.
fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        let accepted = ch.is_ascii_digit() || ch == '.' || (idx == 0 && (ch == '+' || ch == '-'));
        if !accepted {
            break;
        }
        end = idx + ch.len_utf8();
    }
    text[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_PAYLOAD: &str = r#"{
        "summary": "Overall the report is reassuring.",
        "keyFindings": [
            {"title": "Low platelets", "explanation": "Slightly below range.", "severity": "medium", "affectedBodyPart": "blood"},
            {"title": "Murmur", "explanation": "Soft systolic murmur.", "severity": "low", "affectedBodyPart": "heart"},
            {"title": "Murmur follow-up", "explanation": "Needs echo.", "severity": "high", "affectedBodyPart": "heart"},
            {"title": "Hydration", "explanation": "Drink more water.", "severity": "info", "affectedBodyPart": "general"}
        ],
        "labResults": [
            {"name": "HGB", "value": "15.0", "unit": "g/dL", "normalRange": "14-18", "status": "normal"},
            {"name": "HCT", "value": "45%", "unit": "%", "normalRange": "42-52", "status": "normal"},
            {"name": "Culture", "value": "positive", "unit": "", "normalRange": "negative", "status": "positive"}
        ],
        "visualizations": [
            {"title": "Counts", "type": "bar", "data": [{"label": "WBC", "value": 8.5}, {"label": "PLT", "value": 140.0}]},
            {"title": "Trend", "type": "line", "data": [{"label": "a", "value": 1.0}]}
        ],
        "doctorAdvice": {"title": "Plan", "advice": "Recheck in two weeks.", "recommendations": ["CBC", "Echo"]}
    }"#;

    fn structured(reply: RenderedReply) -> ResponseView {
        match reply {
            RenderedReply::Structured(view) => view,
            RenderedReply::Unparsed { raw } => panic!("expected structured view, got raw: {raw}"),
        }
    }

    #[test]
    fn unparseable_payload_falls_back_to_raw_text() {
        let reply = render_reply("the model answered in prose");
        assert_eq!(
            reply,
            RenderedReply::Unparsed {
                raw: "the model answered in prose".to_string()
            }
        );
    }

    #[test]
    fn rendering_is_idempotent() {
        assert_eq!(render_reply(FULL_PAYLOAD), render_reply(FULL_PAYLOAD));
    }

    #[test]
    fn all_sections_project_from_a_full_payload() {
        let view = structured(render_reply(FULL_PAYLOAD));

        assert_eq!(view.findings.len(), 4);
        assert_eq!(view.labs.len(), 3);
        assert_eq!(view.charts.len(), 1, "unsupported chart kinds are skipped");
        assert!(view.advice.is_some());

        let body = view.body.expect("localized findings produce a diagram");
        // Blood is listed but never part of the silhouette; general is dropped.
        assert_eq!(body.localized.len(), 3);
        assert_eq!(body.part_severities.len(), 1);
        assert_eq!(body.part_severities[0].part, BodyPart::Heart);
        assert_eq!(body.part_severities[0].severity, Severity::High);
    }

    #[test]
    fn missing_optional_sections_render_only_summary_and_findings() {
        let view = structured(render_reply(
            r#"{"summary": "s", "keyFindings": [{"title": "t", "explanation": "e", "severity": "low"}]}"#,
        ));
        assert_eq!(view.summary, "s");
        assert_eq!(view.findings.len(), 1);
        assert!(view.charts.is_empty());
        assert!(view.labs.is_empty());
        assert!(view.body.is_none());
        assert!(view.advice.is_none());
    }

    #[test]
    fn out_of_set_severity_renders_as_info() {
        let view = structured(render_reply(
            r#"{"summary": "s", "keyFindings": [{"title": "t", "explanation": "e", "severity": "catastrophic"}]}"#,
        ));
        assert_eq!(view.findings[0].severity, Severity::Info);
    }

    #[test]
    fn non_numeric_lab_fields_omit_the_marker() {
        let view = structured(render_reply(
            r#"{"summary": "s", "keyFindings": [], "labResults": [
                {"name": "a", "value": "12", "unit": "", "normalRange": "abc", "status": "normal"},
                {"name": "b", "value": "positive", "unit": "", "normalRange": "10-20", "status": "na"}
            ]}"#,
        ));
        assert_eq!(view.labs.len(), 2, "textual fields still render");
        assert!(view.labs[0].marker.is_none());
        assert!(view.labs[1].marker.is_none());
    }

    #[test]
    fn marker_positions_clamp_and_interpolate() {
        let view = structured(render_reply(FULL_PAYLOAD));
        // 15.0 in 14-18 -> 25%.
        assert_eq!(view.labs[0].marker, Some(25.0));
        // "45%" has a numeric prefix; 45 in 42-52 -> 30%.
        let marker = view.labs[1].marker.expect("numeric prefix parses");
        assert!((marker - 30.0).abs() < 1e-9);

        assert_eq!(marker_position(1.0, 2.0, 4.0), 0.0);
        assert_eq!(marker_position(5.0, 2.0, 4.0), 100.0);
        assert_eq!(marker_position(3.0, 3.0, 3.0), 50.0);
    }

    #[test]
    fn bar_widths_scale_to_the_largest_value() {
        let view = structured(render_reply(FULL_PAYLOAD));
        let chart = &view.charts[0];
        assert_eq!(chart.bars[1].width_pct, 100.0);
        assert!((chart.bars[0].width_pct - 8.5 / 140.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn all_zero_chart_renders_zero_widths() {
        let view = structured(render_reply(
            r#"{"summary": "s", "keyFindings": [], "visualizations": [
                {"title": "z", "type": "bar", "data": [{"label": "a", "value": 0.0}]}
            ]}"#,
        ));
        assert_eq!(view.charts[0].bars[0].width_pct, 0.0);
    }

    #[test]
    fn body_diagram_absent_when_nothing_is_localized() {
        let view = structured(render_reply(
            r#"{"summary": "s", "keyFindings": [
                {"title": "t", "explanation": "e", "severity": "low", "affectedBodyPart": "general"},
                {"title": "u", "explanation": "e", "severity": "low"}
            ]}"#,
        ));
        assert!(view.body.is_none());
    }
}
