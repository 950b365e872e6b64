//! The contract for model replies.
//!
//! The hosted model is instructed to answer with JSON in this shape. Payloads
//! come from an untrusted boundary, so deserialization degrades instead of
//! failing: unknown enum values map to a neutral variant and optional
//! sections simply stay absent.

use serde::{Deserialize, Serialize};

/// Severity grade of a finding. Unknown wire values degrade to `Info`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Info,
        }
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Anatomical tag for a finding. `General` is the "not localized" sentinel
/// and also the fallback for unknown wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BodyPart {
    Head,
    Heart,
    Lungs,
    Liver,
    Kidneys,
    Stomach,
    Blood,
    General,
}

impl From<String> for BodyPart {
    fn from(value: String) -> Self {
        match value.as_str() {
            "head" => Self::Head,
            "heart" => Self::Heart,
            "lungs" => Self::Lungs,
            "liver" => Self::Liver,
            "kidneys" => Self::Kidneys,
            "stomach" => Self::Stomach,
            "blood" => Self::Blood,
            _ => Self::General,
        }
    }
}

impl BodyPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Head => "head",
            Self::Heart => "heart",
            Self::Lungs => "lungs",
            Self::Liver => "liver",
            Self::Kidneys => "kidneys",
            Self::Stomach => "stomach",
            Self::Blood => "blood",
            Self::General => "general",
        }
    }
}

/// Status of a lab result relative to its normal range. Unknown wire values
/// degrade to `Na`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LabStatus {
    Low,
    Normal,
    High,
    Abnormal,
    Positive,
    Negative,
    Na,
}

impl From<String> for LabStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "low" => Self::Low,
            "normal" => Self::Normal,
            "high" => Self::High,
            "abnormal" => Self::Abnormal,
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Na,
        }
    }
}

impl LabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Abnormal => "abnormal",
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Na => "na",
        }
    }

    /// Whether this status flags the result as out of range.
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Low | Self::High | Self::Abnormal | Self::Positive)
    }
}

/// Chart kind. Only bar charts are supported; anything else deserializes to
/// `Unsupported` and renders nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ChartKind {
    Bar,
    Unsupported,
}

impl From<String> for ChartKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "bar" => Self::Bar,
            _ => Self::Unsupported,
        }
    }
}

/// One discrete observation extracted from a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFinding {
    pub title: String,
    pub explanation: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_body_part: Option<BodyPart>,
}

/// One quantitative lab result. `value` and `normal_range` are free-form
/// strings; the renderer decides whether they are numeric enough to chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResult {
    pub name: String,
    pub value: String,
    pub unit: String,
    pub normal_range: String,
    pub status: LabStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorAdvice {
    pub title: String,
    pub advice: String,
    pub recommendations: Vec<String>,
}

/// The full structured reply the model is instructed to return.
///
/// `summary` is the only strictly required field; each optional field
/// independently controls one display section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResponse {
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<KeyFinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_results: Option<Vec<LabResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualizations: Option<Vec<Visualization>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_advice: Option<DoctorAdvice>,
}

impl StructuredResponse {
    /// Build the payload used when an exchange fails. It is a valid instance
    /// of the schema, so failures flow through the normal rendering path.
    pub fn failure(summary: &str, finding_title: &str, explanation: &str) -> Self {
        Self {
            summary: summary.to_string(),
            key_findings: vec![KeyFinding {
                title: finding_title.to_string(),
                explanation: explanation.to_string(),
                severity: Severity::High,
                affected_body_part: None,
            }],
            lab_results: None,
            visualizations: None,
            doctor_advice: None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("structured response serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_enum_values_degrade_instead_of_failing() {
        let payload = r#"{
            "summary": "ok",
            "keyFindings": [
                {"title": "t", "explanation": "e", "severity": "critical", "affectedBodyPart": "spleen"}
            ],
            "labResults": [
                {"name": "n", "value": "1", "unit": "u", "normalRange": "0-2", "status": "borderline"}
            ],
            "visualizations": [
                {"title": "v", "type": "pie", "data": [{"label": "a", "value": 1.0}]}
            ]
        }"#;

        let parsed: StructuredResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.key_findings[0].severity, Severity::Info);
        assert_eq!(parsed.key_findings[0].affected_body_part, Some(BodyPart::General));
        assert_eq!(parsed.lab_results.as_ref().unwrap()[0].status, LabStatus::Na);
        assert_eq!(
            parsed.visualizations.as_ref().unwrap()[0].kind,
            ChartKind::Unsupported
        );
    }

    #[test]
    fn optional_sections_default_to_absent() {
        let parsed: StructuredResponse =
            serde_json::from_str(r#"{"summary": "just a summary"}"#).unwrap();
        assert!(parsed.key_findings.is_empty());
        assert!(parsed.lab_results.is_none());
        assert!(parsed.visualizations.is_none());
        assert!(parsed.doctor_advice.is_none());
    }

    #[test]
    fn missing_summary_is_a_parse_error() {
        assert!(serde_json::from_str::<StructuredResponse>(r#"{"keyFindings": []}"#).is_err());
    }

    #[test]
    fn failure_payload_round_trips_through_the_schema() {
        let payload = StructuredResponse::failure("broken", "Analysis Error", "details").to_json();
        let parsed: StructuredResponse = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed.key_findings.len(), 1);
        assert_eq!(parsed.key_findings[0].severity, Severity::High);
    }

    #[test]
    fn severity_ordering_matches_urgency() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }
}
