//! Built-in example reports, keyed by their intended audience.

use chat_flow::AudienceMode;
use serde::{Deserialize, Serialize};

const PATIENT_SAMPLE_REPORT: &str = r#"PATIENT NAME: John Doe
DATE: 2023-10-27
TEST: Complete Blood Count (CBC)

RESULTS:
- White Blood Cell Count (WBC): 8.5 x10^9/L (Normal: 4.5-11.0)
- Red Blood Cell Count (RBC): 4.9 x10^12/L (Normal: 4.7-6.1)
- Hemoglobin (HGB): 15.0 g/dL (Normal: 14-18)
- Hematocrit (HCT): 45% (Normal: 42-52%)
- Platelet Count (PLT): 140 x10^9/L (Normal: 150-450)

NOTE: Platelet count is slightly below the normal range. Consider follow-up."#;

const DOCTOR_SAMPLE_REPORT: &str = r#"PATIENT: Jane Smith
SPECIMEN: Biopsy, left breast mass

MICROSCOPIC DESCRIPTION:
Sections show an infiltrative neoplasm composed of pleomorphic ductal epithelial cells arranged in nests and cords. There is prominent desmoplastic stromal reaction. Lymphovascular invasion is identified.

IMMUNOHISTOCHEMISTRY:
- ER: Positive (95%, strong intensity)
- PR: Positive (80%, strong intensity)
- Her2/neu: Negative (1+ by IHC)
- Ki-67: 25%

DIAGNOSIS:
Invasive Ductal Carcinoma, Grade 2.
ER/PR positive, Her2/neu negative. Recommend discussing treatment options including endocrine therapy."#;

/// Which sample report to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Patient,
    Doctor,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }

    /// The audience the sample was written for. Sample runs prompt the model
    /// under this mode even when the user's role pins the transcript.
    pub fn audience(&self) -> AudienceMode {
        match self {
            Self::Patient => AudienceMode::Patient,
            Self::Doctor => AudienceMode::Doctor,
        }
    }

    pub fn report_text(&self) -> &'static str {
        match self {
            Self::Patient => PATIENT_SAMPLE_REPORT,
            Self::Doctor => DOCTOR_SAMPLE_REPORT,
        }
    }

    /// The transcript entry shown for the run.
    pub fn display_line(&self) -> String {
        format!("Analyzing sample {} report...", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_map_to_their_audience() {
        assert_eq!(SampleKind::Patient.audience(), AudienceMode::Patient);
        assert_eq!(SampleKind::Doctor.audience(), AudienceMode::Doctor);
    }

    #[test]
    fn sample_reports_are_non_empty_and_distinct() {
        assert!(SampleKind::Patient.report_text().contains("Complete Blood Count"));
        assert!(SampleKind::Doctor.report_text().contains("IMMUNOHISTOCHEMISTRY"));
    }
}
