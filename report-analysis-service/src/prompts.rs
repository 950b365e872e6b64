//! Prompt corpus: system instructions per audience mode, the analysis
//! templates that wrap extracted report text, and the welcome copy served
//! with an empty transcript.

use chat_flow::AudienceMode;
use serde::Serialize;

/// The JSON shape the model is instructed to answer with. Mirrors
/// [`chat_flow::StructuredResponse`].
const RESPONSE_SHAPE: &str = r#"{
  "summary": string,
  "keyFindings": [
    {
      "title": string,
      "explanation": string,
      "severity": "info" | "low" | "medium" | "high",
      "affectedBodyPart": "head" | "heart" | "lungs" | "liver" | "kidneys" | "stomach" | "blood" | "general" (optional)
    }
  ],
  "labResults": [
    {
      "name": string,
      "value": string,
      "unit": string,
      "normalRange": "min-max",
      "status": "low" | "normal" | "high" | "abnormal" | "positive" | "negative" | "na"
    }
  ] (optional),
  "visualizations": [
    {"title": string, "type": "bar", "data": [{"label": string, "value": number}]}
  ] (optional),
  "doctorAdvice": {"title": string, "advice": string, "recommendations": [string]} (optional)
}"#;

const DOCTOR_SYSTEM_PROMPT: &str = r#"You are an expert medical analysis AI for doctors. When given a medical report, respond with ONLY a JSON object in this shape:

{shape}

- 'summary': Provide a concise clinical summary highlighting critical data points.
- 'keyFindings': Detail significant findings, differential diagnoses, and potential next steps. Use technical language. Set severity based on clinical urgency. Tag each finding with the affected body part when one applies.
- 'labResults': Extract all quantitative lab results precisely.
- 'visualizations': Include a bar chart when comparing quantitative values aids interpretation.
- Do not include 'doctorAdvice'.

Your tone must be professional, technical, and data-driven. Do not mix prose and JSON; answer with the JSON object only."#;

const PATIENT_SYSTEM_PROMPT: &str = r#"You are a friendly and empathetic medical analysis AI for patients. When given a medical report, respond with ONLY a JSON object in this shape:

{shape}

- 'summary': Explain the report's purpose and overall result in simple, easy-to-understand language. Avoid jargon.
- 'keyFindings': Break down complex terms and findings. For each finding, explain what it means in a reassuring tone. Set severity to 'high' for anything that requires immediate consultation, 'medium' for follow-ups, and 'low' or 'info' for minor notes. Tag each finding with the affected body part when one applies.
- 'labResults': Extract key lab results and explain what each test measures.
- 'doctorAdvice': Practical guidance the patient can bring to their doctor, with a short list of recommendations.

IMPORTANT: You must never provide a diagnosis or medical advice. Always end the summary with a clear disclaimer to consult their doctor. Do not mix prose and JSON; answer with the JSON object only."#;

pub fn system_prompt(mode: AudienceMode) -> String {
    let template = match mode {
        AudienceMode::Doctor => DOCTOR_SYSTEM_PROMPT,
        AudienceMode::Patient => PATIENT_SYSTEM_PROMPT,
    };
    template.replace("{shape}", RESPONSE_SHAPE)
}

/// Model sampling temperature per audience: near-deterministic for clinical
/// output, warmer for patient-facing language.
pub fn temperature(mode: AudienceMode) -> f64 {
    match mode {
        AudienceMode::Doctor => 0.2,
        AudienceMode::Patient => 0.7,
    }
}

pub fn report_analysis_prompt(text: &str) -> String {
    format!(
        "Please provide a detailed analysis and structured breakdown of the following medical report from a PDF:\n\n---\n\n{text}"
    )
}

pub fn sample_analysis_prompt(text: &str) -> String {
    format!(
        "Please provide a detailed analysis and structured breakdown of the following sample medical report:\n\n---\n\n{text}"
    )
}

/// Copy shown by clients in place of an empty transcript.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeCopy {
    pub title: &'static str,
    pub description: &'static str,
    pub disclaimer: &'static str,
}

pub fn welcome_copy(mode: AudienceMode) -> WelcomeCopy {
    match mode {
        AudienceMode::Patient => WelcomeCopy {
            title: "Patient Mode",
            description: "Welcome! You can ask questions about your health, upload a medical report for a simplified explanation, or try a sample report.",
            disclaimer: "Disclaimer: I am an AI assistant and not a medical professional. Please consult your doctor for any medical advice.",
        },
        AudienceMode::Doctor => WelcomeCopy {
            title: "Doctor Mode",
            description: "Ready to assist, Doctor. Ask for clinical references, dosage guidelines, upload a report, or use a sample for quick analysis.",
            disclaimer: "Disclaimer: This tool is for informational purposes only and is not a substitute for professional clinical judgment.",
        },
    }
}
