//! Bill extraction gateway.
//!
//! Turns raw PDF bytes into structured billing fields via the Gemini
//! generateContent API. The pipeline consumes the [`BillExtractor`] trait;
//! every failure sub-cause (transport, upstream status, malformed response,
//! schema validation) surfaces as a single [`AppError::Extraction`] kind.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::GeminiConfig;
use crate::error::{AppError, AppResult};
use crate::models::{EnergyLine, ExtractedBill};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const EXTRACTION_PROMPT: &str = "Extract the billing fields from this Brazilian electricity bill. \
Return JSON with: customer_number (the 'Nº DO CLIENTE' value), reference_month \
(the 'Referente a' month as MMM/YYYY, e.g. JAN/2024), electric_energy_kwh and \
electric_energy_value (the 'Energia Elétrica' line), sceee_energy_kwh and \
sceee_energy_value (the 'Energia SCEE s/ ICMS' line, null if absent), \
compensated_energy_kwh and compensated_energy_value (the 'Energia compensada GD I' \
line, null if absent), and public_lighting_value (the 'Contrib Ilum Publica Municipal' \
value, null if absent). Values are in BRL and may be negative.";

/// Extraction gateway contract consumed by the ingestion pipeline.
#[async_trait]
pub trait BillExtractor: Send + Sync {
    /// Extract structured, validated billing fields from raw PDF bytes.
    async fn extract(&self, bytes: &[u8], filename: &str) -> AppResult<ExtractedBill>;
}

/// Gemini-backed extractor. Constructed once at startup and injected into
/// the pipeline; no ambient client state.
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// JSON response schema sent with the request so the model returns a
    /// parseable object rather than free text.
    fn response_schema() -> serde_json::Value {
        let number = json!({"type": "number", "nullable": true});
        json!({
            "type": "object",
            "properties": {
                "customer_number": {"type": "string"},
                "reference_month": {"type": "string"},
                "electric_energy_kwh": {"type": "number"},
                "electric_energy_value": {"type": "number"},
                "sceee_energy_kwh": number,
                "sceee_energy_value": number,
                "compensated_energy_kwh": number,
                "compensated_energy_value": number,
                "public_lighting_value": number,
            },
            "required": ["customer_number", "reference_month", "electric_energy_kwh", "electric_energy_value"]
        })
    }

    async fn generate_content(&self, bytes: &[u8]) -> AppResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": "application/pdf",
                            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                        }
                    },
                    {"text": EXTRACTION_PROMPT}
                ]
            }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "response_schema": Self::response_schema(),
            }
        });

        let res = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Extraction(format!("Gemini request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(AppError::Extraction(format!(
                "Gemini API error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res
            .json()
            .await
            .map_err(|e| AppError::Extraction(format!("Invalid Gemini response body: {}", e)))?;

        let text = body
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                AppError::Extraction("Gemini response contained no text candidate".to_string())
            })?;

        Ok(text)
    }
}

#[async_trait]
impl BillExtractor for GeminiExtractor {
    async fn extract(&self, bytes: &[u8], filename: &str) -> AppResult<ExtractedBill> {
        info!("Requesting extraction for {} ({} bytes)", filename, bytes.len());
        let text = self.generate_content(bytes).await?;
        parse_extraction(&text)
    }
}

// Minimal view of the generateContent response.

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Raw extraction payload before validation. Numeric fields fail
/// deserialization on non-numeric input, which is the defined failure mode
/// for shape mismatches.
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    customer_number: Option<String>,
    #[serde(default)]
    reference_month: Option<String>,
    #[serde(default)]
    electric_energy_kwh: Option<f64>,
    #[serde(default)]
    electric_energy_value: Option<f64>,
    #[serde(default)]
    sceee_energy_kwh: Option<f64>,
    #[serde(default)]
    sceee_energy_value: Option<f64>,
    #[serde(default)]
    compensated_energy_kwh: Option<f64>,
    #[serde(default)]
    compensated_energy_value: Option<f64>,
    #[serde(default)]
    public_lighting_value: Option<f64>,
}

/// Validate-then-transform the model's JSON into an [`ExtractedBill`].
///
/// Required: non-empty customer number, non-empty reference month
/// (canonicalized to upper case), non-zero electric energy quantity.
/// A quantity/value pair where only one side is present is a shape
/// mismatch.
pub fn parse_extraction(text: &str) -> AppResult<ExtractedBill> {
    let raw: RawExtraction = serde_json::from_str(text)
        .map_err(|e| AppError::Extraction(format!("Malformed extraction payload: {}", e)))?;

    let customer_number = raw
        .customer_number
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Extraction("Missing customer number".to_string()))?
        .to_string();

    let reference_month = raw
        .reference_month
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Extraction("Missing reference month".to_string()))?
        .to_uppercase();

    let electric_energy = match (raw.electric_energy_kwh, raw.electric_energy_value) {
        (Some(quantity), Some(value)) => {
            if quantity == 0.0 {
                return Err(AppError::Extraction(
                    "Electric energy quantity is zero".to_string(),
                ));
            }
            EnergyLine { quantity, value }
        }
        _ => {
            return Err(AppError::Extraction(
                "Missing electric energy quantity/value".to_string(),
            ));
        }
    };

    Ok(ExtractedBill {
        customer_number,
        reference_month,
        electric_energy,
        sceee_energy: pair("SCEEE energy", raw.sceee_energy_kwh, raw.sceee_energy_value)?,
        compensated_energy: pair(
            "compensated energy",
            raw.compensated_energy_kwh,
            raw.compensated_energy_value,
        )?,
        public_lighting_value: raw.public_lighting_value,
    })
}

fn pair(label: &str, quantity: Option<f64>, value: Option<f64>) -> AppResult<Option<EnergyLine>> {
    match (quantity, value) {
        (Some(quantity), Some(value)) => Ok(Some(EnergyLine { quantity, value })),
        (None, None) => Ok(None),
        _ => Err(AppError::Extraction(format!(
            "Incomplete {} quantity/value pair",
            label
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let text = r#"{
            "customer_number": "7204076116",
            "reference_month": "jan/2024",
            "electric_energy_kwh": 50,
            "electric_energy_value": 45.67,
            "sceee_energy_kwh": 476,
            "sceee_energy_value": 392.5,
            "compensated_energy_kwh": 526,
            "compensated_energy_value": 438.17,
            "public_lighting_value": 23.45
        }"#;

        let bill = parse_extraction(text).expect("valid payload");
        assert_eq!(bill.customer_number, "7204076116");
        // Reference month is canonicalized to upper case
        assert_eq!(bill.reference_month, "JAN/2024");
        assert_eq!(bill.electric_energy.quantity, 50.0);
        assert_eq!(bill.sceee_energy.unwrap().value, 392.5);
        assert_eq!(bill.public_lighting_value, Some(23.45));
    }

    #[test]
    fn test_parse_minimal_payload() {
        let text = r#"{
            "customer_number": "123",
            "reference_month": "FEV/2024",
            "electric_energy_kwh": 50,
            "electric_energy_value": 45.67
        }"#;

        let bill = parse_extraction(text).expect("valid payload");
        assert!(bill.sceee_energy.is_none());
        assert!(bill.compensated_energy.is_none());
        assert!(bill.public_lighting_value.is_none());
    }

    #[test]
    fn test_missing_customer_number_fails() {
        let text = r#"{
            "customer_number": "  ",
            "reference_month": "JAN/2024",
            "electric_energy_kwh": 50,
            "electric_energy_value": 45.67
        }"#;

        let err = parse_extraction(text).unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
        assert!(err.to_string().contains("customer number"));
    }

    #[test]
    fn test_zero_electric_quantity_fails() {
        let text = r#"{
            "customer_number": "123",
            "reference_month": "JAN/2024",
            "electric_energy_kwh": 0,
            "electric_energy_value": 45.67
        }"#;

        let err = parse_extraction(text).unwrap_err();
        assert!(err.to_string().contains("quantity is zero"));
    }

    #[test]
    fn test_non_numeric_quantity_fails() {
        let text = r#"{
            "customer_number": "123",
            "reference_month": "JAN/2024",
            "electric_energy_kwh": "fifty",
            "electric_energy_value": 45.67
        }"#;

        let err = parse_extraction(text).unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }

    #[test]
    fn test_half_pair_fails() {
        let text = r#"{
            "customer_number": "123",
            "reference_month": "JAN/2024",
            "electric_energy_kwh": 50,
            "electric_energy_value": 45.67,
            "sceee_energy_kwh": 476
        }"#;

        let err = parse_extraction(text).unwrap_err();
        assert!(err.to_string().contains("SCEEE"));
    }

    #[test]
    fn test_garbage_payload_fails() {
        let err = parse_extraction("not json at all").unwrap_err();
        assert!(matches!(err, AppError::Extraction(_)));
    }
}
