//! Built-in payment QR tool.
//!
//! Builds an EPC069-12 payload (the "Girocode" understood by European
//! banking apps) for a SEPA credit transfer. The payload is returned as a
//! `qr` artifact for the UI to render; this module does no rasterization.

use serde_json::json;

use crate::args;
use crate::definition::ToolDefinition;
use crate::error::Result;
use crate::outcome::{Artifact, ToolArguments, ToolOutcome};

/// Name of the built-in payment QR tool.
pub const PAYMENT_QR_TOOL: &str = "payment_qr";

/// Maximum remittance text length allowed by the EPC standard.
const MAX_REMITTANCE_CHARS: usize = 140;

/// Definition of the payment QR tool for the model.
pub fn definition() -> ToolDefinition {
    ToolDefinition::new(
        PAYMENT_QR_TOOL,
        "Generate a scannable SEPA payment QR code (EPC/Girocode) for a bank transfer.",
        json!({
            "type": "object",
            "properties": {
                "recipient": {
                    "type": "string",
                    "description": "Name of the payee as registered with their bank"
                },
                "iban": {
                    "type": "string",
                    "description": "IBAN of the payee account"
                },
                "amount": {
                    "type": "number",
                    "description": "Transfer amount, must be positive"
                },
                "currency": {
                    "type": "string",
                    "description": "ISO 4217 currency code, defaults to EUR"
                },
                "reference": {
                    "type": "string",
                    "description": "Optional remittance text shown to the payee"
                }
            },
            "required": ["recipient", "iban", "amount"]
        }),
    )
}

/// Execute the payment QR tool.
///
/// All required fields present: `success=true` plus a `qr` artifact.
/// Any missing or invalid field: a descriptive failure and no artifact.
pub fn execute(arguments: &ToolArguments) -> Result<ToolOutcome> {
    let recipient = args::require_str(arguments, "recipient", PAYMENT_QR_TOOL)?.trim();
    let iban_raw = args::require_str(arguments, "iban", PAYMENT_QR_TOOL)?;
    let amount = args::require_amount(arguments, "amount", PAYMENT_QR_TOOL)?;
    let currency = args::opt_str(arguments, "currency")
        .unwrap_or("EUR")
        .trim()
        .to_ascii_uppercase();
    let reference = args::opt_str(arguments, "reference").unwrap_or("").trim();

    if recipient.is_empty() {
        return Ok(ToolOutcome::failure(format!(
            "invalid arguments for `{PAYMENT_QR_TOOL}`: `recipient` must not be empty"
        )));
    }

    let iban = match normalize_iban(iban_raw) {
        Some(iban) => iban,
        None => {
            return Ok(ToolOutcome::failure(format!(
                "invalid arguments for `{PAYMENT_QR_TOOL}`: `{iban_raw}` is not a plausible IBAN"
            )));
        }
    };

    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(ToolOutcome::failure(format!(
            "invalid arguments for `{PAYMENT_QR_TOOL}`: `{currency}` is not an ISO 4217 currency code"
        )));
    }

    let remittance: String = reference.chars().take(MAX_REMITTANCE_CHARS).collect();
    let payload = epc_payload(recipient, &iban, &currency, amount, &remittance);

    let fields = json!({
        "recipient": recipient,
        "iban": iban,
        "amount": format!("{amount:.2}"),
        "currency": currency,
    });

    Ok(ToolOutcome::success_json(fields).with_artifact(Artifact {
        kind: "qr".into(),
        payload: json!({ "format": "epc", "data": payload }),
        caption: Some(format!("Pay {amount:.2} {currency} to {recipient}")),
    }))
}

/// Assemble the line-oriented EPC069-12 payload.
///
/// Field order is fixed by the standard: service tag, version, charset,
/// identification, BIC (empty — optional since v2), name, IBAN, amount,
/// purpose (empty), structured reference (empty), remittance text.
fn epc_payload(
    recipient: &str,
    iban: &str,
    currency: &str,
    amount: f64,
    remittance: &str,
) -> String {
    format!("BCD\n002\n1\nSCT\n\n{recipient}\n{iban}\n{currency}{amount:.2}\n\n\n{remittance}")
}

/// Strip spaces and validate the basic IBAN shape: two letters, two digits,
/// 11 to 30 alphanumerics. Full checksum validation is the bank's problem.
fn normalize_iban(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if compact.len() < 15 || compact.len() > 34 {
        return None;
    }
    let bytes = compact.as_bytes();
    let country_ok = bytes[0].is_ascii_uppercase() && bytes[1].is_ascii_uppercase();
    let check_ok = bytes[2].is_ascii_digit() && bytes[3].is_ascii_digit();
    let body_ok = compact[4..].chars().all(|c| c.is_ascii_alphanumeric());

    (country_ok && check_ok && body_ok).then_some(compact)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arguments(value: serde_json::Value) -> ToolArguments {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn complete_arguments_yield_artifact() {
        let outcome = execute(&arguments(json!({
            "recipient": "Jane Doe",
            "iban": "DE89 3704 0044 0532 0130 00",
            "amount": 12.5,
            "reference": "Invoice 42"
        })))
        .unwrap();

        assert!(outcome.is_success());
        let artifact = outcome.artifact().expect("qr artifact");
        assert_eq!(artifact.kind, "qr");

        let data = artifact.payload["data"].as_str().unwrap();
        let lines: Vec<&str> = data.split('\n').collect();
        assert_eq!(lines[0], "BCD");
        assert_eq!(lines[3], "SCT");
        assert_eq!(lines[5], "Jane Doe");
        assert_eq!(lines[6], "DE89370400440532013000");
        assert_eq!(lines[7], "EUR12.50");
        assert_eq!(lines[10], "Invoice 42");
    }

    #[test]
    fn missing_required_field_fails_without_artifact() {
        let err = execute(&arguments(json!({
            "recipient": "Jane Doe",
            "amount": 10
        })))
        .unwrap_err();
        assert!(err.to_string().contains("iban"));
    }

    #[test]
    fn implausible_iban_fails_without_artifact() {
        let outcome = execute(&arguments(json!({
            "recipient": "Jane Doe",
            "iban": "not-an-iban",
            "amount": 10
        })))
        .unwrap();
        assert!(!outcome.is_success());
        assert!(outcome.artifact().is_none());
    }

    #[test]
    fn custom_currency_is_uppercased() {
        let outcome = execute(&arguments(json!({
            "recipient": "Shop",
            "iban": "NL91ABNA0417164300",
            "amount": 3,
            "currency": "chf"
        })))
        .unwrap();
        let data = outcome.artifact().unwrap().payload["data"].as_str().unwrap();
        assert!(data.contains("CHF3.00"));
    }
}
