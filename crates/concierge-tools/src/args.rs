//! Shared argument extraction helpers for handler groups.

use serde_json::Value;

use crate::error::{Result, ToolError};
use crate::outcome::ToolArguments;

/// Extract a required string argument.
pub fn require_str<'a>(args: &'a ToolArguments, field: &str, tool_name: &str) -> Result<&'a str> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidArguments {
            tool_name: tool_name.to_string(),
            reason: format!("missing required string field `{field}`"),
        })
}

/// Extract an optional string argument.
pub fn opt_str<'a>(args: &'a ToolArguments, field: &str) -> Option<&'a str> {
    args.get(field).and_then(Value::as_str)
}

/// Extract an optional integer argument.
pub fn opt_i64(args: &ToolArguments, field: &str) -> Option<i64> {
    args.get(field).and_then(Value::as_i64)
}

/// Extract a required positive amount. Accepts a JSON number or a numeric
/// string (providers are inconsistent about which they emit).
pub fn require_amount(args: &ToolArguments, field: &str, tool_name: &str) -> Result<f64> {
    let value = args.get(field).ok_or_else(|| ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason: format!("missing required field `{field}`"),
    })?;

    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match amount {
        Some(a) if a > 0.0 && a.is_finite() => Ok(a),
        _ => Err(ToolError::InvalidArguments {
            tool_name: tool_name.to_string(),
            reason: format!("field `{field}` must be a positive number"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: serde_json::Value) -> ToolArguments {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn require_str_reports_field_name() {
        let err = require_str(&args(json!({})), "iban", "payment_qr").unwrap_err();
        assert!(err.to_string().contains("iban"));
    }

    #[test]
    fn amount_accepts_number_and_string() {
        assert_eq!(
            require_amount(&args(json!({"amount": 12.5})), "amount", "t").unwrap(),
            12.5
        );
        assert_eq!(
            require_amount(&args(json!({"amount": "42.00"})), "amount", "t").unwrap(),
            42.0
        );
    }

    #[test]
    fn amount_rejects_zero_and_garbage() {
        assert!(require_amount(&args(json!({"amount": 0})), "amount", "t").is_err());
        assert!(require_amount(&args(json!({"amount": "abc"})), "amount", "t").is_err());
        assert!(require_amount(&args(json!({"amount": -3})), "amount", "t").is_err());
    }
}
