use chatdbg_core::error::AppError;
use serde::de::DeserializeOwned;

/// Remove at most one surrounding markdown code fence (```` ``` ```` or ```` ```json ````).
pub fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return t;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match body.split_once('\n') {
        Some((info, inner)) if info.trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            inner.trim()
        }
        _ => body.trim(),
    }
}

/// Decode model output that must be a JSON document. Fails closed with `code`.
pub fn decode_structured<T: DeserializeOwned>(
    raw: &str,
    code: &str,
    what: &str,
) -> Result<T, AppError> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).map_err(|e| {
        AppError::new(code, format!("Model returned malformed {what}"))
            .with_details(format!("err={e}; output={}", preview(raw)))
    })
}

fn preview(raw: &str) -> String {
    const MAX: usize = 200;
    match raw.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &raw[..i]),
        None => raw.to_string(),
    }
}
