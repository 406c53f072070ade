use pedal_common::IdentificationResult;

use super::IdentifyError;

/// Parse raw model text into an identification result
///
/// Models sometimes wrap the object in a code fence or prose; only the
/// outermost `{...}` is decoded. Anything that does not decode is a failure,
/// there is no partial result.
pub fn parse_model_output(raw: &str) -> Result<IdentificationResult, IdentifyError> {
    let json_str = extract_json_object(raw).ok_or_else(|| {
        IdentifyError::MalformedResponse("no JSON object in model output".to_string())
    })?;

    let result = IdentificationResult::from_json(json_str)
        .map_err(|e| IdentifyError::MalformedResponse(e.to_string()))?;

    let duplicates = result.duplicate_reasoning();
    if !duplicates.is_empty() {
        tracing::warn!(
            count = duplicates.len(),
            "Model repeated reasoning text across pedals"
        );
    }

    Ok(result)
}

/// Extract the outermost JSON object substring
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}
