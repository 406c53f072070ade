use pedal_common::Advice;
use serde_json::{json, Value};

/// Text sent alongside the image in the user turn
pub const USER_INSTRUCTION: &str =
    "Identify every guitar effects pedal in this photo and appraise each one.";

/// System prompt: appraiser persona plus the output contract
pub fn system_prompt() -> String {
    let advice = Advice::ALL
        .iter()
        .map(|a| format!("\"{}\"", a.label()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a veteran gear appraiser who has spent decades behind the counter of a \
vintage guitar shop. You have handled every boutique, mass-market and obscure effects pedal \
ever made, and you have strong, good-humoured opinions about all of them.\n\n\
You will be given a photo that may contain one or more guitar effects pedals.\n\n\
For EACH distinct pedal you can see:\n\
- Identify the make (manufacturer) and model. If the make cannot be read, use an empty string.\n\
- Give a confidence between 0 and 1 for the identification. Omit it if you cannot judge.\n\
- Estimate the current used market price in US dollars as a plain number. \
Use null if you cannot estimate a price. Never guess wildly.\n\
- Give advice: exactly one of {advice}.\n\
- Write reasoning in your appraiser voice: one or two sentences explaining the price and advice. \
Every pedal's reasoning must be different; never repeat yourself.\n\n\
Then write an overallAssessment: a short, characterful summary of the collection as a whole. \
Omit it if there are no pedals.\n\n\
If no pedals are visible, return an empty pedalIdentifications array.\n\n\
Output ONLY a JSON object matching this shape, nothing else:\n\
{{\"pedalIdentifications\":[{{\"make\":\"...\",\"model\":\"...\",\"confidence\":0.9,\
\"estimatedUsedPrice\":62.5,\"advice\":\"Keep\",\"reasoning\":\"...\"}}],\
\"overallAssessment\":\"...\"}}",
        advice = advice
    )
}

/// JSON schema constraining the model's response
pub fn response_schema() -> Value {
    let advice: Vec<&str> = Advice::ALL.iter().map(|a| a.label()).collect();

    json!({
        "type": "object",
        "properties": {
            "pedalIdentifications": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "make": { "type": "string", "description": "Manufacturer of the pedal" },
                        "model": { "type": "string", "description": "Model of the pedal" },
                        "confidence": {
                            "type": "number",
                            "minimum": 0,
                            "maximum": 1,
                            "description": "Confidence score of the identification"
                        },
                        "estimatedUsedPrice": {
                            "type": ["number", "null"],
                            "description": "Estimated used price in USD, null when unknown"
                        },
                        "advice": { "type": "string", "enum": advice },
                        "reasoning": {
                            "type": "string",
                            "description": "Appraiser's explanation, unique per pedal"
                        }
                    },
                    "required": ["make", "model", "estimatedUsedPrice", "advice", "reasoning"]
                }
            },
            "overallAssessment": {
                "type": "string",
                "description": "Summary of the whole collection"
            }
        },
        "required": ["pedalIdentifications"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_lists_every_advice_value() {
        let prompt = system_prompt();
        for advice in Advice::ALL {
            assert!(prompt.contains(&format!("\"{}\"", advice.label())));
        }
        assert!(prompt.contains("pedalIdentifications"));
        assert!(prompt.contains("estimatedUsedPrice"));
    }

    #[test]
    fn test_schema_advice_enum() {
        let schema = response_schema();
        let values = schema["properties"]["pedalIdentifications"]["items"]["properties"]["advice"]
            ["enum"]
            .as_array()
            .unwrap();
        assert_eq!(values.len(), 4);
        assert!(values.contains(&Value::from("Buy If Cheap")));
    }
}
