use serde_json::from_str;
use tracing::debug;

use super::AssistantReply;

/// Pull a reply object out of whatever the model produced.
///
/// Models wrap JSON in code fences or chatter around it; anything that still
/// does not parse is treated as a plain conversational answer.
pub fn parse_reply(text: &str) -> AssistantReply {
    let trimmed = strip_code_fence(text.trim());

    if let Ok(reply) = from_str::<AssistantReply>(trimmed) {
        return reply;
    }

    // Look for the first '{' and last '}' to extract the JSON object
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            let json_part = &text[start..=end];
            match from_str::<AssistantReply>(json_part) {
                Ok(reply) => return reply,
                Err(e) => debug!("Found JSON-like structure but couldn't parse it: {}", e),
            }
        }
    }

    AssistantReply {
        message: text.trim().to_string(),
        events: Vec::new(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    if text.starts_with("```") && text.ends_with("```") && text.len() >= 6 {
        let inner = &text[3..text.len() - 3];
        inner.strip_prefix("json").unwrap_or(inner).trim()
    } else {
        text
    }
}
