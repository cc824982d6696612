//! Fixed prompt for the preventive-medicine assistant.
//!
//! The wrapper follows the Mistral-Instruct chat format that BioMistral was
//! tuned on; changing the layout changes model behaviour.

/// Sentence every answer must end with.
pub const DISCLAIMER: &str = "This is general health information only – not a medical diagnosis \
     or treatment. Please consult a qualified healthcare professional.";

/// Role and style instructions placed before the user's question.
pub const SYSTEM_PROMPT: &str = concat!(
    "You are a helpful, kind and experienced doctor specialized in preventive medicine. ",
    "Answer in clear, simple language. Use bullet points when giving advice. ",
    "Be empathetic and supportive. ",
    "Always finish your answer with this exact sentence:\n",
    "'This is general health information only – not a medical diagnosis or treatment. ",
    "Please consult a qualified healthcare professional.'"
);

pub const INST_OPEN: &str = "[INST]";
pub const INST_CLOSE: &str = "[/INST]";

/// Render the full prompt for `question`. Surrounding whitespace is dropped.
pub fn render_prompt(question: &str) -> String {
    format!(
        "{} {}\n\n{} {}",
        INST_OPEN,
        SYSTEM_PROMPT,
        question.trim(),
        INST_CLOSE
    )
}

/// Whether `text` ends with the disclaimer, ignoring trailing whitespace and quotes.
pub fn ends_with_disclaimer(text: &str) -> bool {
    text.trim_end()
        .trim_end_matches(['\'', '"', '”', '’'])
        .ends_with(DISCLAIMER)
}
