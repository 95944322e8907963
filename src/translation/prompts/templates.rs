/*!
 * Prompt template for chunk translation.
 *
 * The instructions are constant for every call; only the language names and
 * the chunk text vary. The chunk text always follows `SOURCE_TEXT_MARKER` at
 * the very end of the prompt.
 */

/// Line that introduces the chunk text at the end of every prompt
pub const SOURCE_TEXT_MARKER: &str = "Text:\n";

/// Instruction template for translating one markup chunk.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Instructions with the language names already substituted
    instructions: String,
}

impl PromptTemplate {
    /// The fixed instructions prepended to every chunk.
    pub const BOOK_TRANSLATOR: &'static str = r#"You are a professional literary translator.
Task: translate the following passage of a novel from {source_language} into {target_language}, in natural narrative prose.
Strict rules:
1. Never translate HTML markup: tags, attribute names and attribute values (such as <p>, <div>, class, id) stay exactly as they are.
2. Preserve the structure of the text exactly.
3. Do not add introductions, notes or explanations. Output only the translated text.
4. If you find text you cannot understand or unusual symbols, leave them unchanged."#;

    /// Create the template for a language pair, given display names.
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            instructions: Self::BOOK_TRANSLATOR
                .replace("{source_language}", source_language)
                .replace("{target_language}", target_language),
        }
    }

    /// Render the full prompt for one chunk.
    pub fn render(&self, text: &str) -> String {
        format!("{}\n\n{}{}", self.instructions, SOURCE_TEXT_MARKER, text)
    }
}

/// Recover the chunk text from a rendered prompt
///
/// Returns the whole prompt when the marker is absent.
pub fn extract_source_text(prompt: &str) -> &str {
    prompt
        .split_once(&format!("\n\n{}", SOURCE_TEXT_MARKER))
        .map(|(_, text)| text)
        .unwrap_or(prompt)
}
