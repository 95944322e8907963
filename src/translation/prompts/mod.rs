/*!
 * Prompt construction for chunk translation.
 */

pub mod templates;

// Re-export main types
pub use templates::{PromptTemplate, SOURCE_TEXT_MARKER, extract_source_text};
