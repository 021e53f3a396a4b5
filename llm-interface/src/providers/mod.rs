mod gemini;
mod openrouter;

pub use gemini::GeminiProvider;
pub use openrouter::OpenRouterProvider;

use async_trait::async_trait;
use marketsnipe_core::{CoreError, LlmError, ProductContext};

/// Turns a startup description into a one-sentence scraping instruction.
#[async_trait]
pub trait PromptGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_instruction(&self, context: &ProductContext) -> Result<String, CoreError>;
}

/// Missing keys surface per call so routes that don't need the key keep working.
fn require_key<'a>(
    key: Option<&'a str>,
    provider: &str,
    var_name: &str,
) -> Result<&'a str, CoreError> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(LlmError::MissingApiKey {
            provider: provider.to_string(),
            var_name: var_name.to_string(),
        }
        .into()),
    }
}

fn require_context(context: &ProductContext) -> Result<(), CoreError> {
    if context.is_empty() {
        return Err(LlmError::InvalidRequest {
            details: "Provide either product/problem fields or a single input string."
                .to_string(),
        }
        .into());
    }
    Ok(())
}
