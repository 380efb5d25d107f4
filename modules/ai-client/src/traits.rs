use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::schema::StructuredOutput;

/// A chat-capable AI provider. Object-safe so callers can hold a chain of
/// providers behind `Arc<dyn ChatProvider>` and try them in order.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider label for logs ("anthropic", "openai").
    fn name(&self) -> &str;

    /// Single-shot completion: one system prompt, one user prompt, text back.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Structured extraction against a JSON schema. Returns the raw JSON
    /// value; callers deserialize via [`extract`].
    async fn extract_value(
        &self,
        system: &str,
        user: &str,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value>;
}

/// Deserialize a provider's structured output into `T`.
pub async fn extract<T: StructuredOutput>(
    provider: &dyn ChatProvider,
    system: &str,
    user: &str,
) -> Result<T> {
    let value = provider
        .extract_value(system, user, T::provider_schema())
        .await?;
    serde_json::from_value(value)
        .map_err(|e| anyhow!("Failed to deserialize {} response: {e}", provider.name()))
}
