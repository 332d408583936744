//! Built-in provider catalog
//!
//! Metadata only. Constructors are injected into the `ProviderBuilder` by the
//! host application.

use super::descriptor::ProviderDescriptor;
use crate::traits::ProviderCapabilities;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEEPSEEK_ANTHROPIC_BASE_URL: &str = "https://api.deepseek.com/anthropic";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const XAI_BASE_URL: &str = "https://api.x.ai/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const SILICONFLOW_BASE_URL: &str = "https://api.siliconflow.cn/v1";
pub const MOONSHOT_BASE_URL: &str = "https://api.moonshot.cn/v1";
pub const MOONSHOT_ANTHROPIC_BASE_URL: &str = "https://api.moonshot.cn/anthropic";
pub const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
pub const ZHIPU_ANTHROPIC_BASE_URL: &str = "https://open.bigmodel.cn/api/anthropic";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Descriptors for the natively supported and common OpenAI-compatible vendors.
pub fn builtin_providers() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor::direct("openai", "OpenAI")
            .with_base_url(OPENAI_BASE_URL)
            .with_capabilities(
                ProviderCapabilities::text()
                    .with_tools()
                    .with_vision()
                    .with_reasoning()
                    .with_structured_output()
                    .with_embedding(),
            )
            .with_model("gpt-4o")
            .with_model("gpt-4o-mini")
            .with_model("o3-mini"),
        ProviderDescriptor::direct("anthropic", "Anthropic")
            .with_base_url(ANTHROPIC_BASE_URL)
            .with_capabilities(
                ProviderCapabilities::text()
                    .with_tools()
                    .with_vision()
                    .with_reasoning(),
            )
            .with_model("claude-3-5-sonnet-20241022")
            .with_model("claude-3-5-haiku-20241022"),
        ProviderDescriptor::direct("gemini", "Google Gemini")
            .with_base_url(GEMINI_BASE_URL)
            .with_alias("google")
            .with_capabilities(
                ProviderCapabilities::text()
                    .with_tools()
                    .with_vision()
                    .with_reasoning()
                    .with_structured_output()
                    .with_embedding(),
            )
            .with_model("gemini-2.0-flash")
            .with_model("gemini-1.5-pro"),
        ProviderDescriptor::openai_compatible("deepseek", "DeepSeek", DEEPSEEK_BASE_URL)
            .with_anthropic_base_url(DEEPSEEK_ANTHROPIC_BASE_URL)
            .with_capabilities(ProviderCapabilities::text().with_tools().with_reasoning())
            .with_model("deepseek-chat")
            .with_model("deepseek-reasoner"),
        ProviderDescriptor::openai_compatible("groq", "Groq", GROQ_BASE_URL)
            .with_capabilities(ProviderCapabilities::text().with_tools())
            .with_model("llama-3.3-70b-versatile"),
        ProviderDescriptor::direct("xai", "xAI")
            .with_base_url(XAI_BASE_URL)
            .with_capabilities(ProviderCapabilities::text().with_tools().with_reasoning())
            .with_model("grok-3"),
        ProviderDescriptor::openai_compatible("openrouter", "OpenRouter", OPENROUTER_BASE_URL)
            .with_capabilities(ProviderCapabilities::text().with_tools().with_vision()),
        ProviderDescriptor::openai_compatible("siliconflow", "SiliconFlow", SILICONFLOW_BASE_URL)
            .with_capabilities(ProviderCapabilities::text().with_tools().with_embedding()),
        ProviderDescriptor::openai_compatible("moonshot", "Moonshot AI", MOONSHOT_BASE_URL)
            .with_anthropic_base_url(MOONSHOT_ANTHROPIC_BASE_URL)
            .with_alias("kimi")
            .with_capabilities(ProviderCapabilities::text().with_tools()),
        ProviderDescriptor::openai_compatible("zhipu", "Zhipu AI", ZHIPU_BASE_URL)
            .with_anthropic_base_url(ZHIPU_ANTHROPIC_BASE_URL)
            .with_alias("glm")
            .with_capabilities(ProviderCapabilities::text().with_tools().with_vision()),
        ProviderDescriptor::custom("ollama", "Ollama", OLLAMA_BASE_URL),
    ]
}
