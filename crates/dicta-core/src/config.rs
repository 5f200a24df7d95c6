/// Credentials picked up from the environment (and a `.env` file when
/// present). The settings file takes priority; these are the fallback.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    pub stt_api_key: Option<String>,
    pub llm_api_key: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let stt_api_key = ["DICTA_STT_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty());

        let llm_api_key = ["DICTA_LLM_API_KEY", "GEMINI_API_KEY"]
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .filter(|v| !v.is_empty());

        Self {
            stt_api_key,
            llm_api_key,
        }
    }
}
