// Conversational assistant grounded in the stored records.
//
// The system prompt embeds the whole dataset. It is built on the first turn
// and reused for the rest of the process, even if the store changes later.
use crate::error::{AppError, Result};
use crate::gateway::RecordStore;
use crate::types::{ChatResult, ProductionRecord};
use crate::util::parse_f64_safe;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub const CONTEXT_UNAVAILABLE: &str =
    "Error al cargar los datos de sensores. Por favor, intenta más tarde.";
pub const CHAT_FAILED_MESSAGE: &str = "Error al procesar tu mensaje. Por favor, intenta de nuevo.";

pub const TEMPERATURE: f32 = 0.2;
pub const MAX_TOKENS: u32 = 500;

const CONTEXT_PREAMBLE: &str = r#"Eres un asistente especializado en análisis de datos de producción energética.
Dispones de los datos completos de la tabla de producción registrada en la base de datos.

Reglas:
- Responde exclusivamente usando los datos listados aquí.
- Las comparaciones de "departamento" deben ser insensibles a mayúsculas/minúsculas.
- Para fechas y periodos, usa siempre el campo "fecha" (ignora "created_at").
- Si no existe información para algo, responde claramente que no se encuentra en la base.
- No inventes ni estimes información fuera de lo que está en los registros.
- Todas las cifras deben basarse en la suma o conteo real de los registros.
- Si la pregunta se refiere a un periodo de tiempo, filtra por el campo "fecha".
- No imagines ni supongas datos que no estén en los registros.
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Marker pair around the model's hidden reasoning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkDelimiters {
    pub open: String,
    pub close: String,
}

impl Default for ThinkDelimiters {
    fn default() -> Self {
        Self::new("◁think▷", "◁/think▷")
    }
}

impl ThinkDelimiters {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self { open: open.into(), close: close.into() }
    }

    /// Non-greedy, dot-matches-newline pattern for one hidden span.
    pub fn to_regex(&self) -> Result<Regex> {
        let pattern = format!(
            "(?s){}.*?{}",
            regex::escape(&self.open),
            regex::escape(&self.close)
        );
        Regex::new(&pattern).map_err(|e| AppError::Config(format!("think delimiters: {}", e)))
    }
}

/// Remove every hidden-reasoning span and trim the rest.
pub fn clean_reply(raw: &str, pattern: &Regex) -> String {
    pattern.replace_all(raw, "").trim().to_string()
}

// Projection of a record handed to the model.
#[derive(Debug, Serialize)]
struct ContextRow {
    departamento: String,
    tecnologia: String,
    produccion_mwh: Value,
    fecha: String,
    #[serde(rename = "año")]
    year: Value,
    mes: Value,
    #[serde(rename = "día")]
    day: Value,
}

// Values already written as plain numbers become JSON numbers; anything
// whose text a number would not reproduce ("07", "12.50", huge years) stays
// text as stored.
fn raw_value(s: Option<&str>) -> Value {
    let text = match s {
        None | Some("") => return Value::String(String::new()),
        Some(text) => text,
    };
    if let Ok(n) = text.parse::<i64>() {
        if n.to_string() == text {
            return json!(n);
        }
    }
    if text.contains('.') {
        if let Some(n) = parse_f64_safe(Some(text)).filter(|n| n.to_string() == text) {
            return json!(n);
        }
    }
    Value::String(text.to_string())
}

impl From<&ProductionRecord> for ContextRow {
    fn from(r: &ProductionRecord) -> Self {
        let production = match r.production_mwh.as_deref() {
            None | Some("") => json!(0),
            other => raw_value(other),
        };
        ContextRow {
            departamento: r.department.as_deref().unwrap_or("").to_lowercase(),
            tecnologia: r.technology.clone().unwrap_or_default(),
            produccion_mwh: production,
            fecha: r.date.clone().unwrap_or_default(),
            year: raw_value(r.year.as_deref()),
            mes: raw_value(r.month.as_deref()),
            day: raw_value(r.day.as_deref()),
        }
    }
}

/// System prompt for the given records.
pub fn build_context(records: &[ProductionRecord]) -> Result<String> {
    let rows: Vec<ContextRow> = records.iter().map(ContextRow::from).collect();
    let data = serde_json::to_string_pretty(&rows)?;
    Ok(format!("{}\n📊 Datos completos:\n{}\n", CONTEXT_PREAMBLE, data))
}

/// Process-lifetime memo of the system prompt.
///
/// Only a successfully built context is stored; while the store is
/// unreachable every call returns `CONTEXT_UNAVAILABLE` and tries again next
/// time.
#[derive(Debug, Default)]
pub struct ContextCache {
    cell: OnceCell<String>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> Option<&str> {
        self.cell.get().map(String::as_str)
    }

    pub async fn get_or_build(&self, store: &dyn RecordStore) -> String {
        if let Some(context) = self.cell.get() {
            return context.clone();
        }
        let built = match store.fetch_all().await {
            Ok(records) => build_context(&records),
            Err(e) => Err(e),
        };
        match built {
            Ok(context) => {
                info!("chat context built ({} bytes)", context.len());
                // A concurrent builder may have won; keep whichever landed first.
                self.cell.get_or_init(|| context).clone()
            }
            Err(e) => {
                error!("failed to load records for chat context: {}", e);
                CONTEXT_UNAVAILABLE.to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// OpenAI-compatible chat completions through OpenRouter.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport(format!(
                "completion request failed with status {}: {}",
                status, body
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("unreadable completion: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Transport("completion without content".to_string()))
    }
}

/// One assistant per process; it owns the context memo.
pub struct Assistant<'a> {
    store: &'a dyn RecordStore,
    client: &'a dyn CompletionClient,
    model: String,
    hidden: Regex,
    context: ContextCache,
}

impl<'a> Assistant<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        client: &'a dyn CompletionClient,
        model: impl Into<String>,
        delimiters: &ThinkDelimiters,
    ) -> Result<Self> {
        Ok(Self {
            store,
            client,
            model: model.into(),
            hidden: delimiters.to_regex()?,
            context: ContextCache::new(),
        })
    }

    pub fn context(&self) -> &ContextCache {
        &self.context
    }

    pub async fn send_message(&self, message: &str, history: &[ChatMessage]) -> ChatResult {
        match self.exchange(message, history).await {
            Ok(reply) => ChatResult {
                success: true,
                reply: Some(reply),
                error: None,
            },
            Err(e) => {
                error!("chat turn failed: {}", e);
                ChatResult {
                    success: false,
                    reply: None,
                    error: Some(CHAT_FAILED_MESSAGE.to_string()),
                }
            }
        }
    }

    async fn exchange(&self, message: &str, history: &[ChatMessage]) -> Result<String> {
        let context = self.context.get_or_build(self.store).await;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new(Role::System, context));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::new(Role::User, message));

        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let raw = self.client.complete(&request).await?;
        let cleaned = clean_reply(&raw, &self.hidden);
        if cleaned.is_empty() {
            warn!("model reply was empty after removing hidden reasoning");
        }
        Ok(cleaned)
    }
}
