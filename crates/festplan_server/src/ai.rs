//! Generative-text collaborator: client, recipe cache and handlers.
//!
//! # Responsibility
//! - Call the external text-generation service with a prompt and parse its
//!   JSON-shaped reply.
//! - Cache recipe lookups per normalized dish name, bounded FIFO.
//!
//! # Invariants
//! - Cached recipe entries are treated as immutable once computed.
//! - The core plan service consumes nothing from this module and exposes
//!   nothing to it.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, info};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Grocery categories the export view understands, in display order.
const GROCERY_CATEGORIES: [&str; 6] = [
    "Obst & Gemüse",
    "Kühlregal",
    "Fleisch & Fisch",
    "Vorratsschrank",
    "Getränke",
    "Haushalt & Sonstiges",
];

/// Connection settings for the text-generation service.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub recipe_cache_capacity: usize,
}

#[derive(Debug)]
pub enum AiError {
    Http(reqwest::Error),
    UpstreamStatus(u16),
    MalformedReply(String),
}

impl Display for AiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(err) => write!(f, "{err}"),
            Self::UpstreamStatus(status) => {
                write!(f, "text-generation service answered status {status}")
            }
            Self::MalformedReply(message) => write!(f, "malformed model reply: {message}"),
        }
    }
}

impl Error for AiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::UpstreamStatus(_) => None,
            Self::MalformedReply(_) => None,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

/// Narrow client for the generative-text collaborator.
pub struct AiClient {
    http: reqwest::Client,
    config: AiConfig,
    recipe_cache: Mutex<RecipeCache>,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| format!("failed to build HTTP client: {err}"))?;

        Ok(Self {
            http,
            recipe_cache: Mutex::new(RecipeCache::new(config.recipe_cache_capacity)),
            config,
        })
    }

    /// Looks up recipe details for a dish, serving repeats from the cache.
    pub async fn recipe(&self, dish_name: &str) -> Result<Value, AiError> {
        let cache_key = normalize_dish_name(dish_name);
        if let Some(cached) = self.recipe_cache.lock().get(&cache_key) {
            info!("event=ai_recipe module=ai status=ok source=cache");
            return Ok(cached);
        }

        let prompt = format!(
            "Liefere ein JSON-Objekt zum Gericht \"{dish_name}\" mit den Feldern: \
             url (string, Link zu einem passenden Rezept), \
             ingredients (Array von Einkaufszutaten auf Deutsch), \
             instructions (Array kurzer Zubereitungsschritte), \
             calories (ganze Zahl, kcal pro Portion). Antworte nur mit JSON."
        );
        let reply = self.generate_json(&prompt).await?;

        self.recipe_cache.lock().insert(cache_key, reply.clone());
        info!("event=ai_recipe module=ai status=ok source=model");
        Ok(reply)
    }

    /// Suggests dish names matching a partial query.
    pub async fn suggest(&self, query: &str) -> Result<Value, AiError> {
        let prompt = format!(
            "Liefere ein JSON-Objekt {{\"suggestions\": [...]}} mit bis zu 5 \
             Gerichtsnamen (Deutsch), die zu \"{query}\" passen. Antworte nur mit JSON."
        );
        let reply = self.generate_json(&prompt).await?;
        Ok(shape_suggestions(reply))
    }

    /// Sorts grocery items into the fixed export categories.
    pub async fn categorize(&self, items: &[String]) -> Result<Value, AiError> {
        let listing = items.join("\n- ");
        let categories = GROCERY_CATEGORIES.join("\", \"");
        let prompt = format!(
            "Ordne jeden der folgenden Einkaufsartikel genau einer dieser Kategorien \
             zu: \"{categories}\". Liefere ein JSON-Objekt mit den Kategorien als \
             Schlüsseln und Arrays der Artikeltexte als Werten. Artikel:\n- {listing}\n\
             Antworte nur mit JSON."
        );
        let reply = self.generate_json(&prompt).await?;
        Ok(shape_categories(reply))
    }

    async fn generate_json(&self, prompt: &str) -> Result<Value, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let request = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"response_mime_type": "application/json"},
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::UpstreamStatus(status.as_u16()));
        }

        let reply: Value = response.json().await?;
        let text = reply
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| AiError::MalformedReply("reply carries no text part".to_string()))?;

        parse_json_reply(text)
    }
}

/// Process-wide recipe cache: normalized dish name -> model reply.
///
/// FIFO-bounded; entries are never invalidated because replies are treated
/// as immutable once computed.
struct RecipeCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, Value>,
}

impl RecipeCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: Value) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }
}

fn normalize_dish_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Model replies arrive as JSON text, sometimes wrapped in a code fence.
fn parse_json_reply(text: &str) -> Result<Value, AiError> {
    let trimmed = text.trim();
    let without_fence = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.strip_suffix("```").unwrap_or(rest))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(without_fence)
        .map_err(|err| AiError::MalformedReply(format!("reply is not valid JSON: {err}")))
}

fn shape_suggestions(reply: Value) -> Value {
    match reply {
        Value::Array(entries) => json!({ "suggestions": entries }),
        Value::Object(ref map) if map.contains_key("suggestions") => reply,
        _ => json!({ "suggestions": [] }),
    }
}

/// Keeps only the known categories and guarantees every category key is
/// present, so the export view can iterate a fixed order.
fn shape_categories(reply: Value) -> Value {
    let source = reply.as_object().cloned().unwrap_or_default();
    let mut shaped = Map::new();
    for category in GROCERY_CATEGORIES {
        let entries = source
            .get(category)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        shaped.insert(category.to_string(), Value::Array(entries));
    }
    Value::Object(shaped)
}

#[derive(Debug, Deserialize)]
pub struct RecipeRequest {
    pub dish_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct CategorizeRequest {
    pub items: Vec<String>,
}

/// `POST /api/ai/recipe`
pub async fn recipe_handler(
    State(state): State<AppState>,
    Json(request): Json<RecipeRequest>,
) -> Response {
    let Some(client) = state.ai else {
        return unconfigured();
    };
    match client.recipe(&request.dish_name).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => upstream_error("ai_recipe", &err),
    }
}

/// `POST /api/ai/suggest`
pub async fn suggest_handler(
    State(state): State<AppState>,
    Json(request): Json<SuggestRequest>,
) -> Response {
    let Some(client) = state.ai else {
        return unconfigured();
    };
    match client.suggest(&request.query).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => upstream_error("ai_suggest", &err),
    }
}

/// `POST /api/ai/categorize`
pub async fn categorize_handler(
    State(state): State<AppState>,
    Json(request): Json<CategorizeRequest>,
) -> Response {
    let Some(client) = state.ai else {
        return unconfigured();
    };
    match client.categorize(&request.items).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => upstream_error("ai_categorize", &err),
    }
}

fn unconfigured() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({"error": "Text generation is not configured"})),
    )
        .into_response()
}

fn upstream_error(event: &str, err: &AiError) -> Response {
    error!("event={event} module=ai status=error error={err}");
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({"error": "Text generation failed"})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dish_names_normalize_case_and_whitespace() {
        assert_eq!(normalize_dish_name("  Käsespätzle "), "käsespätzle");
    }

    #[test]
    fn json_replies_survive_code_fences() {
        let fenced = "```json\n{\"url\": \"https://example.test\"}\n```";
        let parsed = parse_json_reply(fenced).unwrap();
        assert_eq!(parsed["url"], "https://example.test");

        let bare = "{\"calories\": 650}";
        assert_eq!(parse_json_reply(bare).unwrap()["calories"], 650);

        assert!(parse_json_reply("no json here").is_err());
    }

    #[test]
    fn suggestions_are_wrapped_when_the_model_returns_an_array() {
        let shaped = shape_suggestions(json!(["Raclette", "Fondue"]));
        assert_eq!(shaped["suggestions"][1], "Fondue");

        let passthrough = shape_suggestions(json!({"suggestions": ["Gans"]}));
        assert_eq!(passthrough["suggestions"][0], "Gans");

        assert_eq!(shape_suggestions(json!(42))["suggestions"], json!([]));
    }

    #[test]
    fn categories_are_filtered_to_the_known_set() {
        let shaped = shape_categories(json!({
            "Getränke": ["Glühwein"],
            "Erfundene Kategorie": ["Milch"],
        }));
        assert_eq!(shaped["Getränke"], json!(["Glühwein"]));
        assert!(shaped.get("Erfundene Kategorie").is_none());
        assert_eq!(shaped["Obst & Gemüse"], json!([]));
    }

    #[test]
    fn recipe_cache_evicts_oldest_entry_at_capacity() {
        let mut cache = RecipeCache::new(2);
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        cache.insert("c".to_string(), json!(3));

        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn recipe_cache_overwrites_existing_key_without_eviction() {
        let mut cache = RecipeCache::new(2);
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        cache.insert("a".to_string(), json!(10));

        assert_eq!(cache.get("a"), Some(json!(10)));
        assert_eq!(cache.get("b"), Some(json!(2)));
    }
}
