//! Persona catalog loading.
//!
//! Accepts either a name-keyed JSON object or a JSON list of entries and
//! resolves both into fully specified [`Persona`] values.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use baatein_core::types::Persona;

use crate::error::ChatError;

/// On-disk entry before defaults are applied.
#[derive(Debug, Deserialize)]
struct PersonaEntry {
    #[serde(default)]
    name: Option<String>,
    system_prompt: String,
    chat_model: String,
    voice: String,
    #[serde(default)]
    tts_model: Option<String>,
    #[serde(default)]
    sort_order: Option<i64>,
}

/// Immutable set of personas, shared read-only by every session.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: Vec<Arc<Persona>>,
    index: HashMap<String, usize>,
}

impl PersonaCatalog {
    /// Parse a catalog from JSON source.
    ///
    /// `default_tts_model` fills entries that omit `tts_model`; entries that
    /// omit `sort_order` rank by their position in the source.
    pub fn load(source: &str, default_tts_model: &str) -> Result<Self, ChatError> {
        let value: Value = serde_json::from_str(source)
            .map_err(|e| ChatError::Validation(format!("malformed JSON: {}", e)))?;

        let entries: Vec<(String, Value)> = match value {
            Value::Object(map) => map.into_iter().collect(),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let name = item
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .ok_or_else(|| {
                            ChatError::Validation(format!("entry {} is missing a name", i))
                        })?;
                    Ok((name, item))
                })
                .collect::<Result<_, ChatError>>()?,
            _ => {
                return Err(ChatError::Validation(
                    "expected a JSON object or list of personas".to_string(),
                ))
            }
        };

        let mut personas = Vec::with_capacity(entries.len());
        for (position, (key, value)) in entries.into_iter().enumerate() {
            let entry: PersonaEntry = serde_json::from_value(value)
                .map_err(|e| ChatError::Validation(format!("persona '{}': {}", key, e)))?;
            if let Some(name) = &entry.name {
                if *name != key {
                    return Err(ChatError::Validation(format!(
                        "persona '{}' declares a different name '{}'",
                        key, name
                    )));
                }
            }
            personas.push(Persona {
                name: key,
                system_prompt: entry.system_prompt,
                chat_model: entry.chat_model,
                voice: entry.voice,
                tts_model: entry
                    .tts_model
                    .unwrap_or_else(|| default_tts_model.to_string()),
                sort_order: entry.sort_order.unwrap_or(position as i64),
            });
        }

        Self::from_personas(personas)
    }

    /// Read and parse a catalog file.
    pub fn load_file(path: &Path, default_tts_model: &str) -> Result<Self, ChatError> {
        let source = std::fs::read_to_string(path)?;
        let catalog = Self::load(&source, default_tts_model)?;
        tracing::info!(
            path = %path.display(),
            personas = catalog.len(),
            "Loaded persona catalog"
        );
        Ok(catalog)
    }

    /// Build from already resolved personas, validating names and fields.
    pub fn from_personas(personas: Vec<Persona>) -> Result<Self, ChatError> {
        if personas.is_empty() {
            return Err(ChatError::Validation("catalog has no personas".to_string()));
        }

        let mut index = HashMap::with_capacity(personas.len());
        let mut shared = Vec::with_capacity(personas.len());
        for persona in personas {
            for (field, value) in [
                ("name", &persona.name),
                ("system_prompt", &persona.system_prompt),
                ("chat_model", &persona.chat_model),
                ("voice", &persona.voice),
                ("tts_model", &persona.tts_model),
            ] {
                if value.trim().is_empty() {
                    return Err(ChatError::Validation(format!(
                        "persona '{}': {} must not be empty",
                        persona.name, field
                    )));
                }
            }
            if index.insert(persona.name.clone(), shared.len()).is_some() {
                return Err(ChatError::Validation(format!(
                    "duplicate persona name: {}",
                    persona.name
                )));
            }
            shared.push(Arc::new(persona));
        }

        Ok(Self {
            personas: shared,
            index,
        })
    }

    /// Look up a persona by exact name.
    pub fn get(&self, name: &str) -> Result<Arc<Persona>, ChatError> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.personas[i]))
            .ok_or_else(|| ChatError::UnknownPersona(name.to_string()))
    }

    /// Personas by ascending `sort_order`; ties keep source order.
    pub fn list_ordered(&self) -> Vec<Arc<Persona>> {
        let mut ordered = self.personas.clone();
        ordered.sort_by_key(|p| p.sort_order);
        ordered
    }

    /// Names in display order.
    pub fn names(&self) -> Vec<String> {
        self.list_ordered().iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
