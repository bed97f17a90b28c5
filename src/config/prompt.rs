use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use log::{ info, warn };
use once_cell::sync::Lazy;

pub const DEFAULT_PERSONA: &str = "default";

const BUILTIN_PROMPTS: &str = include_str!("../../json/prompts.json");

static FALLBACK_PERSONA: Lazy<Persona> = Lazy::new(|| Persona {
    system_prompt: "You are a helpful assistant for a consulting firm. Keep answers short.".into(),
    welcome: None,
    model: None,
    temperature: None,
});

#[derive(Debug)]
pub enum PromptError {
    TemplateNotFound(String),
    PersonaNotFound(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::TemplateNotFound(key) => write!(f, "Prompt template '{}' not found", key),
            PromptError::PersonaNotFound(key) => write!(f, "Persona '{}' not found", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// A named assistant voice: system prompt plus optional model settings.
#[derive(Deserialize, Debug, Clone)]
pub struct Persona {
    pub system_prompt: String,
    #[serde(default)]
    pub welcome: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub personas: HashMap<String, Persona>,
    #[serde(default)]
    pub templates: HashMap<String, String>,
    /// Site-wide values substituted into every persona and template.
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl PromptConfig {
    pub fn builtin() -> Result<Arc<PromptConfig>, PromptError> {
        let config: PromptConfig = serde_json::from_str(BUILTIN_PROMPTS)?;
        config.validate()?;
        Ok(Arc::new(config))
    }

    fn validate(&self) -> Result<(), PromptError> {
        if !self.personas.contains_key(DEFAULT_PERSONA) {
            return Err(PromptError::PersonaNotFound(DEFAULT_PERSONA.to_string()));
        }
        Ok(())
    }

    /// Resolves a persona by name, falling back to `default` for unknown or missing names.
    pub fn persona(&self, name: Option<&str>) -> (&str, &Persona) {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            if let Some((key, persona)) = self.personas.get_key_value(name) {
                return (key.as_str(), persona);
            }
            warn!("Unknown persona '{}', using default", name);
        }
        match self.personas.get_key_value(DEFAULT_PERSONA) {
            Some((key, persona)) => (key.as_str(), persona),
            None => (DEFAULT_PERSONA, &*FALLBACK_PERSONA),
        }
    }

    pub fn system_prompt(&self, persona: &Persona) -> String {
        render(&persona.system_prompt, &self.variables)
    }

    pub fn welcome(&self, persona: &Persona) -> Option<String> {
        persona.welcome.as_ref().map(|w| render(w, &self.variables))
    }

    /// Renders a named template with request values layered over the site variables.
    pub fn render_template(
        &self,
        key: &str,
        values: &HashMap<String, String>
    ) -> Result<String, PromptError> {
        let template = self.templates
            .get(key)
            .ok_or_else(|| PromptError::TemplateNotFound(format!("templates:{}", key)))?;
        let mut vars = self.variables.clone();
        vars.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(render(template, &vars))
    }
}

/// Replaces `{name}` placeholders. Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{}}}", key), value);
    }
    out
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    config.last_loaded = Some(SystemTime::now());
    Ok(Arc::new(config))
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        match current_config.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Prompts file changed, reloading...");
                return load_prompts(path).map(Some);
            }
            None => {
                info!("No last_loaded timestamp, reloading prompts...");
                return load_prompts(path).map(Some);
            }
        }
    }
    Ok(None)
}

/// Shared prompt configuration, re-read from disk when the backing file changes.
pub struct PromptStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<PromptConfig>>,
}

impl PromptStore {
    pub fn new(path: Option<String>) -> Result<Self, PromptError> {
        let (path, config) = match path {
            Some(p) => {
                let config = load_prompts(&p)?;
                info!("Loaded {} personas from {}", config.personas.len(), p);
                (Some(PathBuf::from(p)), config)
            }
            None => (None, PromptConfig::builtin()?),
        };
        Ok(Self { path, current: RwLock::new(config) })
    }

    pub fn builtin() -> Result<Self, PromptError> {
        Self::new(None)
    }

    /// Returns the live config, reloading first if the file changed. A failed reload keeps
    /// the previous config.
    pub async fn current(&self) -> Arc<PromptConfig> {
        let Some(path) = &self.path else {
            return Arc::clone(&*self.current.read().await);
        };

        let existing = Arc::clone(&*self.current.read().await);
        match reload_prompts_if_changed(path, &existing) {
            Ok(Some(fresh)) => {
                *self.current.write().await = Arc::clone(&fresh);
                fresh
            }
            Ok(None) => existing,
            Err(e) => {
                warn!("Prompt reload failed, keeping previous config: {}", e);
                existing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_has_expected_personas() {
        let config = PromptConfig::builtin().unwrap();
        for name in ["default", "sales", "voice", "scope", "roi"] {
            assert!(config.personas.contains_key(name), "missing persona {}", name);
        }
        assert!(config.templates.contains_key("scope_request"));
        assert!(config.templates.contains_key("roi_request"));
    }

    #[test]
    fn unknown_persona_falls_back_to_default() {
        let config = PromptConfig::builtin().unwrap();
        let (name, _) = config.persona(Some("pirate"));
        assert_eq!(name, DEFAULT_PERSONA);
        let (name, _) = config.persona(Some(" sales "));
        assert_eq!(name, "sales");
    }

    #[test]
    fn system_prompt_substitutes_company() {
        let config = PromptConfig::builtin().unwrap();
        let (_, persona) = config.persona(None);
        let prompt = config.system_prompt(persona);
        assert!(prompt.contains("Northwind Consulting"));
        assert!(!prompt.contains("{company}"));
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        let mut vars = HashMap::new();
        vars.insert("a".to_string(), "1".to_string());
        assert_eq!(render("{a} and {b}", &vars), "1 and {b}");
    }

    #[test]
    fn file_without_default_persona_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"personas":{{"sales":{{"system_prompt":"x"}}}}}}"#).unwrap();
        let err = load_prompts(file.path()).unwrap_err();
        assert!(matches!(err, PromptError::PersonaNotFound(_)));
    }

    #[tokio::test]
    async fn store_picks_up_file_changes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"personas":{{"default":{{"system_prompt":"first"}}}}}}"#).unwrap();
        let store = PromptStore::new(Some(file.path().to_string_lossy().into_owned())).unwrap();
        assert_eq!(store.current().await.personas["default"].system_prompt, "first");

        // Force the stored timestamp into the past so the next mtime compares newer.
        {
            let mut guard = store.current.write().await;
            let mut stale = (**guard).clone();
            stale.last_loaded = Some(SystemTime::UNIX_EPOCH);
            *guard = Arc::new(stale);
        }
        fs::write(
            file.path(),
            r#"{"personas":{"default":{"system_prompt":"second"}}}"#
        ).unwrap();
        assert_eq!(store.current().await.personas["default"].system_prompt, "second");
    }
}
