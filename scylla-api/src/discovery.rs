//! Discovery: walk the two-level `/api-doc` document set into a model.
//!
//! The top-level document lists modules (`{"apis": [{"path", "description"}]}`);
//! each module document at `/api-doc/<module>/` lists command paths and their
//! per-verb operations.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{ApiCommand, ApiMethod, ApiModule, ApiOption, OptionLocation, Verb};
use crate::ordered::OrderedMap;
use crate::transport::{Transport, TransportError};

pub const API_DOC_PATH: &str = "/api-doc";

// =====================
// Document shapes
// =====================

#[derive(Debug, Clone, Deserialize)]
pub struct ApiIndex {
    pub apis: Vec<ModuleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleEntry {
    pub path: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDoc {
    pub apis: Vec<PathEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathEntry {
    pub path: String,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub method: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "paramType")]
    pub param_type: Option<String>,
    #[serde(default, rename = "enum")]
    pub allowed_values: Vec<String>,
    #[serde(default, rename = "allowMultiple")]
    pub allow_multiple: bool,
    #[serde(default, rename = "type")]
    pub value_type: Option<String>,
}

// =====================
// Loader
// =====================

/// Fetches the discovery documents one at a time, in document order.
pub struct DiscoveryLoader<'a> {
    transport: &'a dyn Transport,
    host: &'a str,
    port: u16,
}

impl<'a> DiscoveryLoader<'a> {
    #[must_use]
    pub fn new(transport: &'a dyn Transport, host: &'a str, port: u16) -> Self {
        Self {
            transport,
            host,
            port,
        }
    }

    /// Build every module. Nothing is returned unless every fetch succeeds.
    ///
    /// # Errors
    ///
    /// `DiscoveryUnavailable` when a document cannot be fetched,
    /// `MalformedDocument` when one cannot be understood.
    pub fn load(&self) -> Result<OrderedMap<ApiModule>> {
        let index: ApiIndex = self.fetch(API_DOC_PATH)?;
        let mut modules = OrderedMap::new();
        for entry in &index.apis {
            let name = normalize_path(&entry.path);
            if name.is_empty() {
                return Err(Error::MalformedDocument {
                    path: API_DOC_PATH.to_string(),
                    reason: format!("module path '{}' is empty", entry.path),
                });
            }
            let doc_path = format!("{API_DOC_PATH}/{name}/");
            let doc: ModuleDoc = self.fetch(&doc_path)?;
            let module = build_module(name, &entry.description, &doc, &doc_path)?;
            debug!(
                "discovered module '{}' with {} commands",
                module.name,
                module.commands.len()
            );
            modules.insert(name, module)?;
        }
        Ok(modules)
    }

    fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("fetching {}", path);
        let value = self
            .transport
            .fetch_json(self.host, self.port, path)
            .map_err(|e| match e {
                TransportError::Decode(reason) => Error::MalformedDocument {
                    path: path.to_string(),
                    reason,
                },
                other => Error::DiscoveryUnavailable {
                    path: path.to_string(),
                    source: other,
                },
            })?;
        serde_json::from_value(value).map_err(|e| Error::MalformedDocument {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Strip surrounding slashes and whitespace.
#[must_use]
pub fn normalize_path(path: &str) -> &str {
    path.trim_matches(|c: char| c == '/' || c.is_whitespace())
}

/// Build one module from its document. Command names are relative to the
/// module; the request path stays the server's.
///
/// # Errors
///
/// `MalformedDocument` for an empty command path, container faults for
/// duplicate methods or options.
pub fn build_module(
    name: &str,
    description: &str,
    doc: &ModuleDoc,
    doc_path: &str,
) -> Result<ApiModule> {
    let mut module = ApiModule::new(name, description);
    let prefix = format!("{name}/");
    for entry in &doc.apis {
        let raw = normalize_path(&entry.path);
        let command_name = raw.strip_prefix(&prefix).unwrap_or(raw);
        if command_name.is_empty() {
            return Err(Error::MalformedDocument {
                path: doc_path.to_string(),
                reason: format!("command path '{}' is empty", entry.path),
            });
        }
        if !module.commands.contains_key(command_name) {
            module.add_command(ApiCommand::with_path(name, command_name, raw))?;
        }
        let command = module.commands.get_mut(command_name)?;
        for op in &entry.operations {
            let Some(verb) = Verb::parse(&op.method) else {
                warn!(
                    "skipping unsupported method '{}' for {}/{}",
                    op.method, name, command_name
                );
                continue;
            };
            command.add_method(build_method(verb, command_name, raw, op)?)?;
        }
    }
    Ok(module)
}

fn build_method(verb: Verb, command_name: &str, path: &str, op: &Operation) -> Result<ApiMethod> {
    let mut method = ApiMethod::new(verb, command_name, path).with_description(op.summary.clone());
    method.nickname.clone_from(&op.nickname);
    for param in &op.parameters {
        method.add_option(build_option(param))?;
    }
    Ok(method)
}

fn build_option(param: &Parameter) -> ApiOption {
    let location = if param.param_type.as_deref() == Some("path") {
        OptionLocation::Path
    } else {
        OptionLocation::Query
    };
    ApiOption::new(param.name.clone())
        .with_description(param.description.clone())
        .with_required(param.required)
        .with_location(location)
        .with_allowed_values(param.allowed_values.iter().cloned())
        .with_allow_multiple(param.allow_multiple)
        .with_value_type(param.value_type.clone().unwrap_or_else(|| "string".to_string()))
}
