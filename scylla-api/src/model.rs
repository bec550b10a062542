//! In-memory model of a discovered API: modules → commands → methods → options.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::discovery::DiscoveryLoader;
use crate::error::{Error, Result};
use crate::ordered::OrderedMap;
use crate::substitute_template;
use crate::transport::{HttpRequest, HttpResponse, Transport};

// =====================
// Verbs and options
// =====================

/// HTTP verbs a command can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Get,
    Post,
    Delete,
}

impl Verb {
    pub const ALL: [Verb; 3] = [Verb::Get, Verb::Post, Verb::Delete];

    /// Case-insensitive parse; `None` for anything but GET, POST and DELETE.
    #[must_use]
    pub fn parse(s: &str) -> Option<Verb> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where an option's value goes in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionLocation {
    /// Substituted into a `{name}` placeholder of the path template.
    Path,
    /// Sent as a query parameter.
    Query,
}

/// One parameter of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiOption {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub location: OptionLocation,
    /// Legal values; empty means unconstrained.
    pub allowed_values: Vec<String>,
    /// Whether the option may be repeated (values are joined with `,`).
    pub allow_multiple: bool,
    /// Declared value type, informational only.
    pub value_type: String,
}

impl ApiOption {
    /// An optional, unconstrained query option.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required: false,
            location: OptionLocation::Query,
            allowed_values: Vec::new(),
            allow_multiple: false,
            value_type: "string".to_string(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: OptionLocation) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_allow_multiple(mut self, allow_multiple: bool) -> Self {
        self.allow_multiple = allow_multiple;
        self
    }

    #[must_use]
    pub fn with_value_type(mut self, value_type: impl Into<String>) -> Self {
        self.value_type = value_type.into();
        self
    }

    /// Path options are always required: the URL cannot be built without them.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required || self.location == OptionLocation::Path
    }

    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        self.allowed_values.is_empty() || self.allowed_values.iter().any(|v| v == value)
    }
}

// =====================
// Methods
// =====================

/// Values collected for a method, keyed by option name. Repeated options keep
/// every occurrence in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionValues {
    values: HashMap<String, Vec<String>>,
}

impl OptionValues {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn push(&mut self, option: &ApiOption, value: String) -> Result<()> {
        let slot = self.values.entry(option.name.clone()).or_default();
        if !slot.is_empty() && !option.allow_multiple {
            return Err(Error::InvalidOptionValue {
                option: option.name.clone(),
                value,
                reason: "option given more than once".to_string(),
            });
        }
        slot.push(value);
        Ok(())
    }
}

/// One HTTP verb supported by a command, with its own option set.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiMethod {
    pub verb: Verb,
    pub command_name: String,
    pub path_template: String,
    pub description: String,
    pub nickname: Option<String>,
    pub options: OrderedMap<ApiOption>,
}

impl ApiMethod {
    #[must_use]
    pub fn new(verb: Verb, command_name: impl Into<String>, path_template: impl Into<String>) -> Self {
        Self {
            verb,
            command_name: command_name.into(),
            path_template: path_template.into(),
            description: String::new(),
            nickname: None,
            options: OrderedMap::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// # Errors
    ///
    /// `DuplicateKey` if an option with the same name exists.
    pub fn add_option(&mut self, option: ApiOption) -> Result<()> {
        self.options.insert(option.name.clone(), option)
    }

    /// Find a declared option, treating `-` and `_` as interchangeable.
    #[must_use]
    pub fn find_option(&self, name: &str) -> Option<&ApiOption> {
        self.options
            .get(name)
            .or_else(|_| self.options.get(&name.replace('-', "_")))
            .or_else(|_| self.options.get(&name.replace('_', "-")))
            .ok()
    }

    /// Parse `--opt value`, `--opt=value` and bare tokens into option values.
    ///
    /// Bare tokens fill path options positionally, in declaration order.
    ///
    /// # Errors
    ///
    /// `UnknownOption`, `MissingOptionValue`, `UnexpectedArgument`, or
    /// `InvalidOptionValue` for a repeated single-valued option.
    pub fn collect_values(&self, args: &[String]) -> Result<OptionValues> {
        let mut values = OptionValues::default();
        let mut iter = args.iter().peekable();
        while let Some(tok) = iter.next() {
            if let Some(flag) = tok.strip_prefix("--") {
                let (name, inline) = match flag.split_once('=') {
                    Some((n, v)) => (n, Some(v.to_string())),
                    None => (flag, None),
                };
                let option = self.find_option(name).ok_or_else(|| Error::UnknownOption {
                    command: self.command_name.clone(),
                    verb: self.verb.to_string(),
                    option: name.to_string(),
                })?;
                let value = match inline {
                    Some(v) => v,
                    None => iter
                        .next_if(|next| !next.starts_with("--"))
                        .cloned()
                        .ok_or_else(|| Error::MissingOptionValue(option.name.clone()))?,
                };
                values.push(option, value)?;
            } else {
                let option = self
                    .options
                    .values()
                    .find(|o| o.location == OptionLocation::Path && !values.contains(&o.name))
                    .ok_or_else(|| Error::UnexpectedArgument(tok.clone()))?;
                values.push(option, tok.clone())?;
            }
        }
        Ok(values)
    }

    /// Check enumerated values, then required options.
    ///
    /// # Errors
    ///
    /// `InvalidOptionValue` or `MissingRequiredOption`.
    pub fn validate(&self, values: &OptionValues) -> Result<()> {
        for option in self.options.values() {
            let Some(given) = values.get(&option.name) else {
                continue;
            };
            for value in given {
                let pieces: Vec<&str> = if option.allow_multiple {
                    value.split(',').collect()
                } else {
                    vec![value.as_str()]
                };
                if let Some(bad) = pieces.into_iter().find(|p| !option.accepts(p)) {
                    return Err(Error::InvalidOptionValue {
                        option: option.name.clone(),
                        value: bad.to_string(),
                        reason: format!("must be one of: {}", option.allowed_values.join(", ")),
                    });
                }
            }
        }
        if let Some(missing) = self
            .options
            .values()
            .find(|o| o.is_required() && !values.contains(&o.name))
        {
            return Err(Error::MissingRequiredOption {
                command: self.command_name.clone(),
                verb: self.verb.to_string(),
                option: missing.name.clone(),
            });
        }
        Ok(())
    }

    /// Build the concrete request: path options fill the template, every
    /// other supplied option becomes a query parameter in declaration order.
    #[must_use]
    pub fn build_request(&self, host: &str, port: u16, values: &OptionValues) -> HttpRequest {
        let mut path_vars: HashMap<String, String> = HashMap::new();
        let mut query: Vec<(String, String)> = Vec::new();
        for option in self.options.values() {
            if let Some(given) = values.get(&option.name) {
                let joined = given.join(",");
                match option.location {
                    OptionLocation::Path => {
                        path_vars.insert(option.name.clone(), joined);
                    }
                    OptionLocation::Query => query.push((option.name.clone(), joined)),
                }
            }
        }
        HttpRequest {
            verb: self.verb,
            host: host.to_string(),
            port,
            path: substitute_template(&self.path_template, &path_vars),
            query,
        }
    }

    /// Collect, validate and build in one go. Nothing touches the network.
    ///
    /// # Errors
    ///
    /// Any argument parsing or validation error.
    pub fn prepare(&self, host: &str, port: u16, args: &[String]) -> Result<HttpRequest> {
        let values = self.collect_values(args)?;
        self.validate(&values)?;
        Ok(self.build_request(host, port, &values))
    }

    /// Prepare and issue a single request through `transport`.
    ///
    /// # Errors
    ///
    /// Validation errors (before any request is made) or the transport's error.
    pub fn invoke(
        &self,
        transport: &dyn Transport,
        host: &str,
        port: u16,
        args: &[String],
    ) -> Result<HttpResponse> {
        let request = self.prepare(host, port, args)?;
        debug!("invoking {} {}", request.verb, request.path);
        Ok(transport.request(&request)?)
    }
}

// =====================
// Commands and modules
// =====================

/// A named operation of a module, with at most one method per verb.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCommand {
    pub module_name: String,
    pub name: String,
    pub path_template: String,
    pub methods: BTreeMap<Verb, ApiMethod>,
}

impl ApiCommand {
    /// A command whose path is `module_name/name`.
    #[must_use]
    pub fn new(module_name: impl Into<String>, name: impl Into<String>) -> Self {
        let module_name = module_name.into();
        let name = name.into();
        let path_template = format!("{module_name}/{name}");
        Self::with_path(module_name, name, path_template)
    }

    /// A command served at an explicit path.
    #[must_use]
    pub fn with_path(
        module_name: impl Into<String>,
        name: impl Into<String>,
        path_template: impl Into<String>,
    ) -> Self {
        Self {
            module_name: module_name.into(),
            name: name.into(),
            path_template: path_template.into(),
            methods: BTreeMap::new(),
        }
    }

    /// # Errors
    ///
    /// `DuplicateKey` if the command already has a method for this verb.
    pub fn add_method(&mut self, method: ApiMethod) -> Result<()> {
        if self.methods.contains_key(&method.verb) {
            return Err(Error::DuplicateKey(format!(
                "{} {}",
                method.verb,
                self.qualified_name()
            )));
        }
        self.methods.insert(method.verb, method);
        Ok(())
    }

    #[must_use]
    pub fn method(&self, verb: Verb) -> Option<&ApiMethod> {
        self.methods.get(&verb)
    }

    #[must_use]
    pub fn verbs(&self) -> Vec<Verb> {
        self.methods.keys().copied().collect()
    }

    /// The only method, when there is exactly one.
    #[must_use]
    pub fn default_method(&self) -> Option<&ApiMethod> {
        if self.methods.len() == 1 {
            self.methods.values().next()
        } else {
            None
        }
    }

    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.module_name, self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiModule {
    pub name: String,
    pub description: String,
    pub commands: OrderedMap<ApiCommand>,
}

impl ApiModule {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            commands: OrderedMap::new(),
        }
    }

    /// # Errors
    ///
    /// `DuplicateKey` if a command with the same name exists.
    pub fn add_command(&mut self, command: ApiCommand) -> Result<()> {
        self.commands.insert(command.name.clone(), command)
    }
}

// =====================
// Root
// =====================

/// The discovered API of one server.
#[derive(Debug, Clone, PartialEq)]
pub struct ScyllaApi {
    pub host: String,
    pub port: u16,
    pub modules: OrderedMap<ApiModule>,
}

impl Default for ScyllaApi {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HOST, Self::DEFAULT_PORT)
    }
}

impl ScyllaApi {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 10000;

    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            modules: OrderedMap::new(),
        }
    }

    /// # Errors
    ///
    /// `DuplicateKey` if a module with the same name exists.
    pub fn add_module(&mut self, module: ApiModule) -> Result<()> {
        self.modules.insert(module.name.clone(), module)
    }

    /// Discover the server's API and replace the model's modules with it.
    ///
    /// All or nothing: on error the model is left exactly as it was.
    ///
    /// # Errors
    ///
    /// `DiscoveryUnavailable`, `MalformedDocument`, or a container fault.
    pub fn load(&mut self, transport: &dyn Transport) -> Result<()> {
        let modules = DiscoveryLoader::new(transport, &self.host, self.port).load()?;
        self.modules = modules;
        Ok(())
    }

    /// Every command named `name`, across all modules, in module order.
    #[must_use]
    pub fn find_command(&self, name: &str) -> Vec<&ApiCommand> {
        self.modules
            .values()
            .filter_map(|m| m.commands.get(name).ok())
            .collect()
    }

    /// Every command of every module, in order.
    pub fn commands(&self) -> impl Iterator<Item = &ApiCommand> + '_ {
        self.modules.values().flat_map(|m| m.commands.values())
    }
}
