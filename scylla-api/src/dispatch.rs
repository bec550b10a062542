//! Resolve `[module/]command [VERB] [args...]` against a loaded model.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{ApiCommand, ApiMethod, ApiModule, ScyllaApi, Verb};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// What a command line resolved to.
#[derive(Debug)]
pub enum Resolved<'a> {
    /// A module named on its own, or followed by `--help`.
    ModuleHelp(&'a ApiModule),
    /// A command followed by `--help`.
    CommandHelp(&'a ApiCommand),
    Call(Call<'a>),
}

/// A command, the method selected for it and the arguments left for the method.
#[derive(Debug)]
pub struct Call<'a> {
    pub command: &'a ApiCommand,
    pub method: &'a ApiMethod,
    pub args: Vec<String>,
}

pub struct Dispatcher<'a> {
    api: &'a ScyllaApi,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(api: &'a ScyllaApi) -> Self {
        Self { api }
    }

    /// Resolve a tokenized command line.
    ///
    /// # Errors
    ///
    /// `ModuleNotFound`, `CommandNotFound`, `AmbiguousCommand` or `VerbRequired`.
    pub fn resolve(&self, tokens: &[String]) -> Result<Resolved<'a>> {
        let Some((first, rest)) = tokens.split_first() else {
            return Err(Error::CommandNotFound {
                module: None,
                command: String::new(),
            });
        };
        let first = first.trim_matches(is_separator);

        let (command, rest) = if let Ok(module) = self.api.modules.get(first) {
            match rest.split_first() {
                None => return Ok(Resolved::ModuleHelp(module)),
                Some((next, _)) if is_help(next) => return Ok(Resolved::ModuleHelp(module)),
                Some((next, rest)) => {
                    let name = next.trim_matches(is_separator);
                    let command = module.commands.get(name).map_err(|_| Error::CommandNotFound {
                        module: Some(module.name.clone()),
                        command: name.to_string(),
                    })?;
                    (command, rest)
                }
            }
        } else {
            (self.resolve_command(first)?, rest)
        };

        if rest.iter().any(|t| is_help(t)) {
            return Ok(Resolved::CommandHelp(command));
        }

        let (method, args) = select_method(command, rest)?;
        debug!(
            "resolved '{}' to {} {}",
            first,
            method.verb,
            command.qualified_name()
        );
        Ok(Resolved::Call(Call {
            command,
            method,
            args: args.to_vec(),
        }))
    }

    /// Find a command by `module/command` or by its bare name.
    ///
    /// # Errors
    ///
    /// `ModuleNotFound`, `CommandNotFound` or `AmbiguousCommand`.
    pub fn resolve_command(&self, token: &str) -> Result<&'a ApiCommand> {
        if let Some((module_name, command_name)) = token.split_once('/') {
            if let Ok(module) = self.api.modules.get(module_name) {
                if let Ok(command) = module.commands.get(command_name) {
                    return Ok(command);
                }
                // Command names may contain '/' themselves; the qualified miss
                // is reported unless exactly one such command matches.
                return match self.unique_command(token) {
                    Ok(Some(command)) => Ok(command),
                    _ => Err(Error::CommandNotFound {
                        module: Some(module_name.to_string()),
                        command: command_name.to_string(),
                    }),
                };
            }
            return self
                .unique_command(token)?
                .ok_or_else(|| Error::ModuleNotFound(module_name.to_string()));
        }
        self.unique_command(token)?
            .ok_or_else(|| Error::CommandNotFound {
                module: None,
                command: token.to_string(),
            })
    }

    fn unique_command(&self, name: &str) -> Result<Option<&'a ApiCommand>> {
        match self.api.find_command(name).as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            many => Err(Error::AmbiguousCommand {
                command: name.to_string(),
                modules: many.iter().map(|c| c.module_name.clone()).collect(),
            }),
        }
    }

    /// Build the request for a resolved call without sending it.
    ///
    /// # Errors
    ///
    /// Argument parsing and validation errors.
    pub fn prepare(&self, call: &Call<'_>) -> Result<HttpRequest> {
        call.method.prepare(&self.api.host, self.api.port, &call.args)
    }

    /// Validate and send a resolved call: exactly one request, no retries.
    ///
    /// # Errors
    ///
    /// Validation errors (reported before any request) or the transport's error.
    pub fn invoke(&self, transport: &dyn Transport, call: &Call<'_>) -> Result<HttpResponse> {
        call.method
            .invoke(transport, &self.api.host, self.api.port, &call.args)
    }
}

fn select_method<'a, 'b>(
    command: &'a ApiCommand,
    rest: &'b [String],
) -> Result<(&'a ApiMethod, &'b [String])> {
    let verb_required = || Error::VerbRequired {
        command: command.qualified_name(),
        available: command.verbs().iter().map(ToString::to_string).collect(),
    };
    if let Some((verb, args)) = rest
        .split_first()
        .and_then(|(t, args)| Verb::parse(t).map(|v| (v, args)))
    {
        let method = command.method(verb).ok_or_else(verb_required)?;
        return Ok((method, args));
    }
    let method = command.default_method().ok_or_else(verb_required)?;
    Ok((method, rest))
}

fn is_separator(c: char) -> bool {
    c == ' ' || c == '/'
}

fn is_help(token: &str) -> bool {
    token == "-h" || token == "--help"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApiOption, OptionLocation};
    use crate::testing::FixtureTransport;

    fn loaded() -> ScyllaApi {
        let mut api = ScyllaApi::new("localhost", 10000);
        api.load(&FixtureTransport::new()).unwrap();
        api
    }

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(ToString::to_string).collect()
    }

    fn call<'a>(api: &'a ScyllaApi, line: &str) -> Result<Call<'a>> {
        match Dispatcher::new(api).resolve(&tokens(line))? {
            Resolved::Call(call) => Ok(call),
            other => panic!("expected a call, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_command_single_method_defaults() {
        let api = loaded();
        let d = Dispatcher::new(&api);
        let c = call(&api, "compactions").unwrap();
        assert_eq!(c.command.module_name, "compaction_manager");
        assert_eq!(c.method.verb, Verb::Get);
        let req = d.prepare(&c).unwrap();
        assert_eq!(req.path, "compaction_manager/compactions");
        assert!(req.query.is_empty());
    }

    #[test]
    fn test_invoke_issues_exactly_one_request() {
        let api = loaded();
        let transport = FixtureTransport::new();
        let d = Dispatcher::new(&api);
        let c = call(&api, "compactions").unwrap();
        let resp = d.invoke(&transport, &c).unwrap();
        assert_eq!(resp.status, 200);
        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].verb, Verb::Get);
        assert_eq!(sent[0].host, "localhost");
        assert_eq!(sent[0].port, 10000);
        assert_eq!(sent[0].path, "compaction_manager/compactions");
    }

    #[test]
    fn test_invalid_enum_fails_before_request() {
        let api = loaded();
        let transport = FixtureTransport::new();
        let c = call(&api, "logger/{name} POST --name mylogger --level bogus").unwrap();
        let err = Dispatcher::new(&api).invoke(&transport, &c).unwrap_err();
        assert!(matches!(err, Error::InvalidOptionValue { .. }));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_valid_enum_substitutes_path() {
        let api = loaded();
        let c = call(&api, "logger/{name} post --name mylogger --level debug").unwrap();
        let req = Dispatcher::new(&api).prepare(&c).unwrap();
        assert_eq!(req.verb, Verb::Post);
        assert_eq!(req.path, "system/logger/mylogger");
        assert_eq!(req.query, vec![("level".to_string(), "debug".to_string())]);
    }

    #[test]
    fn test_qualified_name_resolves() {
        let api = loaded();
        let c = call(&api, "system/logger/{name} GET mylogger").unwrap();
        assert_eq!(c.command.qualified_name(), "system/logger/{name}");
        let req = Dispatcher::new(&api).prepare(&c).unwrap();
        assert_eq!(req.path, "system/logger/mylogger");
    }

    #[test]
    fn test_leading_slash_and_module_token() {
        let api = loaded();
        let c = call(&api, "/system/uptime_ms").unwrap();
        assert_eq!(c.command.name, "uptime_ms");
        let c = call(&api, "system uptime_ms").unwrap();
        assert_eq!(c.command.name, "uptime_ms");
    }

    #[test]
    fn test_module_alone_lists_module() {
        let api = loaded();
        let d = Dispatcher::new(&api);
        assert!(matches!(
            d.resolve(&tokens("system")).unwrap(),
            Resolved::ModuleHelp(m) if m.name == "system"
        ));
        assert!(matches!(
            d.resolve(&tokens("compaction_manager --help")).unwrap(),
            Resolved::ModuleHelp(_)
        ));
    }

    #[test]
    fn test_command_help() {
        let api = loaded();
        let r = Dispatcher::new(&api)
            .resolve(&tokens("logger/{name} -h"))
            .unwrap();
        assert!(matches!(r, Resolved::CommandHelp(c) if c.name == "logger/{name}"));
    }

    #[test]
    fn test_verb_required_when_several_methods() {
        let api = loaded();
        let err = call(&api, "logger/{name} --name x").unwrap_err();
        match err {
            Error::VerbRequired { available, .. } => assert_eq!(available, vec!["GET", "POST"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_explicit_verb_not_offered() {
        let api = loaded();
        let err = call(&api, "uptime_ms DELETE").unwrap_err();
        assert!(matches!(err, Error::VerbRequired { .. }));
    }

    #[test]
    fn test_unknown_module_and_command() {
        let api = loaded();
        let d = Dispatcher::new(&api);
        assert!(matches!(
            d.resolve_command("nosuch/thing"),
            Err(Error::ModuleNotFound(ref m)) if m == "nosuch"
        ));
        assert!(matches!(
            d.resolve_command("system/nosuch"),
            Err(Error::CommandNotFound { module: Some(_), .. })
        ));
        assert!(matches!(
            d.resolve_command("nosuch"),
            Err(Error::CommandNotFound { module: None, .. })
        ));
        assert!(matches!(
            d.resolve(&tokens("system nosuch")),
            Err(Error::CommandNotFound { module: Some(_), .. })
        ));
    }

    #[test]
    fn test_slash_in_bare_command_name() {
        let api = loaded();
        let c = call(&api, "metrics/pending_tasks").unwrap();
        assert_eq!(c.command.module_name, "compaction_manager");
        let req = Dispatcher::new(&api).prepare(&c).unwrap();
        assert_eq!(req.path, "compaction_manager/metrics/pending_tasks");
    }

    #[test]
    fn test_foreign_path_command() {
        let api = loaded();
        let c = call(&api, "v2/error_injection/injection/{injection} DELETE boom").unwrap();
        let req = Dispatcher::new(&api).prepare(&c).unwrap();
        assert_eq!(req.path, "v2/error_injection/injection/boom");
        assert_eq!(req.verb, Verb::Delete);
    }

    #[test]
    fn test_ambiguous_bare_command() {
        let mut api = ScyllaApi::default();
        for module_name in ["storage_service", "column_family"] {
            let mut module = ApiModule::new(module_name, "");
            let mut cmd = ApiCommand::new(module_name, "metrics");
            let mut get = ApiMethod::new(Verb::Get, "metrics", cmd.path_template.clone());
            get.add_option(ApiOption::new("kind").with_location(OptionLocation::Query))
                .unwrap();
            cmd.add_method(get).unwrap();
            module.add_command(cmd).unwrap();
            api.add_module(module).unwrap();
        }

        let err = call(&api, "metrics").unwrap_err();
        match err {
            Error::AmbiguousCommand { modules, .. } => {
                assert_eq!(modules, vec!["storage_service", "column_family"]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let c = call(&api, "column_family/metrics --kind x").unwrap();
        assert_eq!(c.command.module_name, "column_family");
        let req = Dispatcher::new(&api).prepare(&c).unwrap();
        assert_eq!(req.path, "column_family/metrics");
    }

    #[test]
    fn test_qualified_miss_is_not_ambiguous() {
        let mut api = ScyllaApi::default();
        let mut storage = ApiModule::new("storage", "");
        storage.add_command(ApiCommand::new("storage", "status")).unwrap();
        api.add_module(storage).unwrap();
        // Two other modules both expose a command literally named "storage/size".
        for module_name in ["cache", "disk"] {
            let mut module = ApiModule::new(module_name, "");
            let mut cmd = ApiCommand::new(module_name, "storage/size");
            cmd.add_method(ApiMethod::new(Verb::Get, "storage/size", cmd.path_template.clone()))
                .unwrap();
            module.add_command(cmd).unwrap();
            api.add_module(module).unwrap();
        }

        let err = Dispatcher::new(&api).resolve_command("storage/size").unwrap_err();
        match err {
            Error::CommandNotFound { module, command } => {
                assert_eq!(module.as_deref(), Some("storage"));
                assert_eq!(command, "size");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_qualified_miss_falls_back_to_unique_slash_name() {
        let mut api = ScyllaApi::default();
        api.add_module(ApiModule::new("storage", "")).unwrap();
        let mut cache = ApiModule::new("cache", "");
        cache.add_command(ApiCommand::new("cache", "storage/size")).unwrap();
        api.add_module(cache).unwrap();

        let cmd = Dispatcher::new(&api).resolve_command("storage/size").unwrap();
        assert_eq!(cmd.module_name, "cache");
    }

    #[test]
    fn test_unknown_option_rejected() {
        let api = loaded();
        let c = call(&api, "uptime_ms --verbose yes").unwrap();
        assert!(matches!(
            Dispatcher::new(&api).prepare(&c),
            Err(Error::UnknownOption { .. })
        ));
    }

    #[test]
    fn test_empty_command_line() {
        let api = loaded();
        assert!(Dispatcher::new(&api).resolve(&[]).is_err());
    }
}
