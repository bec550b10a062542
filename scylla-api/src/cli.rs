use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::debug;

use crate::dispatch::{Dispatcher, Resolved};
use crate::error::Error;
use crate::model::{ApiCommand, ApiModule, OptionLocation, ScyllaApi};
use crate::transport::{ClientConfig, RestClient, Transport};
use crate::{output_response, OutputFormat};

pub const ADDRESS_ENV: &str = "SCYLLA_API_ADDRESS";
pub const PORT_ENV: &str = "SCYLLA_API_PORT";

/// Multi-character short flags and their long forms.
const SHORT_ALIASES: [(&str, &str); 5] = [
    ("-lm", "--list-modules"),
    ("-lmc", "--list-module-commands"),
    ("-pp", "--pretty-print"),
    ("-ppo", "--pretty-print-options"),
    ("-pp-opts", "--pretty-print-options"),
];

/// Flags whose value is the following token.
const VALUE_FLAGS: [&str; 8] = [
    "-a",
    "--address",
    "-p",
    "--port",
    "--conn-timeout",
    "--timeout",
    "--list-module-commands",
    "--pretty-print-options",
];

/// Rewrite `-lm`, `-lmc`, `-pp` and `-ppo` to their long forms, since clap
/// only knows single-character short flags. Tokens from the command onwards
/// are passed through untouched.
pub fn expand_short_aliases<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut iter = args.into_iter().map(Into::into);
    let mut out: Vec<String> = iter.next().into_iter().collect();
    while let Some(arg) = iter.next() {
        let arg = expand_alias(arg);
        if arg == "--" || !arg.starts_with('-') {
            out.push(arg);
            out.extend(iter.by_ref());
            break;
        }
        let takes_value = VALUE_FLAGS.contains(&arg.as_str());
        out.push(arg);
        if takes_value {
            out.extend(iter.next());
        }
    }
    out
}

fn expand_alias(arg: String) -> String {
    let (flag, value) = match arg.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (arg.as_str(), None),
    };
    match SHORT_ALIASES.iter().find(|(short, _)| *short == flag) {
        Some((_, long)) => match value {
            Some(value) => format!("{long}={value}"),
            None => (*long).to_string(),
        },
        None => arg,
    }
}

pub fn build_cli() -> Command {
    Command::new("scylla-api-client")
        .about("Scylla REST API command line interface")
        .version(env!("CARGO_PKG_VERSION"))
        .override_usage("scylla-api-client [OPTIONS] [[module/]command [GET|POST|DELETE] [args...]]")
        .arg(
            Arg::new("address")
                .long("address")
                .short('a')
                .env(ADDRESS_ENV)
                .help("IP address or host name of the server node")
                .num_args(1)
                .default_value(ScyllaApi::DEFAULT_HOST),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .env(PORT_ENV)
                .help("REST API port")
                .num_args(1)
                .value_parser(clap::value_parser!(u16))
                .default_value("10000"),
        )
        .arg(
            Arg::new("ssl")
                .long("ssl")
                .help("Use https")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("conn-timeout")
                .long("conn-timeout")
                .help("Connection timeout in seconds (0 disables it)")
                .default_value("30")
                .num_args(1)
                .value_parser(parse_seconds),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Request timeout in seconds, after connection (0 disables it)")
                .default_value("300")
                .num_args(1)
                .value_parser(parse_seconds),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .short('d')
                .help("Turn on debug logging")
                .action(ArgAction::SetTrue),
        )
        .next_help_heading("Listing")
        .arg(
            Arg::new("list")
                .long("list")
                .short('l')
                .help("List all API commands")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-modules")
                .long("list-modules")
                .help("List all API modules (also -lm)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-module-commands")
                .long("list-module-commands")
                .value_name("MODULE")
                .help("List all commands of a module, by name or position (also -lmc)")
                .num_args(1)
                .conflicts_with("list-modules"),
        )
        .next_help_heading("Output")
        .arg(
            Arg::new("pretty-print")
                .long("pretty-print")
                .help("Pretty print JSON responses (also -pp)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("pretty-print-options")
                .long("pretty-print-options")
                .value_name("WIDTH[:INDENT]")
                .help("Pretty print options (default: 200:1), implies --pretty-print (also -ppo)")
                .num_args(1)
                .value_parser(OutputFormat::parse_pretty_options),
        )
        .arg(
            Arg::new("command")
                .value_name("ARGS")
                .help("[module/]command [GET|POST|DELETE] [args...]")
                .num_args(1..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of seconds '{s}'"))?;
    if !secs.is_finite() {
        return Err(format!("timeout must be a finite number of seconds, got '{s}'"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout '{s}': {e}"))
}

fn timeout(matches: &ArgMatches, arg_name: &str) -> Option<Duration> {
    matches
        .get_one::<Duration>(arg_name)
        .copied()
        .filter(|d| !d.is_zero())
}

/// Output format selected by `--pretty-print` and `--pretty-print-options`.
pub fn output_format(matches: &ArgMatches) -> OutputFormat {
    match matches.get_one::<OutputFormat>("pretty-print-options") {
        Some(format) => *format,
        None if matches.get_flag("pretty-print") => OutputFormat::pretty(),
        None => OutputFormat::Plain,
    }
}

// =====================
// Listing
// =====================

/// Prints the discovered API surface.
pub struct Lister<'a> {
    api: &'a ScyllaApi,
}

impl<'a> Lister<'a> {
    #[must_use]
    pub fn new(api: &'a ScyllaApi) -> Self {
        Self { api }
    }

    pub fn list_modules(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Available modules:")?;
        writeln!(out)?;
        for (position, module) in self.api.modules.values().enumerate() {
            if module.description.is_empty() {
                writeln!(out, "{position:>3}  {}", module.name)?;
            } else {
                writeln!(out, "{position:>3}  {:<24} {}", module.name, module.description)?;
            }
        }
        Ok(())
    }

    pub fn list_module_commands(&self, module: &ApiModule, out: &mut dyn Write) -> io::Result<()> {
        for command in module.commands.values() {
            describe_command(command, out)?;
        }
        Ok(())
    }

    /// `--list`, `--list-modules` and `--list-module-commands`.
    ///
    /// # Errors
    ///
    /// Both module flags at once, an unknown module selector, or an I/O error.
    pub fn list_api(
        &self,
        list_modules: bool,
        module_selector: Option<&str>,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        if list_modules {
            if module_selector.is_some() {
                anyhow::bail!("--list-modules cannot be used along with --list-module-commands");
            }
            self.list_modules(out)?;
            return Ok(());
        }

        if let Some(selector) = module_selector {
            let module = self
                .api
                .modules
                .lookup(selector)
                .map_err(|_| Error::ModuleNotFound(selector.to_string()))?;
            self.list_module_commands(module, out)?;
            return Ok(());
        }

        for (i, module) in self.api.modules.values().enumerate() {
            if i > 0 {
                writeln!(out)?;
            }
            writeln!(out, "---- {} ----", module.name)?;
            self.list_module_commands(module, out)?;
        }
        Ok(())
    }
}

/// One command with its methods and their options.
pub fn describe_command(command: &ApiCommand, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "{}", command.qualified_name())?;
    for method in command.methods.values() {
        writeln!(out, "  {:<7} {}", method.verb, method.description)?;
        for option in method.options.values() {
            let location = match option.location {
                OptionLocation::Path => "path",
                OptionLocation::Query => "query",
            };
            let mut line = format!("          --{} ({}", option.name, location);
            if option.is_required() {
                line.push_str(", required");
            }
            if option.allow_multiple {
                line.push_str(", multiple");
            }
            line.push(')');
            if !option.description.is_empty() {
                line.push_str("  ");
                line.push_str(&option.description);
            }
            if !option.allowed_values.is_empty() {
                line.push_str(" [");
                line.push_str(&option.allowed_values.join("|"));
                line.push(']');
            }
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

// =====================
// Driving
// =====================

/// Resolve and run one command line against a loaded model.
///
/// # Errors
///
/// Any resolution, validation or transport error.
pub fn run_command(
    api: &ScyllaApi,
    transport: &dyn Transport,
    tokens: &[String],
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let dispatcher = Dispatcher::new(api);
    match dispatcher.resolve(tokens)? {
        Resolved::ModuleHelp(module) => {
            Lister::new(api).list_module_commands(module, out)?;
            Ok(0)
        }
        Resolved::CommandHelp(command) => {
            describe_command(command, out)?;
            Ok(0)
        }
        Resolved::Call(call) => {
            let resp = dispatcher.invoke(transport, &call)?;
            Ok(output_response(&resp, format))
        }
    }
}

/// Everything after argument parsing: listing or a single invocation.
///
/// # Errors
///
/// Any [`Error`] is kept as the root cause so the caller can pick an exit code.
pub fn drive_with(
    api: &ScyllaApi,
    transport: &dyn Transport,
    matches: &ArgMatches,
    out: &mut dyn Write,
) -> anyhow::Result<i32> {
    let lister = Lister::new(api);
    let list_modules = matches.get_flag("list-modules");
    let module_selector = matches
        .get_one::<String>("list-module-commands")
        .map(String::as_str);
    if matches.get_flag("list") || list_modules || module_selector.is_some() {
        lister.list_api(list_modules, module_selector, out)?;
        return Ok(0);
    }

    let tokens: Vec<String> = matches
        .get_many::<String>("command")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    if tokens.is_empty() {
        write!(out, "{}", build_cli().render_usage())?;
        writeln!(out)?;
        writeln!(out)?;
        lister.list_modules(out)?;
        return Ok(0);
    }

    run_command(api, transport, &tokens, output_format(matches), out)
}

/// Discover the API named by `--address`/`--port`, then list or invoke.
///
/// # Errors
///
/// Discovery failures and anything [`drive_with`] reports.
pub fn drive_command(matches: &ArgMatches, user_agent: &str) -> anyhow::Result<i32> {
    let host = matches
        .get_one::<String>("address")
        .cloned()
        .unwrap_or_else(|| ScyllaApi::DEFAULT_HOST.to_string());
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .unwrap_or(ScyllaApi::DEFAULT_PORT);

    let mut config = ClientConfig::new(user_agent);
    config.ssl = matches.get_flag("ssl");
    config.conn_timeout = timeout(matches, "conn-timeout");
    config.request_timeout = timeout(matches, "timeout");
    let client = RestClient::new(&config).map_err(Error::from)?;

    let mut api = ScyllaApi::new(host, port);
    api.load(&client)
        .with_context(|| format!("Failed to load the API from {}:{}", api.host, api.port))?;
    debug!("loaded {} modules", api.modules.len());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    drive_with(&api, &client, matches, &mut out)
}
