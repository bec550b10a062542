use anyhow::Result;

const APP_NAME: &str = "scylla-api-client";

fn main() {
    match real_main() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<scylla_api::Error>()
                .map_or(1, scylla_api::Error::exit_code);
            std::process::exit(code);
        }
    }
}

fn real_main() -> Result<i32> {
    // Usage errors exit with clap's status 2.
    let args = scylla_api::cli::expand_short_aliases(std::env::args());
    let matches = scylla_api::cli::build_cli().get_matches_from(args);
    scylla_api::setup_tracing(matches.get_flag("debug"));

    let user_agent = format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION"));
    scylla_api::cli::drive_command(&matches, &user_agent)
}
