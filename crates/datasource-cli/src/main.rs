use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use datasource_cli::{collect_params, run_simulation, SimulationConfig};
use datasource_mux::MuxConfig;
use datasource_url::{build_url_with, QueryEncoding};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("datasource")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Datasource request multiplexer tools")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("url")
                .about("Append encoded query parameters to a base URL")
                .arg(
                    Arg::new("base")
                        .required(true)
                        .help("Base URL or path"),
                )
                .arg(
                    Arg::new("param")
                        .long("param")
                        .short('p')
                        .action(ArgAction::Append)
                        .help("Query parameter as key=value; repeat a key for a list"),
                )
                .arg(
                    Arg::new("percent-spaces")
                        .long("percent-spaces")
                        .action(ArgAction::SetTrue)
                        .help("Encode spaces as %20 instead of +"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Drive a multiplexer against a loopback gateway")
                .arg(
                    Arg::new("polls")
                        .long("polls")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Number of concurrent polls (and requests)"),
                )
                .arg(
                    Arg::new("ticks")
                        .long("ticks")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Values to read from each poll"),
                )
                .arg(
                    Arg::new("interval-ms")
                        .long("interval-ms")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("Gateway tick interval in milliseconds"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Console runtime config JSON"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn url_command(args: &ArgMatches) -> Result<()> {
    let base = args
        .get_one::<String>("base")
        .context("missing base URL")?;
    let params = collect_params(
        args.get_many::<String>("param")
            .into_iter()
            .flatten()
            .map(String::as_str),
    )?;
    let encoding = if args.get_flag("percent-spaces") {
        QueryEncoding::PercentSpaces
    } else {
        QueryEncoding::Plus
    };

    println!("{}", build_url_with(base, Some(&params), encoding));
    Ok(())
}

async fn simulate_command(args: &ArgMatches) -> Result<bool> {
    let mux = match args.get_one::<PathBuf>("config") {
        Some(path) => MuxConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MuxConfig::default(),
    };
    let config = SimulationConfig {
        polls: args.get_one::<usize>("polls").copied().unwrap_or(4),
        ticks: args.get_one::<usize>("ticks").copied().unwrap_or(3),
        interval_ms: args.get_one::<u64>("interval-ms").copied().unwrap_or(10),
        mux,
    };

    let report = run_simulation(config).await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(report.passed())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("url", args)) => url_command(args),
        Some(("simulate", args)) => {
            let passed = simulate_command(args).await?;
            std::process::exit(if passed { 0 } else { 1 });
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn url_collects_repeated_params() {
        let matches = cli()
            .try_get_matches_from(["datasource", "url", "/x", "-p", "b=2", "-p", "a=1"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let params: Vec<_> = args.get_many::<String>("param").unwrap().collect();
        assert_eq!(params, ["b=2", "a=1"]);
    }
}
