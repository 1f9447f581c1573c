use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::{error, info, LevelFilter};
use quire::build::build_site;
use quire::config::Config;
use std::path::{Path, PathBuf};
use std::{process, str::FromStr};

fn main() {
    let matches = App::new("quire")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds a blog from markdown pages, rendering aafigure diagrams along the way")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site")
                .arg(
                    Arg::with_name("project")
                        .long("project")
                        .value_name("DIR")
                        .help("Directory to search (along with its ancestors) for quire.yaml")
                        .default_value("."),
                )
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .value_name("DIR")
                        .help("Directory the site is written to [default: {project root}/_output]"),
                )
                .arg(
                    Arg::with_name("drafts")
                        .long("drafts")
                        .help("Builds pages marked as drafts"),
                )
                .arg(
                    Arg::with_name("log-level")
                        .long("log-level")
                        .value_name("LEVEL")
                        .possible_values(&["off", "error", "warn", "info", "debug", "trace"])
                        .default_value("info"),
                ),
        )
        .get_matches();

    if let ("build", Some(matches)) = matches.subcommand() {
        init_logging(matches);
        if let Err(err) = build(matches) {
            error!("build failed: {:#}", err);
            // The logger may be filtered down to nothing; the error chain is
            // always printed.
            eprintln!("{}", error_report(&err));
            process::exit(1);
        }
        info!("Completed successfully");
    }
}

fn init_logging(matches: &ArgMatches) {
    let level = matches.value_of("log-level").unwrap_or("info");
    let log_level = LevelFilter::from_str(level).unwrap_or_else(|_| {
        eprintln!("Invalid log level: {}. Using 'info' instead.", level);
        LevelFilter::Info
    });

    // RUST_LOG, if set, takes precedence over --log-level.
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_env(env_logger::Env::default())
        .init();
}

fn build(matches: &ArgMatches) -> Result<()> {
    let project = Path::new(matches.value_of("project").unwrap_or("."));
    let project = project
        .canonicalize()
        .with_context(|| format!("resolving project directory `{}`", project.display()))?;
    let output = match matches.value_of("output") {
        Some(output) => PathBuf::from(output),
        None => project.join("_output"),
    };

    let mut config = Config::from_directory(&project, &output).context("loading configuration")?;
    config.drafts |= matches.is_present("drafts");
    info!(
        title = config.title.as_str(),
        output:? = config.root_output_directory,
        drafts = config.drafts;
        "building site"
    );
    build_site(config).context("building site")
}

// Renders the error with its whole context chain, one cause per line.
fn error_report(err: &anyhow::Error) -> String {
    format!("Error: {:?}", err)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_report_includes_causes() {
        let err = Config::from_directory(Path::new("/nonexistent/quire"), Path::new("/tmp/out"))
            .context("loading configuration")
            .expect_err("no project file");
        let report = error_report(&err);
        assert!(report.starts_with("Error: loading configuration"));
        assert!(report.contains("Could not find `quire.yaml`"));
    }
}
