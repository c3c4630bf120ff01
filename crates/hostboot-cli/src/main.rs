//! Hostboot launcher
//!
//! Resolves the application base, locates the engine host module (honoring
//! servicing redirection), calls its entry export and exits with the hosted
//! program's exit code.

mod output;

use anyhow::Context;
use clap::Parser;
use output::ColorWhen;
use hostboot_core::launcher::{full_application_base, is_tracing_enabled, native_bootstrapper_directory};
use hostboot_core::{
    HostConfig, Invocation, Launcher, NoServicing, PlatformLoader, ProcessEnv, RuntimeLocator,
    TracingSink, EXIT_BOOTSTRAP_FAILURE,
};
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(name = "hostboot")]
#[command(about = "Native bootstrapper for the hosted managed engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Application base directory
    app_base: PathBuf,

    /// Arguments to pass to the application
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Host configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose bootstrap tracing (same as setting the trace variable to 1)
    #[arg(long)]
    trace: bool,

    /// When to color diagnostics
    #[arg(long, value_enum, value_name = "WHEN", default_value_t = ColorWhen::Auto)]
    color: ColorWhen,
}

fn main() {
    let cli = Cli::parse();
    let no_color = std::env::var_os("NO_COLOR").is_some();
    let mut diagnostics = output::Diagnostics::new(output::color_choice(cli.color, no_color));

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            diagnostics.error(&e);
            EXIT_BOOTSTRAP_FAILURE
        }
    };

    std::process::exit(code);
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = match &cli.config {
        Some(path) => HostConfig::from_file(path)
            .with_context(|| format!("failed to load configuration '{}'", path.display()))?,
        None => HostConfig::default(),
    };

    let tracing_enabled = cli.trace || is_tracing_enabled(&ProcessEnv, &config.host.trace_var);
    init_logging(tracing_enabled);

    let app_base = full_application_base(&cli.app_base)?;
    tracing::debug!(app_base = %app_base.display(), "resolved application base");

    let mut invocation = Invocation::new(&app_base, &cli.args)
        .context("application arguments contain an interior NUL byte")?;

    let bootstrapper_dir = native_bootstrapper_directory()
        .context("failed to determine the launcher's directory")?;

    let launcher = Launcher::new(
        PlatformLoader::default(),
        RuntimeLocator::new(config.servicing.clone(), ProcessEnv, NoServicing),
        bootstrapper_dir,
    );

    let code = launcher.call_application_main(
        &config.host.file_name(),
        &config.host.entry_export,
        &mut invocation,
        &TracingSink,
    )?;

    tracing::debug!(exit_code = code, "application exited");
    Ok(code)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
