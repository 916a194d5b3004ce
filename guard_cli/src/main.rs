#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod logging;
mod run;

use std::fs;
use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use guard_config::Config;
use guard_core::{CancelToken, GuardError};

use crate::cli::{Cli, Commands};
use crate::run::{ApproachOverrides, Outcome};

/// Exit code when a command ran to completion but did not achieve its goal.
const EXIT_NOT_ACHIEVED: i32 = 6;

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let cfg = match path {
        None => Config::default(),
        Some(p) => {
            let text = fs::read_to_string(p).wrap_err_with(|| format!("read config {p:?}"))?;
            guard_config::load_toml(&text).wrap_err("parse config")?
        }
    };
    cfg.validate()
        .map_err(|e| eyre::Report::new(GuardError::InvalidConfig(e.to_string())))?;
    Ok(cfg)
}

fn dispatch(cli: &Cli, cfg: &Config, cancel: &CancelToken) -> eyre::Result<Outcome> {
    let trace = cli.trace.as_deref();
    match &cli.cmd {
        Commands::Insert {
            max_retries,
            realtime,
        } => run::run_insert(cfg, cancel, *max_retries, *realtime, trace),
        Commands::Approach {
            distance,
            time,
            no_retract,
            realtime,
        } => {
            let overrides = ApproachOverrides {
                distance: *distance,
                time: *time,
                no_retract: *no_retract,
            };
            run::run_approach(cfg, cancel, &overrides, *realtime, trace)
        }
        Commands::Descend { realtime } => run::run_descend(cfg, cancel, *realtime, trace),
        Commands::SelfCheck => run::self_check(cfg, trace),
    }
}

fn report_error(cli: &Cli, e: &eyre::Report) {
    if cli.json {
        eprintln!("{}", error_fmt::format_error_json(e));
    } else {
        eprintln!("{}", error_fmt::humanize(e));
    }
    if matches!(cli.log_level.as_str(), "debug" | "trace") {
        eprintln!("{e:?}");
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    let cfg = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&cli, &e);
            std::process::exit(error_fmt::exit_code_for_error(&e));
        }
    };

    // Held here so the file sink is flushed before exit.
    let log_guard = match logging::init(cli.json, &cli.log_level, &cfg.logging) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            None
        }
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    let code = match dispatch(&cli, &cfg, &cancel) {
        Ok(out) => {
            if cli.json {
                println!("{}", out.json);
            } else {
                println!("{}", out.summary);
            }
            if out.success { 0 } else { EXIT_NOT_ACHIEVED }
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            report_error(&cli, &e);
            error_fmt::exit_code_for_error(&e)
        }
    };

    drop(log_guard);
    std::process::exit(code);
}
