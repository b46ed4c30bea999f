// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod api;
mod config;
mod facade;
mod logging;
mod remote;
mod runtime;
mod server;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use facade::Facade;
use logging::LogTarget;
use nfa_app::{ContentGenerator, DocumentRenderer, NfaSession};
use nfa_db::Store;
use remote::FacadeClient;
use runtime::{DeskRuntime, DisabledRenderer};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::info;

const DEMO_SEED: u64 = 42;
const DEMO_ENTRIES: usize = 12;
/// Added to the generator timeout so the facade can answer with its fallback first.
const REMOTE_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `nfa-desk --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let mode = options.mode();
    let log_target = match mode {
        Mode::Tui | Mode::Remote if !options.check_only => {
            LogTarget::File(logging::default_log_path()?)
        }
        _ => LogTarget::Stderr,
    };
    logging::init(config.log_filter(), log_target)?;

    if let Some(url) = options.remote.as_deref() {
        return run_remote(url, &config, options.check_only);
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or {}",
            db_path.display(),
            nfa_db::DB_PATH_ENV
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        let today = OffsetDateTime::now_utc().date();
        nfa_testkit::seed_demo_history(&store, DEMO_SEED, DEMO_ENTRIES, today)
            .context("seed demo history")?;
    }

    let generator = runtime::build_generator(&config, &options.config_path)?;
    let renderer = runtime::build_renderer(&config);
    let output_dir = config.output_dir()?;
    if options.check_only {
        info!(db = %db_path.display(), output_dir = %output_dir.display(), "configuration ok");
        return Ok(());
    }

    match mode {
        Mode::Serve => {
            let server = server::bind(&config.bind_address())?;
            println!("nfa-desk listening on http://{}", server.server_addr());
            let renderer = renderer
                .as_ref()
                .map(|renderer| renderer as &dyn DocumentRenderer);
            let facade = Facade::new(generator.as_ref(), renderer, &store, output_dir);
            let handled = server::serve(&server, &facade, options.max_requests)?;
            info!(handled, "HTTP facade stopped");
            Ok(())
        }
        Mode::Tui | Mode::Remote => {
            let renderer: Box<dyn DocumentRenderer> = match renderer {
                Some(renderer) => Box::new(renderer),
                None => Box::new(DisabledRenderer),
            };
            let mut runtime = DeskRuntime::new(generator, renderer, Some(&store), output_dir);
            let mut session = NfaSession::new();
            nfa_tui::run_app(&mut session, &mut runtime)
        }
    }
}

fn run_remote(url: &str, config: &Config, check_only: bool) -> Result<()> {
    let timeout = config.generator_timeout()?.max(config.llm_timeout()?) + REMOTE_TIMEOUT_MARGIN;
    let client = FacadeClient::new(url, timeout)?;
    if check_only {
        return client
            .health_check()
            .with_context(|| format!("check facade at {}", client.base_url()));
    }

    let mut runtime = DeskRuntime::new(
        Box::new(client.clone()),
        Box::new(client.clone()),
        Some(&client),
        config.output_dir()?,
    );
    let mut session = NfaSession::new();
    nfa_tui::run_app(&mut session, &mut runtime)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Serve,
    Tui,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    serve: bool,
    tui: bool,
    remote: Option<String>,
    max_requests: Option<usize>,
    show_help: bool,
}

impl CliOptions {
    fn mode(&self) -> Mode {
        if self.remote.is_some() {
            Mode::Remote
        } else if self.tui {
            Mode::Tui
        } else {
            Mode::Serve
        }
    }
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        serve: false,
        tui: false,
        remote: None,
        max_requests: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--serve" => {
                options.serve = true;
            }
            "--tui" => {
                options.tui = true;
            }
            "--remote" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--remote requires a facade URL"))?;
                options.remote = Some(value.as_ref().to_owned());
            }
            "--max-requests" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--max-requests requires a count"))?;
                let count = value.as_ref().parse::<usize>().with_context(|| {
                    format!("--max-requests expects a whole number, got {:?}", value.as_ref())
                })?;
                options.max_requests = Some(count);
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options");
            }
        }
    }

    let ui_flags = [options.serve, options.tui, options.remote.is_some()]
        .into_iter()
        .filter(|set| *set)
        .count();
    if ui_flags > 1 {
        bail!("--serve, --tui and --remote are exclusive; pick one");
    }
    if options.max_requests.is_some() && options.mode() != Mode::Serve {
        bail!("--max-requests only applies to --serve");
    }

    Ok(options)
}

fn print_help() {
    println!("nfa-desk");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Start with seeded demo history (in-memory)");
    println!("  --check                  Validate config + DB + generator, then exit");
    println!("  --serve                  Run the HTTP facade (default)");
    println!("  --max-requests <n>       Stop the facade after n requests");
    println!("  --tui                    Terminal UI with local collaborators");
    println!("  --remote <url>           Terminal UI against a running facade");
    println!("  --help                   Show this help");
}
