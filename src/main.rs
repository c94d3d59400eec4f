pub mod cli;
pub mod config;

use clap::{App, ArgMatches, SubCommand};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn config(args: &ArgMatches) -> Result<Config, String> {
    let mut cfg = Config::new();
    cfg.dump_cps = args.is_present("dump-cps");
    if let Some(depth) = args.value_of("max-depth") {
        cfg.max_depth = depth
            .parse()
            .map_err(|_| format!("invalid --max-depth '{}'", depth))?;
    }
    Ok(cfg)
}

fn main() {
    init_logging();

    let args = App::new("cap")
        .version("0.1.0")
        .author("Kiva <imkiva@icloud.com>")
        .about("Runs suspendable capabilities")
        .args_from_usage(
            "-i, --repl            'Starts an interactive capability shell'
            --dump-cps             'Prints the continuation-passing form before running'
            --max-depth=[DEPTH]    'Maximum nested call depth'
            [INPUT]                'Capability to load into the shell'",
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Runs a capability until it completes or suspends")
                .args_from_usage(
                    "--state=[PATH]    'Where to write the state on suspension'
                    --dump-cps         'Prints the continuation-passing form before running'
                    <INPUT>            'Capability source file'",
                ),
        )
        .subcommand(
            SubCommand::with_name("resume")
                .about("Resumes a persisted capability with a message")
                .args_from_usage(
                    "<STATE>           'Persisted state file'
                    <MESSAGE>          'Message literal, e.g. 42 or \"yes\"'",
                ),
        )
        .get_matches();

    let mut cfg = match config(&args) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    };

    let result = match args.subcommand() {
        ("run", Some(run)) => {
            cfg.state_path = run.value_of("state").map(Into::into);
            cfg.dump_cps |= run.is_present("dump-cps");
            run.value_of("INPUT")
                .map_or(Ok(()), |input| cli::cli_main::run_file(&cfg, input))
        }
        ("resume", Some(resume)) => match (resume.value_of("STATE"), resume.value_of("MESSAGE")) {
            (Some(state), Some(message)) => cli::cli_main::resume_file(&cfg, state, message),
            _ => Ok(()),
        },
        _ => {
            cli::cli_main::cli_main(cfg, args.value_of("INPUT").map(|e| e.to_owned()));
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
