use rustyline::{
    completion::{Candidate, Completer},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    validate::Validator,
    Context as RContext, Editor, Helper, Result as RResult,
};
use std::{error::Error, fs, path::Path};
use tracing::{debug, info};

use lang::{
    capability::{CapabilityDefinition, CapabilityExecutionState, Host, Outcome},
    runtime::{env::Env, Value},
    syntax::parse::CapParser,
};

use crate::{cli::natives, config::Config};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// The capability the shell is driving: the last compiled definition and
/// the state it is suspended in, if any.
struct Session {
    host: Host,
    dump_cps: bool,
    definition: Option<CapabilityDefinition>,
    state: Option<CapabilityExecutionState>,
}

struct REPL {
    rl: Editor<REPLHelper>,
    history_file: Option<String>,
    session: Session,
    repl_run: bool,
    multiline: bool,
    multiline_buffer: Vec<String>,
}

enum CompleteCandidate {
    Command(String, String),
    Native(String),
}

impl Candidate for CompleteCandidate {
    fn display(&self) -> &str {
        match self {
            CompleteCandidate::Command(cmd, _) => cmd,
            CompleteCandidate::Native(name) => name,
        }
    }

    fn replacement(&self) -> &str {
        match self {
            CompleteCandidate::Command(cmd, _) => cmd,
            CompleteCandidate::Native(name) => name,
        }
    }
}

struct REPLHelper {
    natives: Vec<String>,
}

impl Helper for REPLHelper {}

impl Completer for REPLHelper {
    type Candidate = CompleteCandidate;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &RContext<'_>,
    ) -> RResult<(usize, Vec<Self::Candidate>)> {
        if line.starts_with(':') {
            let commands = vec![
                (":q", "Quit REPL"),
                (":{", "Start multi-line mode"),
                (":}", "End multi-line mode and run the capability"),
                (":cps", "Show the transformed program"),
                (":state", "Show the pending continuation"),
                (":save", "Persist the pending state to a file"),
                (":load", "Load a persisted state from a file"),
                (":drop", "Discard the pending state"),
            ];
            Ok((
                0,
                commands
                    .into_iter()
                    .filter(|it| it.0.starts_with(line))
                    .map(|it| CompleteCandidate::Command(it.0.to_owned(), it.1.to_owned()))
                    .collect(),
            ))
        } else {
            let head = &line[..pos];
            let start = head
                .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .map_or(0, |i| i + 1);
            let word = &head[start..];
            Ok((
                start,
                self.natives
                    .iter()
                    .filter(|name| !word.is_empty() && name.starts_with(word))
                    .map(|name| CompleteCandidate::Native(name.clone()))
                    .collect(),
            ))
        }
    }
}

impl Validator for REPLHelper {}

impl Hinter for REPLHelper {}

impl Highlighter for REPLHelper {}

impl Session {
    fn new(cfg: &Config) -> Session {
        Session {
            host: Host::new(natives::registry()).with_max_depth(cfg.max_depth),
            dump_cps: cfg.dump_cps,
            definition: None,
            state: None,
        }
    }

    /// Resumes the pending state with `line` as the message, or runs `line`
    /// as a new capability when nothing is pending.
    fn input(&mut self, line: &str) -> CliResult<Option<Value>> {
        match self.state.take() {
            Some(state) => self.resume(state, line),
            None => self.run_source(line),
        }
    }

    /// Starts over with `source`, discarding whatever was pending.
    fn run_source(&mut self, source: &str) -> CliResult<Option<Value>> {
        self.state = None;
        let definition = CapabilityDefinition::compile(source)?;
        if self.dump_cps {
            eprintln!("{}", definition.cps_text());
        }
        let outcome = definition.execute(&self.host);
        self.definition = Some(definition);
        Ok(self.settle(outcome?))
    }

    fn resume(&mut self, state: CapabilityExecutionState, line: &str) -> CliResult<Option<Value>> {
        let outcome = parse_message(line)
            .and_then(|message| state.resume(&self.host, message).map_err(Into::into));
        match outcome {
            Ok(outcome) => Ok(self.settle(outcome)),
            Err(err) => {
                // a failed resume keeps the capability where it was
                self.state = Some(state);
                Err(err)
            }
        }
    }

    fn settle(&mut self, outcome: Outcome) -> Option<Value> {
        match outcome {
            Outcome::Complete(value) => Some(value),
            Outcome::Suspended(state) => {
                self.state = Some(state);
                None
            }
        }
    }
}

impl REPL {
    fn new(cfg: Config) -> REPL {
        let history_file = dirs::home_dir()
            .map(|mut path| {
                path.push(".cap-history");
                path.to_str().map(|s| s.to_owned())
            })
            .flatten();

        let session = Session::new(&cfg);
        let helper = REPLHelper {
            natives: session.host.natives().names().into_iter().map(String::from).collect(),
        };

        let mut repl = REPL {
            rl: Editor::<REPLHelper>::new(),
            history_file,
            session,
            repl_run: true,
            multiline: false,
            multiline_buffer: Vec::new(),
        };

        if let Some(ref path) = repl.history_file {
            let _ = repl.rl.load_history(path);
        }
        repl.rl.set_helper(Some(helper));
        repl
    }

    fn prompt(&self) -> &'static str {
        match (self.multiline, &self.session.state) {
            (true, _) => "cap| ",
            (false, Some(_)) => "cap? ",
            (false, None) => "cap> ",
        }
    }

    fn start(&mut self) {
        while self.repl_run {
            let readline = self.rl.readline(self.prompt());
            match readline {
                Ok(line) => {
                    if line.starts_with(':') {
                        self.process_command(line);
                        continue;
                    }

                    match self.multiline {
                        true => self.multiline_buffer.push(line),
                        _ => self.process_line(line),
                    }
                }

                Err(ReadlineError::Interrupted) => (),
                Err(ReadlineError::Eof) => {
                    break;
                }
                Err(err) => {
                    println!("ReadlineError: {:?}", err);
                    break;
                }
            }
        }
    }

    fn process_command(&mut self, line: String) {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let arg = words.next();

        match (command, arg) {
            (":{", _) => {
                self.multiline = true;
            }

            (":}", _) => {
                self.multiline = false;
                let source = self.multiline_buffer.join("\n");
                self.multiline_buffer.clear();
                let result = self.session.run_source(source.as_str());
                self.report(result);
            }

            (":q", _) => {
                self.repl_run = false;
            }

            (":cps", _) => match &self.session.definition {
                Some(definition) => println!("{}", definition.cps_text()),
                None => println!("No capability has been run yet"),
            },

            (":state", _) => match &self.session.state {
                Some(state) => {
                    println!("Continuation: {}", state.continuation_text());
                    if let Some(pattern) = state.message_pattern() {
                        println!("Awaiting: {}", pattern);
                    }
                    println!("Environment:");
                    state
                        .environment()
                        .iter()
                        .for_each(|(k, v)| println!("- {} = {}", k, v));
                }
                None => println!("Nothing is suspended"),
            },

            (":save", Some(path)) => match &self.session.state {
                Some(state) => match write_state(state, Path::new(path)) {
                    Ok(()) => println!("State written to {}", path),
                    Err(err) => eprintln!("{}", err),
                },
                None => println!("Nothing is suspended"),
            },

            (":load", Some(path)) => match read_state(Path::new(path)) {
                Ok(state) => {
                    self.session.state = Some(state);
                    println!("State loaded from {}", path);
                }
                Err(err) => eprintln!("{}", err),
            },

            (":drop", _) => {
                self.session.state = None;
            }

            _ => println!("REPL: Unknown command {}", line.as_str()),
        }
    }

    fn process_line(&mut self, line: String) {
        self.rl.add_history_entry(line.as_str());
        let result = self.session.input(line.as_str());
        self.report(result);
    }

    fn report(&self, result: CliResult<Option<Value>>) {
        match result {
            Ok(Some(Value::NoneValue)) | Ok(None) => (),
            Ok(Some(value)) => println!("{}", value),
            Err(err) => eprintln!("{}", err),
        }
    }
}

impl Drop for REPL {
    fn drop(&mut self) {
        if let Some(ref path) = self.history_file {
            let _ = self.rl.save_history(path);
        }
    }
}

/// Messages are expressions over literals, evaluated without natives.
fn parse_message(text: &str) -> CliResult<Value> {
    let expr = CapParser::expr(text)?;
    let host = Host::new(Default::default());
    Ok(host.interpreter().eval(&expr, &Env::new())?)
}

fn read_state(path: &Path) -> CliResult<CapabilityExecutionState> {
    let text = fs::read_to_string(path)?;
    let state = CapabilityExecutionState::load(text.as_str())?;
    debug!(path = %path.display(), bytes = text.len(), "state read");
    Ok(state)
}

/// Replaces `path` only once the new record is fully written.
fn write_state(state: &CapabilityExecutionState, path: &Path) -> CliResult<()> {
    let text = state.persist()?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), "state written");
    Ok(())
}

fn report(outcome: Outcome, path: &Path) -> CliResult<()> {
    match outcome {
        Outcome::Complete(value) => {
            if path.exists() {
                fs::remove_file(path)?;
                info!(path = %path.display(), "capability completed, state removed");
            }
            if value != Value::NoneValue {
                println!("{}", value);
            }
        }
        Outcome::Suspended(state) => {
            write_state(&state, path)?;
            match state.message_pattern() {
                Some(pattern) => eprintln!("suspended awaiting {}, state in {}", pattern, path.display()),
                None => eprintln!("suspended, state in {}", path.display()),
            }
        }
    }
    Ok(())
}

pub(crate) fn run_file(cfg: &Config, input: &str) -> CliResult<()> {
    let src = fs::read_to_string(input)?;
    let definition = CapabilityDefinition::compile(src.as_str())?;
    if cfg.dump_cps {
        eprintln!("{}", definition.cps_text());
    }
    let host = Host::new(natives::registry()).with_max_depth(cfg.max_depth);
    let outcome = definition.execute(&host)?;
    report(outcome, cfg.state_path_for(input).as_path())
}

pub(crate) fn resume_file(cfg: &Config, state_path: &str, message: &str) -> CliResult<()> {
    let path = Path::new(state_path);
    let state = read_state(path)?;
    let message = parse_message(message)?;
    let host = Host::new(natives::registry()).with_max_depth(cfg.max_depth);
    let outcome = state.resume(&host, message)?;
    report(outcome, path)
}

pub(crate) fn cli_main(cfg: Config, input: Option<String>) {
    let mut repl = REPL::new(cfg);
    if let Some(input) = input {
        match fs::read_to_string(input.as_str()) {
            Ok(src) => {
                let result = repl.session.run_source(src.as_str());
                repl.report(result);
            }
            Err(err) => eprintln!("{}: {}", input, err),
        }
    }
    repl.start();
}
