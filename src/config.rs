use lang::runtime::eval::DEFAULT_MAX_DEPTH;
use std::path::PathBuf;

pub struct Config {
    pub max_depth: usize,
    pub dump_cps: bool,
    pub state_path: Option<PathBuf>,
}

impl Config {
    pub(crate) fn new() -> Self {
        Config {
            max_depth: DEFAULT_MAX_DEPTH,
            dump_cps: false,
            state_path: None,
        }
    }

    /// Where a suspended run of `input` stores its state.
    pub(crate) fn state_path_for(&self, input: &str) -> PathBuf {
        match &self.state_path {
            Some(path) => path.clone(),
            None => PathBuf::from(format!("{}.state.json", input)),
        }
    }
}
