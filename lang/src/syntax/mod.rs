pub mod desugar;
pub mod parse;
pub mod tree;
