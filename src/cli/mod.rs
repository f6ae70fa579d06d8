//! Command-line surface: clap options mapped onto a validated [`AppConfig`].
//!
//! [`AppConfig`]: crate::config::AppConfig

mod clap_parser;

pub use clap_parser::{Cli, PlacementOpt, ScorerOpt};
