//! The `tsz` command-line driver: parse, bind, check, and then either
//! interpret a single source file directly or emit it to a loadable
//! bytecode artifact.
//!
//! Module layout: `args` (clap surface), `driver` (the pipeline itself),
//! `reporter` (diagnostic formatting for a terminal).

pub mod args;
pub mod driver;
pub mod reporter;

pub use args::{CliArgs, Mode};
pub use driver::run;
pub use reporter::Reporter;
