use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "patscope",
    version,
    about = "NodePattern compiler with match tracing and colorized debug rendering"
)]
pub struct Args {
    /// Pattern source, e.g. "(send nil? :foo ...)"
    pub pattern: String,

    /// Ruby file to match against
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Inline Ruby source to match against
    #[arg(short, long, value_name = "CODE")]
    pub eval: Option<String>,

    /// Print the pattern token stream, then exit
    #[arg(long)]
    pub tokenize: bool,

    /// Print the parsed pattern tree, then exit
    #[arg(long)]
    pub parse: bool,

    /// Print the compiled matcher description (parameters and pattern
    /// positions), then exit
    #[arg(long)]
    pub compile: bool,

    /// Emit a machine-readable JSON report instead of colorized text
    #[arg(long)]
    pub json: bool,

    /// Disable color output
    #[arg(long)]
    pub no_color: bool,

    /// Path to a color-scheme config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
