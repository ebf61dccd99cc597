use std::process;

use clap::Parser;

use patscope::cli::Args;

fn main() {
    let args = Args::parse();
    match patscope::run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(2);
        }
    }
}
