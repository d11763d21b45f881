use clap::Parser;
use tradestore::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
