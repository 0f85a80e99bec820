use clap::Parser;
use tidyfolder::cli::{Cli, run_cli};
use tidyfolder::logging;
use tidyfolder::output::OutputFormatter;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run_cli(&cli) {
        OutputFormatter::error(&e.to_string());
        std::process::exit(1);
    }
}
