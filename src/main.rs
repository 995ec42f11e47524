mod args;
mod eco;

use clap::Parser;
use env_logger::Env;
use snafu::ErrorCompat;

fn main() {
    let args = args::Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(e) = eco::run(&args) {
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("{}", bt);
        }
        std::process::exit(1);
    }
}
