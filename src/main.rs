//! # wake
//!
//! Run labels from a wakefile: `wake build`, `wake test --filter parser`,
//! `wake --list`.

fn main() {
    std::process::exit(wake::cli::run_cli());
}
