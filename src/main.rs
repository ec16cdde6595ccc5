use std::process;

fn main() {
    process::exit(estafeta::cli::run());
}
