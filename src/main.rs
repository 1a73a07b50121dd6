use iocman::cli::Cli;

fn main() {
    // Errors are already printed by the CLI
    if Cli::run().is_err() {
        std::process::exit(1);
    }
}
