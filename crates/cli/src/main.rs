use std::process::ExitCode;

fn main() -> ExitCode {
    riego_cli::run()
}
