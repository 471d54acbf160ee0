use std::process::ExitCode;

fn main() -> ExitCode {
    leadsign_cli::run()
}
