use std::process::ExitCode;

fn main() -> ExitCode {
    boardsight_cli::run()
}
