use std::process::ExitCode;

fn main() -> ExitCode {
    coursebot_cli::run()
}
