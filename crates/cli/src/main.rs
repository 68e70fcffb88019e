use std::process::ExitCode;

fn main() -> ExitCode {
    sneakerdesk_cli::run()
}
