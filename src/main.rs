use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    emergency_beat_lib::cli::run()
}
