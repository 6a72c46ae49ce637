use std::process::ExitCode;

pub fn main() -> ExitCode {
    tlsprobe::cli::main()
}
