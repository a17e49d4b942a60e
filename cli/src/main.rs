//! `trustload` CLI entrypoint.
//!
//! Parses arguments, installs the stderr logger, and maps command results
//! to process exit codes.

use clap::Parser;
use std::io::Write;
use trustload::dirs::SystemBaseDirs;
use trustload_cli::cli::Cli;
use trustload_cli::commands::run;
use trustload_cli::error::Result;
use trustload_cli::logging::{self, level_filter};
use trustload_cli::output::write_line;

fn main() {
    let cli = Cli::parse();
    logging::init(level_filter(cli.verbosity, cli.quiet));
    let dirs = SystemBaseDirs::new();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &dirs, &mut stdout);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_line(stderr, &err);
            err.exit_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustload::ClassNotFound;
    use trustload_cli::error::CliError;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_uniform_not_found() {
        let err = CliError::from(ClassNotFound::new("org.example.app.Main"));

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert_eq!(stderr_text, "class not found: org.example.app.Main\n");
    }
}
