//! Command-line front-end.
//!
//! Exit codes: 0 success, 1 usage or build failure, 2 operational error
//! (destination conflicts, bad remote locations, fetch failures).

pub mod build;
pub mod get;

use crate::logging::init_logging;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_USAGE: i32 = 1;
pub const EXIT_BUILD_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "vmforge", version, about = "Libvirt image build pipeline")]
pub struct Cli {
    /// Also write diagnostic logs to DIR/vmforge.log
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Provision the output directory, disk and network for an image build
    Build(build::BuildArgs),
    /// Fetch a template from a remote repository and build it
    Get(get::GetArgs),
}

/// Parse `args` (including the program name) and run the selected command.
pub async fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => return report_parse_error(e),
    };

    let _logging = match init_logging(cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("err: {}", e);
            return EXIT_ERROR;
        }
    };

    match cli.command {
        Command::Build(args) => build::run(args).await,
        Command::Get(args) => get::run(args).await,
    }
}

pub(crate) fn report_parse_error(err: clap::Error) -> i32 {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => EXIT_SUCCESS,
        _ => EXIT_USAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_flag_is_usage_error() {
        assert_eq!(run(["vmforge", "build", "--bogus", "t.json"]).await, EXIT_USAGE);
        assert_eq!(run(["vmforge", "get"]).await, EXIT_USAGE);
    }

    #[tokio::test]
    async fn test_help_exits_zero() {
        assert_eq!(run(["vmforge", "--help"]).await, EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn test_missing_template_is_build_failure() {
        assert_eq!(
            run(["vmforge", "build", "/nonexistent/vmforge/template.json"]).await,
            EXIT_BUILD_FAILED
        );
    }

    #[test]
    fn test_get_collects_trailing_build_args() {
        let cli = Cli::try_parse_from([
            "vmforge",
            "get",
            "-k",
            "-d",
            "/tmp/tpl",
            "git+https://example.com/t.git",
            "template.json",
        ])
        .unwrap();

        match cli.command {
            Command::Get(args) => {
                assert!(args.keep);
                assert!(!args.fetch_only);
                assert_eq!(args.dest, Some(PathBuf::from("/tmp/tpl")));
                assert_eq!(args.remote, "git+https://example.com/t.git");
                assert_eq!(args.build_args, vec!["template.json"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
