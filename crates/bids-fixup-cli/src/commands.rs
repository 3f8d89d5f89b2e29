use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "bids-fixup")]
#[command(
    about = "Post-process a converted BIDS session: volume counts, field map IntendedFor, task names",
    long_about = None
)]
pub struct Cli {
    /// Session folder (or subject folder when there is no session level)
    pub session: PathBuf,

    /// Any value turns on verbose diagnostics
    pub verbose: Option<String>,

    /// Verbose diagnostics
    #[arg(short = 'v', long = "verbose")]
    pub verbose_flag: bool,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose_flag || self.verbose.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_only() {
        let cli = Cli::try_parse_from(["bids-fixup", "/data/sub-01/ses-01"]).unwrap();
        assert_eq!(cli.session, PathBuf::from("/data/sub-01/ses-01"));
        assert!(!cli.is_verbose());
    }

    #[test]
    fn test_second_positional_enables_verbose() {
        let cli = Cli::try_parse_from(["bids-fixup", "/data/sub-01", "1"]).unwrap();
        assert!(cli.is_verbose());
        let cli = Cli::try_parse_from(["bids-fixup", "-v", "/data/sub-01"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_missing_session_is_error() {
        assert!(Cli::try_parse_from(["bids-fixup"]).is_err());
    }
}
