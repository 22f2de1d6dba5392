use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "androidmk")]
#[command(about = "Translate an Android.mk file into Android.bp")]
#[command(version)]
pub struct Args {
    /// Makefile to translate
    pub input: PathBuf,

    /// Where to write the blueprint file (defaults to stdout)
    pub output: Option<PathBuf>,

    /// Print the raw translation, without the fix-up pass
    #[arg(long)]
    pub no_fix: bool,

    /// Increase logging verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_only() {
        let args = Args::try_parse_from(["androidmk", "Android.mk"]).unwrap();
        assert_eq!(args.input, PathBuf::from("Android.mk"));
        assert!(args.output.is_none());
        assert!(!args.no_fix);
        assert_eq!(args.log_level(), LevelFilter::Warn);
    }

    #[test]
    fn test_all_flags() {
        let args =
            Args::try_parse_from(["androidmk", "-vv", "--no-fix", "Android.mk", "Android.bp"])
                .unwrap();
        assert_eq!(args.output, Some(PathBuf::from("Android.bp")));
        assert!(args.no_fix);
        assert_eq!(args.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn test_input_is_required() {
        assert!(Args::try_parse_from(["androidmk"]).is_err());
    }
}
