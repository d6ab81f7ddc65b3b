//! Minimal CLI parsing for batch run options.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct CliOptions {
    /// Path to the JSON track export to process
    pub tracks_path: Option<PathBuf>,
    pub username: Option<String>,
    pub worker_count: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub help: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    fn parse(mut args: impl Iterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => options.help = true,
                "--user" | "-u" => {
                    options.username = args.next();
                }
                "--workers" | "-w" => {
                    options.worker_count = args.next().and_then(|v| v.parse().ok());
                }
                "--output" | "-o" => {
                    options.output_dir = args.next().map(PathBuf::from);
                }
                _ if arg.starts_with("--user=") => {
                    options.username = arg.split_once('=').map(|(_, v)| v.to_string());
                }
                _ if arg.starts_with("--workers=") => {
                    options.worker_count = arg
                        .split_once('=')
                        .and_then(|(_, v)| v.parse().ok());
                }
                _ if arg.starts_with("--output=") => {
                    options.output_dir = arg.split_once('=').map(|(_, v)| PathBuf::from(v));
                }
                _ if arg.starts_with('-') => {}
                _ => {
                    if options.tracks_path.is_none() {
                        options.tracks_path = Some(PathBuf::from(arg));
                    }
                }
            }
        }
        options
    }
}

pub const USAGE: &str = "\
Usage: tunehunt [OPTIONS] <tracks.json>

Arguments:
  <tracks.json>       JSON array of track descriptors to process

Options:
  -u, --user <NAME>     Username to record downloads under [default: default]
  -w, --workers <N>     Concurrent pipeline workers
  -o, --output <DIR>    Directory for downloaded audio files
  -h, --help            Print this help
";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::parse(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_parse_positional_and_flags() {
        let options = parse(&["tracks.json", "--user", "alice", "--workers", "8"]);
        assert_eq!(options.tracks_path, Some(PathBuf::from("tracks.json")));
        assert_eq!(options.username.as_deref(), Some("alice"));
        assert_eq!(options.worker_count, Some(8));
    }

    #[test]
    fn test_parse_equals_forms() {
        let options = parse(&["--user=bob", "--workers=2", "--output=/tmp/audio", "list.json"]);
        assert_eq!(options.username.as_deref(), Some("bob"));
        assert_eq!(options.worker_count, Some(2));
        assert_eq!(options.output_dir, Some(PathBuf::from("/tmp/audio")));
        assert_eq!(options.tracks_path, Some(PathBuf::from("list.json")));
    }

    #[test]
    fn test_parse_bad_worker_count_ignored() {
        let options = parse(&["--workers", "lots"]);
        assert_eq!(options.worker_count, None);
    }

    #[test]
    fn test_parse_unknown_flag_ignored() {
        let options = parse(&["--verbose", "tracks.json"]);
        assert!(!options.help);
        assert_eq!(options.tracks_path, Some(PathBuf::from("tracks.json")));
    }
}
