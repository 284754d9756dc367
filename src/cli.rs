//! Command-line parsing.
//!
//! ```text
//! t2 [-h] [-d DEPTH] [-r ROOT] [-W WIDTH] [-H HEIGHT] [-l LEVEL] [-b BATCH]
//!    [-p] [-f] [--backend cpu|gpu] [--kernel PATH] [-o PATH] [--config PATH]
//! ```
//!
//! A `--config` file is applied first, wherever it appears; the remaining
//! flags override it.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::{Configuration, LogLevel};
use crate::sampling::{validate_sample_root, MAX_SAMPLE_ROOT};
use crate::util::{Error, Result};

/// Which compute device runs the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cpu,
    Gpu,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "gpu") {
            Backend::Gpu
        } else {
            Backend::Cpu
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Cpu => "cpu",
            Backend::Gpu => "gpu",
        })
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Backend::Cpu),
            "gpu" => Ok(Backend::Gpu),
            _ => Err(Error::invalid("backend", s)),
        }
    }
}

/// Everything a run needs from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config: Configuration,
    pub backend: Backend,
    /// WGSL file replacing the built-in kernel.
    pub kernel: Option<PathBuf>,
    /// Where to write the converged image.
    pub output: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    Run(CliOptions),
}

/// Usage text for `-h` and argument errors.
pub fn usage() -> String {
    let defaults = Configuration::default();
    format!(
        "Usage: t2 [options]\n\
         \n\
         Options:\n\
         \x20 -h               Show this help\n\
         \x20 -d DEPTH         Trace depth (default {depth})\n\
         \x20 -r ROOT          Sample root, 1-{max} (default {root}, ROOT² samples per pixel)\n\
         \x20 -W WIDTH         Image width (default {width})\n\
         \x20 -H HEIGHT        Image height (default {height})\n\
         \x20 -l LEVEL         Log level: ERROR, WARN, INFO, DEBUG, TRACE (default {level})\n\
         \x20 -b BATCH         Samples per dispatch (default {batch})\n\
         \x20 -p               Start paused\n\
         \x20 -f               Fullscreen\n\
         \x20 --backend NAME   cpu or gpu (default {backend})\n\
         \x20 --kernel PATH    WGSL kernel replacing the built-in one\n\
         \x20 -o PATH          Write the converged image (.exr, .hdr, .png)\n\
         \x20 --config PATH    JSON settings applied before the other flags\n\
         \n\
         Environment:\n\
         \x20 RUST_LOG         Overrides -l with a tracing filter\n\
         \x20 T2_TRACE=1       Record a Chrome trace to trace.json\n",
        depth = defaults.trace_depth,
        max = MAX_SAMPLE_ROOT,
        root = defaults.sample_root,
        width = defaults.width,
        height = defaults.height,
        level = defaults.log_level,
        batch = defaults.batch_size,
        backend = Backend::default(),
    )
}

/// Parse arguments, program name excluded.
pub fn parse_args<I, S>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(Invocation::Help);
    }

    let mut config_path = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            config_path = Some(PathBuf::from(value("config", iter.next())?));
        } else {
            rest.push(arg);
        }
    }

    let mut config = match &config_path {
        Some(path) => Configuration::load(path)?,
        None => Configuration::default(),
    };
    let mut backend = Backend::default();
    let mut kernel = None;
    let mut output = None;

    let mut iter = rest.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-d" => config.trace_depth = number("trace depth", iter.next())?,
            "-r" => {
                let root = number("sample root", iter.next())?;
                validate_sample_root(root)?;
                config.sample_root = root;
            }
            "-W" => config.width = positive("width", iter.next())?,
            "-H" => config.height = positive("height", iter.next())?,
            "-l" => config.log_level = value("log level", iter.next())?.parse::<LogLevel>()?,
            "-b" => config.batch_size = positive("batch size", iter.next())?,
            "-p" => config.paused = true,
            "-f" => config.fullscreen = true,
            "--backend" => backend = value("backend", iter.next())?.parse()?,
            "--kernel" => kernel = Some(PathBuf::from(value("kernel", iter.next())?)),
            "-o" => output = Some(PathBuf::from(value("output", iter.next())?)),
            other => return Err(Error::invalid("argument", other)),
        }
    }

    config.validate()?;
    Ok(Invocation::Run(CliOptions { config, backend, kernel, output, config_path }))
}

fn value(name: &'static str, arg: Option<String>) -> Result<String> {
    arg.ok_or_else(|| Error::invalid(name, "missing value"))
}

fn number(name: &'static str, arg: Option<String>) -> Result<u32> {
    let text = value(name, arg)?;
    text.parse().map_err(|_| Error::invalid(name, text))
}

fn positive(name: &'static str, arg: Option<String>) -> Result<u32> {
    match number(name, arg)? {
        0 => Err(Error::invalid(name, 0)),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> CliOptions {
        match parse_args(args).unwrap() {
            Invocation::Run(options) => options,
            Invocation::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn test_defaults() {
        let options = run(&[]);
        assert_eq!(options.config, Configuration::default());
        assert_eq!(options.backend, Backend::default());
        assert_eq!(options.output, None);
    }

    #[test]
    fn test_all_flags() {
        let options = run(&[
            "-d", "3", "-r", "8", "-W", "320", "-H", "200", "-l", "debug", "-b", "2", "-p", "-f",
            "--backend", "cpu", "--kernel", "k.wgsl", "-o", "out.png",
        ]);
        let config = &options.config;
        assert_eq!(config.trace_depth, 3);
        assert_eq!(config.sample_root, 8);
        assert_eq!((config.width, config.height), (320, 200));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.batch_size, 2);
        assert!(config.paused && config.fullscreen);
        assert_eq!(options.backend, Backend::Cpu);
        assert_eq!(options.kernel, Some(PathBuf::from("k.wgsl")));
        assert_eq!(options.output, Some(PathBuf::from("out.png")));
    }

    #[test]
    fn test_zero_depth_allowed() {
        assert_eq!(run(&["-d", "0"]).config.trace_depth, 0);
    }

    #[test]
    fn test_help_wins() {
        assert_eq!(parse_args(["-r", "99", "-h"]).unwrap(), Invocation::Help);
        assert!(usage().contains("-r ROOT"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(parse_args(["-r", "0"]), Err(Error::InvalidSampleRoot(0))));
        assert!(matches!(parse_args(["-r", "33"]), Err(Error::InvalidSampleRoot(33))));
        assert!(matches!(parse_args(["-W", "0"]), Err(Error::InvalidArgument { name: "width", .. })));
        assert!(matches!(parse_args(["-d", "-1"]), Err(Error::InvalidArgument { .. })));
        assert!(matches!(parse_args(["-b"]), Err(Error::InvalidArgument { name: "batch size", .. })));
        assert!(matches!(parse_args(["-l", "loud"]), Err(Error::UnknownLogLevel(_))));
        assert!(matches!(parse_args(["--backend", "tpu"]), Err(Error::InvalidArgument { .. })));
        assert!(matches!(parse_args(["-x"]), Err(Error::InvalidArgument { name: "argument", .. })));
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t2.json");
        std::fs::write(&path, r#"{ "sample_root": 6, "batch_size": 9 }"#).unwrap();
        let path_str = path.to_str().unwrap();

        // Flags before --config still override the file
        let options = run(&["-b", "3", "--config", path_str]);
        assert_eq!(options.config.sample_root, 6);
        assert_eq!(options.config.batch_size, 3);
        assert_eq!(options.config.width, 1024);
        assert_eq!(options.config_path.as_deref(), Some(path.as_path()));
    }
}
