use crate::burner::BurnerConfig;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "simple")]
#[command(about = "Burns CPU in four busy-work functions, optionally under a CPU profiler")]
#[command(version)]
pub struct SimpleCli {
    /// Write cpu profile to file
    #[arg(long, value_name = "PATH", default_value = "", allow_hyphen_values = true)]
    pub cpuprofile: String,
}

impl SimpleCli {
    /// Parse `args` (program name first), accepting single-dash long flags
    /// such as `-cpuprofile=out.prof` alongside the usual `--cpuprofile`.
    pub fn parse_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_long_flags(args))
    }

    pub fn into_config(self) -> BurnerConfig {
        let cpuprofile = if self.cpuprofile.is_empty() {
            None
        } else {
            Some(PathBuf::from(self.cpuprofile))
        };

        BurnerConfig {
            cpuprofile,
            ..Default::default()
        }
    }
}

/// Long flags whose value may come as the next argument
const VALUE_FLAGS: &[&str] = &["cpuprofile"];

/// Rewrite `-name` / `-name=value` into `--name` / `--name=value` when `name`
/// is longer than one character. Short flags, the value following a bare
/// value flag, and everything after `--` are left alone.
fn normalize_long_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut passthrough = false;
    let mut value_next = false;

    for (i, arg) in args.into_iter().enumerate() {
        let arg: OsString = arg.into();
        if i == 0 || passthrough || value_next {
            value_next = false;
            out.push(arg);
            continue;
        }

        value_next = arg.to_str().is_some_and(takes_next_value);
        let rewritten = match arg.to_str() {
            Some("--") => {
                passthrough = true;
                None
            }
            Some(s) if is_single_dash_long(s) => Some(OsString::from(format!("-{s}"))),
            _ => None,
        };
        out.push(rewritten.unwrap_or(arg));
    }

    out
}

/// `-cpuprofile` or `--cpuprofile` without an inline `=value`
fn takes_next_value(arg: &str) -> bool {
    let name = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'));
    name.is_some_and(|n| VALUE_FLAGS.contains(&n))
}

fn is_single_dash_long(arg: &str) -> bool {
    match arg.strip_prefix('-') {
        Some(rest) if !rest.starts_with('-') => {
            rest.split('=').next().is_some_and(|name| name.chars().count() > 1)
        }
        _ => false,
    }
}
