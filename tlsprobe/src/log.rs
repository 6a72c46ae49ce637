use std::{env, path::Path, str::FromStr};

use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

use crate::error::Error;

/// Everything to stderr at the level in `RUST_LOG`.
pub fn config_default() -> Result<Config, Error> {
    Config::builder()
        .appender(appender_stderr("stderr"))
        .build(Root::builder().appender("stderr").build(log_level()))
        .map_err(|err| Error::Config(format!("invalid logging setup: {}", err)))
}

/// Like [`config_default`], with a copy of every line in `path`.
pub fn config_with_file<P>(path: P) -> Result<Config, Error>
where
    P: AsRef<Path>,
{
    Config::builder()
        .appender(appender_stderr("stderr"))
        .appender(appender_tofile("tofile", path)?)
        .build(
            Root::builder()
                .appender("stderr")
                .appender("tofile")
                .build(log_level()),
        )
        .map_err(|err| Error::Config(format!("invalid logging setup: {}", err)))
}

fn appender_stderr<S>(name: S) -> Appender
where
    S: AsRef<str>,
{
    Appender::builder().build(
        name.as_ref(),
        Box::new(
            ConsoleAppender::builder()
                .target(Target::Stderr)
                .encoder(Box::new(PatternEncoder::new(
                    "{h({d(%Y-%m-%dT%H:%M:%S%Z)}\t{l}\t{m}{n})}",
                )))
                .build(),
        ),
    )
}

fn appender_tofile<S, P>(name: S, log_path: P) -> Result<Appender, Error>
where
    S: AsRef<str>,
    P: AsRef<Path>,
{
    let log_path = log_path.as_ref();
    let appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d}\t{l}\t{M}\t{m}{n}")))
        .build(log_path)
        .map_err(|err| Error::Config(format!("{}: {}", log_path.display(), err)))?;

    Ok(Appender::builder().build(name.as_ref(), Box::new(appender)))
}

fn log_level() -> LevelFilter {
    env::var("RUST_LOG")
        .ok()
        .and_then(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(LevelFilter::Info)
}
