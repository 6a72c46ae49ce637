use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::{
    arg, crate_authors, crate_name, crate_version, value_parser, ArgAction, ArgMatches, Command,
};
use log::{debug, error, info};

use crate::{
    config::{HandshakeConfig, HandshakeConfigBuilder},
    error::Error,
    handshake::TlsHandshake,
    log::{config_default, config_with_file},
};

fn create_app() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .author(crate_authors!())
        .about("Drives TLS 1.2 handshakes message by message against a server")
        .arg(arg!(-c --config [FILE] "TOML profile to start from")
            .value_parser(value_parser!(PathBuf)))
        .arg(arg!(-a --addr [ADDR] "Address of the server"))
        .arg(arg!(-p --port [PORT] "Port of the server")
            .value_parser(value_parser!(u16).range(1..)))
        .arg(arg!(--chunk [BYTES] "Split every transmission into writes of this size")
            .value_parser(value_parser!(u64).range(1..)))
        .arg(arg!(--"pacing-ms" [MS] "Pause after every chunk")
            .value_parser(value_parser!(u64)))
        .arg(arg!(--"timeout-ms" [MS] "Connect, send and receive timeout")
            .value_parser(value_parser!(u64).range(1..)))
        .arg(arg!(-s --"server-name" [NAME] "Server name for SNI, repeatable")
            .action(ArgAction::Append))
        .arg(arg!(--random "Use fresh randomness instead of the fixed client random"))
        .arg(arg!(-v --verbose "Dump every message sent and received"))
        .arg(arg!(--"handshake-only" "Skip the HTTP request after the handshake"))
        .arg(arg!(--resume "Resume the captured session with an abbreviated handshake"))
        .arg(arg!(--"strict-resumption" "Require a valid server Finished when resuming"))
        .arg(arg!(--"log-file" [FILE] "Also write the log to this file")
            .value_parser(value_parser!(PathBuf)))
}

fn build_config(matches: &ArgMatches) -> Result<HandshakeConfig, Error> {
    let mut builder = match matches.get_one::<PathBuf>("config") {
        Some(path) => HandshakeConfigBuilder::from_toml_file(path)?,
        None => HandshakeConfig::builder(),
    };

    if let Some(addr) = matches.get_one::<String>("addr") {
        builder = builder.addr(addr.as_str());
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        builder = builder.port(*port);
    }
    if let Some(chunk) = matches.get_one::<u64>("chunk") {
        builder = builder.chunk(*chunk as usize);
    }
    if let Some(pacing) = matches.get_one::<u64>("pacing-ms") {
        builder = builder.pacing(Duration::from_millis(*pacing));
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout-ms") {
        builder = builder.io_timeout(Duration::from_millis(*timeout));
    }
    if let Some(names) = matches.get_many::<String>("server-name") {
        builder = builder.server_names(names.cloned());
    }
    if matches.get_flag("random") {
        builder = builder.deterministic(false);
    }
    if matches.get_flag("verbose") {
        builder = builder.verbose(true);
    }
    if matches.get_flag("strict-resumption") {
        builder = builder.strict_resumption(true);
    }

    builder.build()
}

fn report(hs: &TlsHandshake) {
    match hs.failure() {
        Some(err) => {
            error!("{}", err);
            if let Error::Protocol(failure) = err {
                debug!("sent: {}", hex::encode(&failure.sent));
                debug!("received: {}", hex::encode(&failure.received));
            }
        }
        None => error!("handshake failed"),
    }
}

pub fn main() -> ExitCode {
    let matches = create_app().get_matches();

    let log_config = match matches.get_one::<PathBuf>("log-file") {
        Some(path) => config_with_file(path),
        None => config_default(),
    };
    let handle = log_config.and_then(|config| {
        log4rs::init_config(config).map_err(|err| Error::Config(err.to_string()))
    });
    if let Err(err) = handle {
        eprintln!("Failed to init logging: {}", err);
        return ExitCode::FAILURE;
    }

    let config = match build_config(&matches) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "target {}:{}, sni {:?}",
        config.addr(),
        config.port(),
        config.server_names()
    );

    let mut hs = TlsHandshake::new(config);
    let ok = if matches.get_flag("handshake-only") {
        hs.do_12_handshake(None)
    } else {
        hs.do_12(None)
    };
    if !ok {
        report(&hs);
        return ExitCode::FAILURE;
    }

    if let Ok(record) = hs.certificate_record() {
        info!(
            "server certificate issuer: CN {:?}, O {:?}",
            record.issuer_common_name(),
            record.issuer_organization()
        );
    }
    if let Some(response) = hs.http_response() {
        info!("{}", String::from_utf8_lossy(response));
    }

    if matches.get_flag("resume") {
        let (Some(master_secret), Some(ticket)) = (
            hs.master_secret().map(<[u8]>::to_vec),
            hs.ticket().map(<[u8]>::to_vec),
        ) else {
            error!("server issued no session ticket to resume with");
            return ExitCode::FAILURE;
        };

        if !hs.do_12_resume(&master_secret, &ticket, None) {
            report(&hs);
            return ExitCode::FAILURE;
        }
        info!("session resumed");
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::config::DEFAULT_PORT;

    fn parse(args: &[&str]) -> Result<HandshakeConfig, Error> {
        let matches = create_app().try_get_matches_from(args).unwrap();
        build_config(&matches)
    }

    #[test]
    fn defaults_without_flags() {
        let config = parse(&["tlsprobe"]).unwrap();
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.chunk(), None);
        assert!(config.deterministic());
    }

    #[test]
    fn flags_override_the_profile() {
        let mut profile = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut profile, b"port = 8443\nchunk = 100\n").unwrap();
        let path = profile.path().to_str().unwrap().to_string();

        let config = parse(&[
            "tlsprobe",
            "--config",
            &path,
            "--port",
            "9443",
            "-s",
            "a.test",
            "-s",
            "b.test",
            "--random",
        ])
        .unwrap();
        assert_eq!(config.port(), 9443);
        assert_eq!(config.chunk(), Some(100));
        assert_eq!(config.server_names(), ["a.test", "b.test"]);
        assert!(!config.deterministic());
    }

    #[test]
    fn zero_chunk_is_rejected_by_the_parser() {
        assert!(create_app()
            .try_get_matches_from(["tlsprobe", "--chunk", "0"])
            .is_err());
    }
}
