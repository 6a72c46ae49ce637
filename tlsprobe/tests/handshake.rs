use test_log::test;
use tlsprobe::{
    config::TicketMode,
    error::Error,
    handshake::{HandshakeState, TlsHandshake, GOOD_RESPONSE},
    tls::msgs::{
        base::Payload,
        enums::{AlertDescription, ExtensionType},
        handshake::{ClientExtension, ServerName},
    },
};

mod common;

use common::{Behavior, Event, MockServer, HTTP_RESPONSE};

fn client_hello(events: &[Event]) -> &tlsprobe::tls::msgs::handshake::ClientHelloPayload {
    match events.first() {
        Some(Event::ClientHello(hello)) => hello,
        other => panic!("expected a ClientHello first, got {:?}", other),
    }
}

#[test]
fn full_handshake_then_http_request() {
    let server = MockServer::start(Behavior::Normal);
    let mut hs = TlsHandshake::new(server.config().build().unwrap());

    assert!(hs.do_12(None), "{:?}", hs.failure());
    assert_eq!(hs.state(), HandshakeState::Complete);
    assert_eq!(hs.progress(), HandshakeState::SentFinished);
    assert!(hs.failure().is_none());

    let response = hs.http_response().unwrap();
    assert!(response.starts_with(GOOD_RESPONSE));
    assert_eq!(response, HTTP_RESPONSE);

    assert_eq!(hs.master_secret().map(<[u8]>::len), Some(48));
    assert_eq!(hs.ticket(), Some(&b"mock-ticket-1"[..]));

    let events = &server.connections(1)[0];
    assert_eq!(
        events[1..],
        [
            Event::WarningAlert(AlertDescription::RecordOverflow),
            Event::ClientKeyExchange,
            Event::ChangeCipherSpec,
            Event::Finished { verified: true },
            Event::Request(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec()),
        ]
    );
}

#[test]
fn server_certificate_is_kept_for_inspection() {
    let server = MockServer::start(Behavior::Normal);
    let mut hs = TlsHandshake::new(server.config().build().unwrap());
    assert!(hs.do_12_handshake(None));

    assert_eq!(hs.certificate().unwrap().0, common::SERVER_CERT);
    assert_eq!(hs.x509_check_cn("example.com"), Ok(true));
    assert_eq!(hs.x509_check_cn("example.org"), Ok(false));
    assert_eq!(hs.x509_check_issuer("Example Org"), Ok(true));
    assert_eq!(hs.x509_check_issuer("Other Org"), Ok(false));
}

#[test]
fn handshake_only_sends_no_request() {
    let server = MockServer::start(Behavior::Normal);
    let mut hs = TlsHandshake::new(server.config().build().unwrap());

    assert!(hs.do_12_handshake(None));
    assert!(hs.http_response().is_none());

    let events = &server.connections(1)[0];
    assert_eq!(events.last(), Some(&Event::Finished { verified: true }));
}

#[test]
fn missing_certificate_fails_the_handshake() {
    let server = MockServer::start(Behavior::NoCertificate);
    let mut hs = TlsHandshake::new(server.config().build().unwrap());

    assert!(!hs.do_12(None));
    assert_eq!(hs.state(), HandshakeState::Failed);
    assert_eq!(hs.progress(), HandshakeState::SentClientHello);
    assert!(matches!(hs.failure(), Some(Error::Structure(_))));
    assert!(hs.certificate().is_none());
}

#[test]
fn hello_carries_configured_names_and_ticket() {
    let server = MockServer::start(Behavior::Normal);
    let config = server
        .config()
        .server_names(["tempesta-tech.com", "example.com"])
        .ticket(TicketMode::Empty)
        .build()
        .unwrap();
    let mut hs = TlsHandshake::new(config);
    assert!(hs.do_12(None));

    let connections = server.connections(1);
    let hello = client_hello(&connections[0]);
    assert_eq!(
        hello.find_extension(ExtensionType::ServerName),
        Some(&ClientExtension::ServerName(vec![
            ServerName::host_name("tempesta-tech.com"),
            ServerName::host_name("example.com"),
        ]))
    );
    assert_eq!(hello.ticket_extension(), Some(&Payload::empty()));
    assert_eq!(
        hs.http_response().map(|r| r.starts_with(GOOD_RESPONSE)),
        Some(true)
    );
    assert!(matches!(
        connections[0].last(),
        Some(Event::Request(req)) if req.starts_with(b"GET / HTTP/1.1\r\nHost: tempesta-tech.com\r\n")
    ));
}

#[test]
fn disabled_ticket_gets_no_ticket() {
    let server = MockServer::start(Behavior::Normal);
    let config = server.config().ticket(TicketMode::Disabled).build().unwrap();
    let mut hs = TlsHandshake::new(config);

    assert!(hs.do_12(None));
    assert!(hs.ticket().is_none());
    assert!(client_hello(&server.connections(1)[0])
        .ticket_extension()
        .is_none());
    assert_eq!(server.issued_tickets(), 0);
}

#[test]
fn fresh_randomness_also_completes() {
    let server = MockServer::start(Behavior::Normal);
    let config = server.config().deterministic(false).build().unwrap();
    let mut hs = TlsHandshake::new(config);

    assert!(hs.do_12(None));
    let hello = client_hello(&server.connections(1)[0]).clone();
    assert_ne!(&hello.random.0[4..], &[0x11; 28][..]);
}

#[test]
fn attempts_do_not_leak_into_each_other() {
    let server = MockServer::start(Behavior::Normal);
    let mut hs = TlsHandshake::new(server.config().build().unwrap());

    assert!(hs.do_12(None));
    let first = hs.master_secret().unwrap().to_vec();
    assert!(hs.do_12(None));

    assert_eq!(hs.ticket(), Some(&b"mock-ticket-2"[..]));
    assert_ne!(hs.master_secret().unwrap(), &first[..]);
    assert_eq!(server.connections(2).len(), 2);
}
