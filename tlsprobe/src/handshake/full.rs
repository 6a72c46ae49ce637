use log::debug;

use crate::{
    error::Error,
    handshake::{Attempt, HandshakeState},
    net::{Response, Stream, Until},
    tls::{
        msgs::{
            enums::{AlertDescription, AlertLevel, HandshakeType},
            handshake::{HandshakePayload, ServerECDHParams, ServerKeyExchangePayload},
        },
        session::PeerFinished,
    },
};

fn server_ecdh_params(response: &Response) -> Result<ServerECDHParams, Error> {
    match response.find_handshake(HandshakeType::ServerKeyExchange) {
        Some(HandshakePayload::ServerKeyExchange(ServerKeyExchangePayload::ECDHE(ske))) => {
            Ok(ske.params.clone())
        }
        Some(_) => Err(Error::structure("ServerKeyExchange is not ECDHE")),
        None => Err(Error::structure("server sent no ServerKeyExchange")),
    }
}

impl<S: Stream> Attempt<'_, '_, S> {
    pub(crate) fn full_handshake(&mut self) -> Result<(), Error> {
        let hello = self.builder.client_hello(&self.session);
        self.send_scheduled(&[hello])?;
        self.advance(HandshakeState::SentClientHello);
        let response = self
            .transport
            .receive(&mut self.session, Until::Handshake(HandshakeType::ServerHelloDone))?;

        let leaf = match response.find_handshake(HandshakeType::Certificate) {
            Some(HandshakePayload::Certificate(chain)) => chain.first().cloned(),
            _ => None,
        }
        .ok_or_else(|| Error::structure("server sent no certificate"))?;
        debug!("server leaf certificate {:?}", leaf);
        self.certificate = Some(leaf);
        self.advance(HandshakeState::GotServerCert);

        let params = server_ecdh_params(&response)?;
        if !response.has_handshake(HandshakeType::ServerHelloDone) {
            return Err(Error::structure("server sent no ServerHelloDone"));
        }

        // Alerts below fatal level must be ignored before encryption starts.
        let probe = self
            .builder
            .alert(AlertLevel::Warning, AlertDescription::RecordOverflow);
        self.transport.send(&[probe], &mut self.session)?;

        let cke = self
            .builder
            .client_key_exchange(&mut self.session, &params)?;
        let ccs = self.builder.change_cipher_spec();
        self.send_scheduled(&[cke, ccs])?;
        self.advance(HandshakeState::SentClientKeyExchangeAndCcs);

        let finished = self.builder.finished(&self.session)?;
        let response =
            self.send_recv_scheduled(&[finished], Until::Handshake(HandshakeType::Finished))?;
        self.advance(HandshakeState::SentFinished);
        self.note_ticket(&response);

        self.expect_server_finished(&response)
    }

    /// The server's ChangeCipherSpec and a Finished matching our transcript.
    pub(crate) fn expect_server_finished(&self, response: &Response) -> Result<(), Error> {
        if !response.has_change_cipher_spec() {
            return Err(Error::structure("server sent no ChangeCipherSpec"));
        }

        match self.session.peer_finished() {
            PeerFinished::Verified => Ok(()),
            PeerFinished::NotReceived => Err(Error::structure("server sent no Finished")),
            PeerFinished::Mismatch => Err(Error::Crypto(
                "server Finished does not match the transcript".to_string(),
            )),
        }
    }
}
