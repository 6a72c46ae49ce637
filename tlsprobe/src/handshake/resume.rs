use log::{debug, warn};

use crate::{
    error::Error,
    handshake::{Attempt, HandshakeState},
    net::{Stream, Until},
    tls::{msgs::enums::HandshakeType, session::PeerFinished},
};

impl<S: Stream> Attempt<'_, '_, S> {
    /// Abbreviated handshake on a session seeded with an earlier master
    /// secret. The server must answer the ClientHello with its
    /// ChangeCipherSpec right away.
    pub(crate) fn abbreviated_handshake(&mut self) -> Result<(), Error> {
        let hello = self.builder.client_hello(&self.session);
        self.send_scheduled(&[hello])?;
        self.advance(HandshakeState::SentClientHello);
        let response = self
            .transport
            .receive(&mut self.session, Until::Handshake(HandshakeType::Finished))?;

        if response.has_handshake(HandshakeType::Certificate) {
            debug!("server fell back to a full handshake");
        }
        if !response.has_change_cipher_spec() {
            return Err(Error::structure("server did not resume the session"));
        }
        self.note_ticket(&response);
        self.advance(HandshakeState::GotServerCcs);

        if self.strict_resumption {
            self.expect_server_finished(&response)?;
        } else if self.session.peer_finished() != PeerFinished::Verified {
            warn!(
                "server Finished on resumption: {:?}",
                self.session.peer_finished()
            );
        }

        let ccs = self.builder.change_cipher_spec();
        self.send_scheduled(&[ccs])?;

        // The resumed Finished is not a scheduled send.
        let finished = self.builder.finished(&self.session)?;
        let result = self
            .transport
            .send(&[finished], &mut self.session)
            .and_then(|_| self.transport.receive(&mut self.session, Until::Deadline));
        self.advance(HandshakeState::SentFinished);

        match result {
            Ok(_) => Ok(()),
            Err(err @ Error::Protocol(_)) => Err(err),
            Err(err) if self.strict_resumption => Err(err),
            Err(err) => {
                warn!("ignoring after resumed Finished: {}", err);
                Ok(())
            }
        }
    }
}
