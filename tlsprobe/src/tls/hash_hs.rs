use log::trace;
use ring::digest;

/// Running SHA-256 hash over every handshake message of a connection, in
/// wire order.
#[derive(Clone)]
pub struct HandshakeHash {
    ctx: digest::Context,
    messages: usize,
}

impl Default for HandshakeHash {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeHash {
    pub fn new() -> Self {
        Self {
            ctx: digest::Context::new(&digest::SHA256),
            messages: 0,
        }
    }

    /// Hash one encoded handshake message.
    pub fn update_raw(&mut self, buf: &[u8]) -> &mut Self {
        trace!("transcript += {} bytes", buf.len());
        self.ctx.update(buf);
        self.messages += 1;
        self
    }

    /// Get the hash value if we were to hash `extra` too.
    pub fn get_hash_given(&self, extra: &[u8]) -> digest::Digest {
        let mut ctx = self.ctx.clone();
        ctx.update(extra);
        ctx.finish()
    }

    /// Get the current hash value.
    pub fn get_current_hash(&self) -> digest::Digest {
        self.ctx.clone().finish()
    }

    pub fn message_count(&self) -> usize {
        self.messages
    }
}
