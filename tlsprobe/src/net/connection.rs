use std::{
    io,
    io::{Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use log::{debug, trace};

use crate::{error::Error, net::stream::Stream};

/// One TCP connection to the server under test.
///
/// The socket is shut down and closed when the value is dropped, so every
/// way out of a handshake attempt releases it.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Connects to `addr:port`, trying every resolved address in turn.
    ///
    /// `nodelay` disables send coalescing so that every write of a chunked
    /// transmission leaves as its own segment.
    pub fn establish(addr: &str, port: u16, timeout: Duration, nodelay: bool) -> Result<Self, Error> {
        let addrs = (addr, port)
            .to_socket_addrs()
            .map_err(|err| Error::Connection(format!("failed to resolve {}: {}", addr, err)))?;

        let mut last_err = None;
        for peer in addrs {
            match Self::connect(peer, timeout, nodelay) {
                Ok(stream) => {
                    debug!("connected to {}", peer);
                    return Ok(Self { stream, peer });
                }
                Err(err) => {
                    debug!("failed to connect to {}: {}", peer, err);
                    last_err = Some(err);
                }
            }
        }

        Err(match last_err {
            Some(err) => Error::Connection(format!("{}:{}: {}", addr, port, err)),
            None => Error::Connection(format!("{} resolved to no address", addr)),
        })
    }

    fn connect(peer: SocketAddr, timeout: Duration, nodelay: bool) -> io::Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&peer, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        if nodelay {
            stream.set_nodelay(true)?;
        }
        Ok(stream)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Stream for Connection {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        // A zero timeout is rejected by the socket layer.
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream.set_read_timeout(Some(timeout))
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        trace!("closing connection to {}", self.peer);
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
