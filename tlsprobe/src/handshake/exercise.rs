use log::{debug, trace};

use crate::{
    error::Error,
    handshake::Attempt,
    net::{Stream, Until},
};

/// Prefix a successful HTTP response starts with.
pub const GOOD_RESPONSE: &[u8] = b"HTTP/1.1 200";

impl<S: Stream> Attempt<'_, '_, S> {
    /// One HTTP request over the established channel. The response is kept
    /// whether it is good or not.
    pub(crate) fn exercise(&mut self) -> Result<(), Error> {
        let request = self.builder.http_request();
        let response = self.send_recv_scheduled(&[request], Until::Deadline)?;

        let data = response.application_data();
        if data.is_empty() {
            return Err(Error::structure("server sent no application data"));
        }
        trace!("http response: {}", String::from_utf8_lossy(&data));

        let good = data.starts_with(GOOD_RESPONSE);
        let status_line = data
            .split(|&b| b == b'\r' || b == b'\n')
            .next()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .unwrap_or_default();
        self.http_response = Some(data);

        if good {
            debug!("server answered {:?}", status_line);
            Ok(())
        } else {
            Err(Error::structure(format!(
                "unexpected http response {:?}",
                status_line
            )))
        }
    }
}
