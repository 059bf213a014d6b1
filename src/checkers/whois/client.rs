//! Raw WHOIS TCP transport (spec §4.4 WHOIS path).

use crate::checkers::CheckerError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_BYTES: usize = 128 * 1024;

/// Opens a WHOIS connection, sends `query\r\n`, and reads until EOF or the
/// response-size cap, whichever comes first.
pub struct WhoisClient {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl WhoisClient {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self { connect_timeout, read_timeout }
    }

    pub async fn query(&self, server: &str, query: &str) -> Result<String, CheckerError> {
        let mut stream = timeout(self.connect_timeout, TcpStream::connect((server, WHOIS_PORT))).await??;
        let _ = stream.set_nodelay(true);

        let line = format!("{}\r\n", query);
        timeout(self.read_timeout, stream.write_all(line.as_bytes())).await??;

        let mut buf = [0u8; 4096];
        let mut response = Vec::new();
        loop {
            let n = timeout(self.read_timeout, stream.read(&mut buf)).await??;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buf[..n]);
            if response.len() > MAX_RESPONSE_BYTES {
                return Err(CheckerError::ResponseTooLarge);
            }
        }

        debug!(server, bytes = response.len(), "whois response read");
        String::from_utf8(response).map_err(|_| CheckerError::InvalidUtf8)
    }
}
