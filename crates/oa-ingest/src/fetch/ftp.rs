//! FTP downloads
//!
//! `suppaftp`'s blocking client runs on the blocking thread pool. Transfers
//! use extended passive mode and binary type, and are streamed straight into
//! the staging file. Both the control and data sockets carry the configured
//! network timeout.

use super::{persist, staging_file, Fetcher};
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode};
use tracing::{debug, info, warn};
use url::Url;

pub struct FtpFetcher {
    username: String,
    password: String,
    timeout: Duration,
}

impl FtpFetcher {
    /// Credentials are used when the URL carries none
    pub fn new(username: String, password: String, timeout: Duration) -> Self {
        Self {
            username,
            password,
            timeout,
        }
    }

    fn credentials(&self, url: &Url) -> (String, String) {
        if url.username().is_empty() {
            (self.username.clone(), self.password.clone())
        } else {
            (
                url.username().to_string(),
                url.password().unwrap_or_default().to_string(),
            )
        }
    }
}

/// The path to request from the server, with percent escapes undone
fn remote_path(url: &Url) -> String {
    percent_decode_str(url.path()).decode_utf8_lossy().into_owned()
}

#[async_trait]
impl Fetcher for FtpFetcher {
    async fn fetch(&self, url: &Url, destination: &Path) -> Result<u64> {
        let host = url
            .host_str()
            .ok_or_else(|| IngestError::download(url, "FTP URL has no host"))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(21);
        let (username, password) = self.credentials(url);

        info!(url = %url, "Requesting");

        let job = FtpJob {
            address: format!("{}:{}", host, port),
            username,
            password,
            remote_path: remote_path(url),
            destination: destination.to_path_buf(),
            timeout: self.timeout,
        };

        let size = tokio::task::spawn_blocking(move || job.run())
            .await
            .map_err(|e| IngestError::download(url, format!("FTP task failed: {}", e)))?
            .map_err(|message| IngestError::download(url, message))?;

        debug!(url = %url, bytes = size, path = %destination.display(), "Downloaded");
        Ok(size)
    }
}

struct FtpJob {
    address: String,
    username: String,
    password: String,
    remote_path: String,
    destination: PathBuf,
    timeout: Duration,
}

/// Connect with a deadline and bound every later read and write on the socket
fn open_socket(addr: &SocketAddr, timeout: Duration) -> std::io::Result<TcpStream> {
    let socket = TcpStream::connect_timeout(addr, timeout)?;
    socket.set_read_timeout(Some(timeout))?;
    socket.set_write_timeout(Some(timeout))?;
    Ok(socket)
}

impl FtpJob {
    fn connect(&self) -> std::result::Result<FtpStream, String> {
        let addrs = self
            .address
            .to_socket_addrs()
            .map_err(|e| format!("could not resolve {}: {}", self.address, e))?;

        let mut last_error = format!("no addresses for {}", self.address);
        for addr in addrs {
            debug!(address = %addr, "Connecting to FTP server");
            match open_socket(&addr, self.timeout) {
                Ok(socket) => {
                    // Reads the greeting, which the socket timeout now bounds
                    return FtpStream::connect_with_stream(socket)
                        .map_err(|e| format!("could not connect: {}", e));
                },
                Err(e) => last_error = format!("could not connect to {}: {}", addr, e),
            }
        }
        Err(last_error)
    }

    fn run(self) -> std::result::Result<u64, String> {
        let timeout = self.timeout;
        let mut stream = self.connect()?.passive_stream_builder(move |addr| {
            open_socket(&addr, timeout).map_err(FtpError::ConnectionError)
        });

        stream.set_mode(Mode::ExtendedPassive);
        stream
            .login(&self.username, &self.password)
            .map_err(|e| format!("login failed: {}", e))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| format!("could not set binary mode: {}", e))?;

        let mut staged = staging_file(&self.destination).map_err(|e| e.to_string())?;
        let size = stream
            .retr(&self.remote_path, |reader| {
                std::io::copy(reader, &mut staged).map_err(FtpError::ConnectionError)
            })
            .map_err(|e| format!("could not retrieve {}: {}", self.remote_path, e))?;

        if let Err(e) = stream.quit() {
            warn!("Failed to quit FTP session gracefully: {}", e);
        }

        staged.flush().map_err(|e| e.to_string())?;
        persist(staged, &self.destination).map_err(|e| e.to_string())?;

        Ok(size)
    }
}
