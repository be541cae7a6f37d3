//! Shared test helpers
//!
//! Regular responses come from `httpmock`. [`RawServer`] covers what a mock
//! cannot express: bodies cut short, sent slowly, or never sent at all.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use httpmock::MockServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

/// Hex MD5 of `data`
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Base URL of a directory on a mock server
pub fn dir_url(server: &MockServer, dir: &str) -> Url {
    Url::parse(&server.url(format!("/{}/", dir))).unwrap()
}

/// Root URL of a mock server
pub fn root_url(server: &MockServer) -> Url {
    Url::parse(&server.url("/")).unwrap()
}

/// How the raw server misbehaves on every connection
#[derive(Debug, Clone)]
pub enum RawReply {
    /// Announces the full length, sends `sent` bytes, then closes
    Truncated { body: Vec<u8>, sent: usize },
    /// Sends the whole body in `chunk`-sized pieces, `pause` apart
    Trickle {
        body: Vec<u8>,
        chunk: usize,
        pause: Duration,
    },
    /// Sends the head and the first `sent` bytes, then goes quiet
    StallAfterHead { body: Vec<u8>, sent: usize },
    /// Reads the request and never answers
    Silent,
}

/// Single-purpose HTTP/1.1 server answering every request the same way
pub struct RawServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl RawServer {
    pub async fn start(reply: RawReply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let reply = reply.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, reply).await;
                });
            }
        });

        Self { addr, handle }
    }

    /// Base URL of a directory on the server
    pub fn dir_url(&self, dir: &str) -> Url {
        Url::parse(&format!("http://{}/{}/", self.addr, dir)).unwrap()
    }
}

impl Drop for RawServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, reply: RawReply) -> std::io::Result<()> {
    read_head(&mut stream).await?;

    match reply {
        RawReply::Truncated { body, sent } => {
            write_head(&mut stream, body.len()).await?;
            stream.write_all(&body[..sent]).await?;
            stream.flush().await?;
            // Let the client consume the partial body before the close.
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        RawReply::Trickle { body, chunk, pause } => {
            write_head(&mut stream, body.len()).await?;
            for piece in body.chunks(chunk) {
                stream.write_all(piece).await?;
                stream.flush().await?;
                tokio::time::sleep(pause).await;
            }
        }
        RawReply::StallAfterHead { body, sent } => {
            write_head(&mut stream, body.len()).await?;
            stream.write_all(&body[..sent]).await?;
            stream.flush().await?;
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        RawReply::Silent => tokio::time::sleep(Duration::from_secs(60)).await,
    }

    stream.shutdown().await
}

async fn write_head(stream: &mut TcpStream, length: usize) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        length
    );
    stream.write_all(head.as_bytes()).await?;
    stream.flush().await
}

async fn read_head(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}
