use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use crate::errors::EngineError;

/// Connect with a deadline, returning the stream and the connect time.
pub async fn connect(host: &str, port: u16, deadline: Duration) -> Result<(TcpStream, Duration), EngineError> {
    let started = Instant::now();
    let stream = timeout(deadline, TcpStream::connect((host, port)))
        .await
        .map_err(|_| EngineError::Timeout(format!("connect {}:{}", host, port)))??;
    Ok((stream, started.elapsed()))
}

/// Read whatever the peer sends within `deadline`. Empty on silence.
pub async fn read_some(stream: &mut TcpStream, deadline: Duration) -> String {
    let mut buffer = [0u8; 1024];
    match timeout(deadline, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => String::from_utf8_lossy(&buffer[..n]).to_string(),
        _ => String::new(),
    }
}

/// Line-oriented text protocol session (FTP, POP3, IMAP, SMTP, telnet).
pub struct LineConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    deadline: Duration,
}

impl LineConn {
    pub async fn open(host: &str, port: u16, deadline: Duration) -> Result<Self, EngineError> {
        let (stream, _) = connect(host, port, deadline).await?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer: write,
            deadline,
        })
    }

    pub async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let n = timeout(self.deadline, self.reader.read_line(&mut line))
            .await
            .map_err(|_| EngineError::Timeout("read".into()))??;
        if n == 0 {
            return Err(EngineError::Probe("connection closed".into()));
        }
        Ok(line.trim_end().to_string())
    }

    /// Read raw bytes that arrive within the deadline, without waiting for a newline.
    pub async fn read_chunk(&mut self) -> Result<String, EngineError> {
        let mut buffer = [0u8; 2048];
        let n = timeout(self.deadline, self.reader.read(&mut buffer))
            .await
            .map_err(|_| EngineError::Timeout("read".into()))??;
        if n == 0 {
            return Err(EngineError::Probe("connection closed".into()));
        }
        Ok(String::from_utf8_lossy(&buffer[..n]).to_string())
    }

    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), EngineError> {
        timeout(self.deadline, self.writer.write_all(data))
            .await
            .map_err(|_| EngineError::Timeout("write".into()))??;
        Ok(())
    }

    pub async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        self.write_raw(format!("{}\r\n", line).as_bytes()).await
    }

    /// Send a command and return the first reply line.
    pub async fn command(&mut self, line: &str) -> Result<String, EngineError> {
        self.send_line(line).await?;
        self.read_line().await
    }

    /// Read a multi-line reply of the `code-text ... code text` form (FTP, SMTP).
    pub async fn read_reply(&mut self) -> Result<String, EngineError> {
        let mut line = self.read_line().await?;
        if line.len() >= 4 && line.as_bytes()[3] == b'-' {
            let code = line[..3].to_string();
            loop {
                let next = self.read_line().await?;
                let done = next.starts_with(&code) && next.as_bytes().get(3) == Some(&b' ');
                line = next;
                if done {
                    break;
                }
            }
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_line_conn_multiline_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"220-Welcome\r\n220-second line\r\n220 ready\r\n")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let mut conn = LineConn::open("127.0.0.1", port, Duration::from_secs(1)).await.unwrap();
        assert_eq!(conn.read_reply().await.unwrap(), "220 ready");
    }

    #[tokio::test]
    async fn test_connect_refused_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(connect("127.0.0.1", port, Duration::from_millis(500)).await.is_err());
    }
}
