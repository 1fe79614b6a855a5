//! Async transport implementation using tokio
//!
//! This module reads and writes protocol messages one line at a time over a
//! split stream. It is generic over the halves so the same code serves TCP
//! connections and in-memory pipes.

use crate::protocol::Message;
use crate::transport::{LINE_TERMINATOR, TransportError, codec};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

/// Line-oriented message connection over a reader and a writer half
pub struct AsyncConnection<R, W> {
    pub reader: R,
    pub writer: W,
}

impl AsyncConnection<BufReader<OwnedReadHalf>, OwnedWriteHalf> {
    /// Wrap an accepted or connected TCP stream
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(BufReader::new(reader), writer)
    }
}

impl<R, W> AsyncConnection<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Split back into the reader and writer halves
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Read and decode the next message, `None` on EOF
    #[cfg(test)]
    pub async fn read_message(&mut self) -> Result<Option<Message>, TransportError> {
        read_message(&mut self.reader).await
    }

    /// Encode and write a message followed by the line terminator
    #[cfg(test)]
    pub async fn write_message(&mut self, message: &Message) -> Result<(), TransportError> {
        write_message(&mut self.writer, message).await
    }
}

pub(crate) async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => Ok(None), // EOF - connection closed
        Ok(_) => {
            let message = codec::decode_message(&line)?;
            Ok(Some(message))
        }
        Err(e) => Err(TransportError::Io(e)),
    }
}

pub(crate) async fn write_message<W>(writer: &mut W, message: &Message) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = codec::encode_message(message);
    encoded.push_str(LINE_TERMINATOR);
    writer.write_all(encoded.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_write_appends_crlf() {
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        let mut conn = AsyncConnection::new(BufReader::new(server_read), server_write);

        let message = Message::with_prefix("ircd.twist.moe", "323", vec!["bob".into(), "End of LIST".into()]);
        conn.write_message(&message).await.unwrap();
        drop(conn);

        let mut received = String::new();
        let (mut client_read, _client_write) = tokio::io::split(client);
        client_read.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, ":ircd.twist.moe 323 bob :End of LIST\r\n");
    }

    #[tokio::test]
    async fn test_read_messages_until_eof() {
        let input: &[u8] = b"NICK bob\r\nUSER x x x :x\r\n";
        let mut conn = AsyncConnection::new(BufReader::new(input), tokio::io::sink());

        let first = conn.read_message().await.unwrap().unwrap();
        assert_eq!(first.command, "NICK");
        let second = conn.read_message().await.unwrap().unwrap();
        assert_eq!(second.params.last().map(String::as_str), Some(":x"));
        assert!(conn.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_malformed_line_is_parse_error() {
        let input: &[u8] = b"\r\n";
        let mut conn = AsyncConnection::new(BufReader::new(input), tokio::io::sink());

        assert!(matches!(
            conn.read_message().await,
            Err(TransportError::Parse(_))
        ));
    }
}
