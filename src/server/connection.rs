//! Connection Handler
//!
//! Runs one TCP session: a reader task feeding lines to the broker and a
//! writer task draining the session's outbound channel.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::broker::{Broker, ClientId, EXIT_SIGNAL};
use crate::center::MessageCenter;

/// Handle an accepted connection until either side closes it
pub(super) async fn handle_connection(
    stream: TcpStream,
    id: ClientId,
    center: Arc<MessageCenter>,
    max_line_bytes: usize,
) {
    let (reader, mut writer) = stream.into_split();

    // Channel carrying outbound text for this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Attach before registering so the welcome message has somewhere to go
    center.switchboard().attach_client(id, tx);
    center.broker().add_client(id);

    // Task to forward outbound text to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if text == EXIT_SIGNAL {
                tracing::debug!(client_id = %id, "Client requested close");
                break;
            }
            if let Err(e) = writer.write_all(text.as_bytes()).await {
                tracing::debug!(client_id = %id, error = %e, "Write failed, closing connection");
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let broker = Arc::clone(center.broker());

    // Task to read command lines from the socket
    let mut recv_task = tokio::spawn(async move {
        read_commands(reader, id, &broker, max_line_bytes).await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    // Cleanup
    center.broker().remove_client(id);
    center.switchboard().detach_client(id);
}

/// Feed every line from `reader` to the broker until EOF or an I/O error
async fn read_commands<R>(reader: R, id: ClientId, broker: &Broker, max_line_bytes: usize)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match read_line_limited(&mut reader, &mut buf, max_line_bytes).await {
            Ok(0) => {
                tracing::debug!(client_id = %id, "Connection closed by peer");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(strip_line_terminator(&buf));
                broker.send_command(&line, id);
            }
            Err(e) => {
                tracing::debug!(client_id = %id, error = %e, "Read failed");
                break;
            }
        }
    }
}

/// Read one line into `buf`, keeping at most `max` bytes of it.
///
/// The rest of an over-long line is discarded. A limit of 0 is treated as 1.
/// Returns the number of bytes consumed from the stream, 0 at EOF.
async fn read_line_limited<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<usize>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let max = max.max(1);
    let mut consumed = (&mut *reader).take(max as u64).read_until(b'\n', buf).await?;

    if consumed == max && buf.last() != Some(&b'\n') {
        let mut discard = Vec::new();
        loop {
            discard.clear();
            let n = (&mut *reader).take(max as u64).read_until(b'\n', &mut discard).await?;
            consumed += n;
            if n == 0 || discard.last() == Some(&b'\n') {
                break;
            }
        }
        tracing::debug!(limit = max, "Over-long line truncated");
    }

    Ok(consumed)
}

fn strip_line_terminator(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_line_terminator() {
        assert_eq!(strip_line_terminator(b"list\r\n"), b"list");
        assert_eq!(strip_line_terminator(b"list\n"), b"list");
        assert_eq!(strip_line_terminator(b"list"), b"list");
        assert_eq!(strip_line_terminator(b"\r\n"), b"");
    }

    #[tokio::test]
    async fn test_read_line_limited_splits_lines() {
        let data: &[u8] = b"ping\r\nlist\n\nlast";
        let mut reader = BufReader::new(data);
        let mut lines = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if read_line_limited(&mut reader, &mut buf, 64).await.unwrap() == 0 {
                break;
            }
            lines.push(String::from_utf8(strip_line_terminator(&buf).to_vec()).unwrap());
        }

        assert_eq!(lines, vec!["ping", "list", "", "last"]);
    }

    #[tokio::test]
    async fn test_read_line_limited_truncates() {
        let data: &[u8] = b"abcdefghijkl\nping\n";
        let mut reader = BufReader::new(data);
        let mut buf = Vec::new();

        let consumed = read_line_limited(&mut reader, &mut buf, 4).await.unwrap();
        assert_eq!(consumed, 13);
        assert_eq!(buf, b"abcd");

        buf.clear();
        read_line_limited(&mut reader, &mut buf, 4).await.unwrap();
        assert_eq!(strip_line_terminator(&buf), b"ping");
    }

    #[tokio::test]
    async fn test_read_line_limited_zero_limit() {
        let data: &[u8] = b"ping\nlist\n";
        let mut reader = BufReader::new(data);
        let mut buf = Vec::new();

        let consumed = read_line_limited(&mut reader, &mut buf, 0).await.unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(buf, b"p");

        buf.clear();
        assert_eq!(read_line_limited(&mut reader, &mut buf, 0).await.unwrap(), 5);
        assert_eq!(buf, b"l");

        buf.clear();
        assert_eq!(read_line_limited(&mut reader, &mut buf, 0).await.unwrap(), 0);
    }
}
