use crate::error::transport::TransportError;
use crate::transport::Replay;

use common::ErrorLocation;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::debug;
use tokio::io::{AsyncWriteExt, Join, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};

type FramedStream = WebSocketStream<Join<Replay<ReadHalf<TcpStream>>, WriteHalf<TcpStream>>>;

/// Answer the HTTP upgrade request and split the resulting web-socket.
pub(crate) async fn upgrade(
    replay: Replay<ReadHalf<TcpStream>>,
    write_half: WriteHalf<TcpStream>,
) -> Result<(FramedReader, FramedWriter), TransportError> {
    let ws_stream = accept_async(tokio::io::join(replay, write_half))
        .await
        .map_err(|e| TransportError::Handshake {
            message: format!("WebSocket handshake failed: {e}"),
            location: ErrorLocation::caller(),
        })?;

    let (sink, stream) = ws_stream.split();
    Ok((FramedReader { stream }, FramedWriter { sink }))
}

/// Best-effort HTTP 400 on a spare handle of a socket whose upgrade failed.
pub(crate) async fn reject(mut spare: TcpStream, reason: &str) {
    let response = format!(
        "HTTP/1.1 400 Bad Request\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{reason}",
        reason.len()
    );
    if let Err(e) = spare.write_all(response.as_bytes()).await {
        debug!("Upgrade rejection not delivered: {e}");
        return;
    }
    let _ = spare.shutdown().await;
}

/// Text-frame reader.
pub struct FramedReader {
    stream: SplitStream<FramedStream>,
}

impl FramedReader {
    pub async fn read(&mut self) -> Result<String, TransportError> {
        loop {
            match self.stream.next().await {
                None => return Err(TransportError::closed("web-socket stream ended")),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Close(_))) => {
                    return Err(TransportError::closed("peer sent a close frame"));
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => continue,
            }
        }
    }
}

/// Text-frame writer.
pub struct FramedWriter {
    sink: SplitSink<FramedStream, Message>,
}

impl FramedWriter {
    pub async fn write(&mut self, line: &str) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(line.to_owned().into()))
            .await
            .map_err(|e| TransportError::Write {
                message: format!("Failed to send text frame: {e}"),
                location: ErrorLocation::caller(),
            })
    }

    /// Send status 1000 and close the sink.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: Utf8Bytes::from_static(""),
        };
        let sent = self.sink.send(Message::Close(Some(frame))).await;
        let closed = self.sink.close().await;
        sent.and(closed).map_err(TransportError::from)
    }
}
