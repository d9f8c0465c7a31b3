//! WebSocket client for the live endpoint.
//!
//! A thin wrapper over `tokio-tungstenite`: encode a [`ClientMessage`]
//! into a text frame, decode text frames into [`ServerMessage`]s, skip
//! control frames.

use casefile_protocol::{
    ClientMessage, Codec, JsonCodec, ProtocolError, ServerMessage,
    SessionCode,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One open `/sessions/{code}/live` socket.
pub struct LiveConnection {
    ws: WsStream,
    codec: JsonCodec,
}

impl LiveConnection {
    /// Connects to `{base_url}/sessions/{code}/live`, where `base_url`
    /// looks like `ws://127.0.0.1:8080`.
    pub async fn connect(
        base_url: &str,
        code: &SessionCode,
    ) -> Result<Self, ClientError> {
        let url = format!(
            "{}/sessions/{}/live",
            base_url.trim_end_matches('/'),
            code
        );
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        tracing::debug!(%url, "live connection open");
        Ok(Self {
            ws,
            codec: JsonCodec,
        })
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let text = self.codec.encode(msg)?;
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Waits for the next frame. `None` once the server closes the socket.
    pub async fn recv(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(self.codec.decode(text.as_str())?));
                }
                Some(Ok(Message::Binary(data))) => {
                    let text = std::str::from_utf8(&data).map_err(|e| {
                        ProtocolError::InvalidMessage(format!(
                            "binary frame is not UTF-8: {e}"
                        ))
                    })?;
                    return Ok(Some(self.codec.decode(text)?));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }
}
