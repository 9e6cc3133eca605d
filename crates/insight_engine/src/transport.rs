//! Push transport seam: a text-frame duplex opened per observer identity.

use std::pin::Pin;
use std::time::Duration;

use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use insight_logging::insight_debug;
use tokio_tungstenite::tungstenite::Message;

use crate::TransportError;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open transport. The stream ending means the peer closed it.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Connection {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, observer_id: &str) -> Result<Connection, TransportError>;
}

/// WebSocket transport at `{ws_base_url}/ws/{observer_id}`.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    ws_base_url: String,
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(ws_base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            connect_timeout,
        }
    }

    fn endpoint(&self, observer_id: &str) -> String {
        format!("{}/ws/{observer_id}", self.ws_base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, observer_id: &str) -> Result<Connection, TransportError> {
        let endpoint = self.endpoint(observer_id);
        insight_debug!("Connecting push channel to {endpoint}");
        let (socket, _response) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(endpoint.as_str()),
        )
        .await
        .map_err(|_| TransportError::Connect("connect timed out".to_string()))?
        .map_err(|err| TransportError::Connect(err.to_string()))?;

        let (write, read) = socket.split();
        let sink = write
            .sink_map_err(|err| TransportError::Send(err.to_string()))
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text))));
        let stream = read
            .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
            .filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_string())),
                    Ok(_) => None,
                    Err(err) => Some(Err(TransportError::Receive(err.to_string()))),
                })
            });

        Ok(Connection::new(Box::pin(sink), Box::pin(stream)))
    }
}
