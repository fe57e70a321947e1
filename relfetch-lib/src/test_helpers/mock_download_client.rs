use crate::download_client::{AssetStream, DownloadClient};
use crate::error::TransportError;
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

type ChunkResult = Result<Vec<u8>, TransportError>;

enum StreamScript {
    Items {
        content_length: u64,
        items: Vec<ChunkResult>,
    },
    Channel {
        content_length: u64,
        headers: Option<oneshot::Receiver<()>>,
        receiver: mpsc::UnboundedReceiver<ChunkResult>,
    },
    Fail(TransportError),
}

struct Inner {
    body: Result<Vec<u8>, TransportError>,
    stream: Mutex<Option<StreamScript>>,
    requests: Mutex<Vec<(String, String)>>,
}

/// Scripted transport: a canned metadata body plus one asset response.
#[derive(Clone)]
pub struct MockDownloadClient {
    inner: Arc<Inner>,
}

/// Feeds chunks to a stream opened through [MockDownloadClient::scripted].
/// Dropping it ends the body and releases any held headers.
pub struct ChunkSender {
    sender: mpsc::UnboundedSender<ChunkResult>,
    headers: Mutex<Option<oneshot::Sender<()>>>,
}

impl ChunkSender {
    pub fn send(&self, chunk: &[u8]) {
        let _ = self.sender.send(Ok(chunk.to_vec()));
    }

    /// Lets a pending `open_stream` return with its announced length.
    pub fn release_headers(&self) {
        let gate = self.headers.lock().expect("header gate poisoned").take();
        if let Some(gate) = gate {
            let _ = gate.send(());
        }
    }
}

impl MockDownloadClient {
    fn new(body: Result<Vec<u8>, TransportError>, stream: Option<StreamScript>) -> Self {
        Self {
            inner: Arc::new(Inner {
                body,
                stream: Mutex::new(stream),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_body(body: &[u8]) -> Self {
        Self::new(Ok(body.to_vec()), None)
    }

    pub fn failing(error: TransportError) -> Self {
        Self::new(Err(error.clone()), Some(StreamScript::Fail(error)))
    }

    /// An asset response announcing `content_length` and delivering `chunks` at once.
    pub fn with_chunks(content_length: u64, chunks: &[&[u8]]) -> Self {
        let items = chunks.iter().map(|chunk| Ok(chunk.to_vec())).collect();
        Self::with_stream_items(content_length, items)
    }

    pub fn with_stream_items(content_length: u64, items: Vec<ChunkResult>) -> Self {
        Self::new(
            Ok(Vec::new()),
            Some(StreamScript::Items {
                content_length,
                items,
            }),
        )
    }

    /// An asset response whose chunks are pushed by the test through the returned sender.
    pub fn scripted(content_length: u64) -> (Self, ChunkSender) {
        Self::scripted_with_gate(content_length, false)
    }

    /// Like [Self::scripted], but `open_stream` does not return (so no length is
    /// announced) until [ChunkSender::release_headers] is called.
    pub fn scripted_with_held_headers(content_length: u64) -> (Self, ChunkSender) {
        Self::scripted_with_gate(content_length, true)
    }

    fn scripted_with_gate(content_length: u64, hold_headers: bool) -> (Self, ChunkSender) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (gate, headers) = if hold_headers {
            let (gate, headers) = oneshot::channel();
            (Some(gate), Some(headers))
        } else {
            (None, None)
        };
        let client = Self::new(
            Ok(Vec::new()),
            Some(StreamScript::Channel {
                content_length,
                headers,
                receiver,
            }),
        );
        let sender = ChunkSender {
            sender,
            headers: Mutex::new(gate),
        };
        (client, sender)
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.lock_requests().iter().map(|(url, _)| url.clone()).collect()
    }

    /// Credentials sent with each request, in order.
    pub fn credentials(&self) -> Vec<String> {
        self.lock_requests()
            .iter()
            .map(|(_, credential)| credential.clone())
            .collect()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
        self.inner.requests.lock().expect("request log poisoned")
    }

    fn record(&self, url: &str, credential: &str) {
        self.lock_requests()
            .push((url.to_string(), credential.to_string()));
    }
}

impl DownloadClient for MockDownloadClient {
    async fn fetch(&self, endpoint: &str, credential: &str) -> Result<Vec<u8>, TransportError> {
        self.record(endpoint, credential);
        self.inner.body.clone()
    }

    async fn open_stream(&self, url: &str, credential: &str) -> Result<AssetStream, TransportError> {
        self.record(url, credential);
        let script = self.inner.stream.lock().expect("stream poisoned").take();
        match script {
            Some(StreamScript::Items {
                content_length,
                items,
            }) => Ok(AssetStream {
                content_length,
                chunks: stream::iter(items).boxed(),
            }),
            Some(StreamScript::Channel {
                content_length,
                headers,
                receiver,
            }) => {
                if let Some(headers) = headers {
                    // A dropped sender counts as released.
                    let _ = headers.await;
                }
                Ok(AssetStream {
                    content_length,
                    chunks: stream::unfold(receiver, |mut receiver| async move {
                        receiver.recv().await.map(|item| (item, receiver))
                    })
                    .boxed(),
                })
            }
            Some(StreamScript::Fail(error)) => Err(error),
            None => Err(TransportError::Connection(
                "no asset response scripted".to_string(),
            )),
        }
    }
}
