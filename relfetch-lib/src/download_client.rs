use crate::error::TransportError;
use futures_util::stream::BoxStream;

/// Body chunks of an asset response; every chunk is one progress tick.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// An asset response whose headers have arrived but whose body has not been read.
pub struct AssetStream {
    /// Announced body size, 0 when the server did not send one.
    pub content_length: u64,
    pub chunks: ChunkStream,
}

/// HTTP operations needed to list releases and download their assets.
///
/// The credential is attached only when non-empty and redirects are followed.
pub trait DownloadClient: Send + Sync {
    /// Issues one GET against `endpoint` and returns the body of a 200 response.
    fn fetch(
        &self,
        endpoint: &str,
        credential: &str,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Issues one GET against `url` and hands back the streaming body.
    fn open_stream(
        &self,
        url: &str,
        credential: &str,
    ) -> impl Future<Output = Result<AssetStream, TransportError>> + Send;
}
