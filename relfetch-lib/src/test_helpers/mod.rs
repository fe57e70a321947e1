pub mod http_server;
pub mod mock_download_client;
