/// Per-direction compression settings for frame payloads.
#[derive(Clone, Default)]
pub struct CompressionConfig {
    pub server_to_client: Option<CompressionMode>,
    pub client_to_server: Option<CompressionMode>,
}

impl CompressionConfig {
    pub fn new(
        server_to_client: Option<CompressionMode>,
        client_to_server: Option<CompressionMode>,
    ) -> Self {
        Self {
            server_to_client,
            client_to_server,
        }
    }

    /// Same mode in both directions
    pub fn symmetric(mode: CompressionMode) -> Self {
        Self {
            server_to_client: Some(mode.clone()),
            client_to_server: Some(mode),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompressionMode {
    /// Compression level
    Default(i32),
    /// Compression level, dictionary bytes
    Dictionary(i32, Vec<u8>),
}
