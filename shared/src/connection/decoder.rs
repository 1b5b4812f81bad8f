cfg_if! {
    if #[cfg(feature = "zstd_support")]
    {
        use zstd::bulk::Decompressor;

        use super::compression_config::CompressionMode;
        use super::error::DecoderError;

        pub struct Decoder {
            result: Vec<u8>,
            decompressor: Option<Decompressor<'static>>,
        }

        impl Decoder {
            /// Try to create a new Decoder; `None` rejects compressed frames
            pub fn try_new(compression_mode: Option<CompressionMode>) -> Result<Self, DecoderError> {
                let decompressor = match compression_mode {
                    None => None,
                    Some(CompressionMode::Default(_)) => Some(
                        Decompressor::new().map_err(|_| DecoderError::DecompressorCreationFailed)?,
                    ),
                    Some(CompressionMode::Dictionary(_, dictionary)) => Some(
                        Decompressor::with_dictionary(&dictionary)
                            .map_err(|_| DecoderError::DecompressorWithDictionaryFailed)?,
                    ),
                };

                Ok(Self {
                    decompressor,
                    result: Vec::new(),
                })
            }

            /// Try to decompress a payload of at most `limit` decompressed bytes
            ///
            /// SECURITY: This method processes untrusted network data. Any malformed or
            /// malicious payload will return an error instead of panicking.
            pub fn try_decode(&mut self, payload: &[u8], limit: usize) -> Result<&[u8], DecoderError> {
                let Some(decompressor) = &mut self.decompressor else {
                    return Err(DecoderError::CompressionUnsupported);
                };

                self.result = decompressor
                    .decompress(payload, limit)
                    .map_err(|_| DecoderError::DecompressionFailed {
                        payload_size: payload.len(),
                    })?;
                Ok(&self.result)
            }
        }
    }
    else
    {
        use super::compression_config::CompressionMode;
        use super::error::DecoderError;

        pub struct Decoder;

        impl Decoder {
            pub fn try_new(_: Option<CompressionMode>) -> Result<Self, DecoderError> {
                Ok(Self)
            }

            pub fn try_decode(&mut self, _payload: &[u8], _limit: usize) -> Result<&[u8], DecoderError> {
                Err(DecoderError::CompressionUnsupported)
            }
        }
    }
}
