use futures_util::{Stream, StreamExt};

use crate::{AgentChunk, AgentError};

/// Concatenates chunk payloads in arrival order.
///
/// Chunks without a payload contribute nothing; an empty stream yields an
/// empty string. A stream error aborts aggregation and is returned as-is so
/// the caller can classify it.
pub async fn aggregate_chunks<S>(mut stream: S) -> Result<String, AgentError>
where
    S: Stream<Item = Result<AgentChunk, AgentError>> + Unpin,
{
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        if let Some(bytes) = chunk?.bytes {
            buffer.extend_from_slice(&bytes);
        }
    }
    // Decode once so multi-byte characters split across chunks survive.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn empty_stream_is_empty_text() {
        let chunks: Vec<Result<AgentChunk, AgentError>> = Vec::new();
        let text = aggregate_chunks(stream::iter(chunks)).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn split_multibyte_character_is_preserved() {
        let bytes = "déjà".as_bytes();
        let chunks = vec![
            Ok(AgentChunk::new(bytes[..2].to_vec())),
            Ok(AgentChunk::empty()),
            Ok(AgentChunk::new(bytes[2..].to_vec())),
        ];
        let text = aggregate_chunks(stream::iter(chunks)).await.unwrap();
        assert_eq!(text, "déjà");
    }
}
