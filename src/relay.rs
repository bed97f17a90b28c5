//! Relays upstream output to the HTTP caller.
//!
//! Chunks are written as they arrive, in order, untouched. Errors before the first byte
//! become a normal JSON error response; errors after it abort the transfer.

use axum::body::{ Body, Bytes };
use axum::http::{ header, StatusCode };
use axum::response::{ IntoResponse, Response };
use futures::{ Stream, StreamExt };
use log::{ debug, error };

use crate::error::{ ApiError, RelayError };

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_MARKDOWN: &str = "text/markdown; charset=utf-8";
pub const AUDIO_MPEG: &str = "audio/mpeg";

/// Streams `upstream` into a response body.
///
/// Waits for the first non-empty chunk before committing to a 200, so a provider that
/// fails up front is reported as a 502 instead of an empty success.
pub async fn relay_stream<S, T>(mut upstream: S, content_type: &'static str) -> Result<Response, ApiError>
    where
        S: Stream<Item = Result<T, RelayError>> + Send + Unpin + 'static,
        T: Into<Bytes> + AsRef<[u8]> + Send + 'static
{
    let first = loop {
        match upstream.next().await {
            Some(Ok(chunk)) if chunk.as_ref().is_empty() => {
                continue;
            }
            Some(Ok(chunk)) => {
                break Some(chunk.into());
            }
            Some(Err(e)) => {
                return Err(e.into());
            }
            None => {
                break None;
            }
        }
    };

    if first.is_none() {
        debug!("Upstream stream ended without content");
    }

    let rest = upstream
        .filter(|item| futures::future::ready(!matches!(item, Ok(chunk) if chunk.as_ref().is_empty())))
        .map(|item| -> Result<Bytes, RelayError> {
            item.map(|chunk| chunk.into()).map_err(|e| {
                error!("Upstream stream failed mid-response: {}", e);
                e
            })
        });
    let body = futures::stream::iter(first.map(Ok::<Bytes, RelayError>)).chain(rest);

    Ok(
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(body),
        ).into_response()
    )
}

/// A complete document sent as a single chunk, used for canned fallbacks.
pub fn single_chunk(text: impl Into<String>, content_type: &'static str) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], text.into()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use futures::stream;

    fn tokens(items: Vec<Result<&'static str, RelayError>>) -> impl Stream<Item = Result<String, RelayError>> + Send + Unpin + 'static {
        stream::iter(items.into_iter().map(|r| r.map(String::from)))
    }

    async fn body_of(resp: Response) -> Result<Bytes, axum::Error> {
        to_bytes(resp.into_body(), usize::MAX).await
    }

    #[tokio::test]
    async fn chunks_are_relayed_in_order() {
        let resp = relay_stream(tokens(vec![Ok("Hel"), Ok(""), Ok("lo"), Ok("!")]), TEXT_PLAIN).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], TEXT_PLAIN);
        assert_eq!(body_of(resp).await.unwrap(), Bytes::from("Hello!"));
    }

    #[tokio::test]
    async fn error_before_first_chunk_is_a_502() {
        let err = relay_stream(
            tokens(vec![Err(RelayError::Upstream { status: 500, body: "boom".into() })]),
            TEXT_PLAIN
        ).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn empty_chunks_then_error_is_still_a_502() {
        let err = relay_stream(
            tokens(vec![Ok(""), Err(RelayError::Malformed("bad".into()))]),
            TEXT_PLAIN
        ).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn mid_stream_error_aborts_the_body() {
        let resp = relay_stream(
            tokens(vec![Ok("partial"), Err(RelayError::Malformed("cut".into()))]),
            TEXT_PLAIN
        ).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_of(resp).await.is_err());
    }

    #[tokio::test]
    async fn no_chunks_means_empty_body() {
        let resp = relay_stream(tokens(vec![Ok("")]), TEXT_PLAIN).await.unwrap();
        assert!(body_of(resp).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn byte_streams_relay_untouched() {
        let audio = stream::iter(vec![Ok::<Bytes, RelayError>(Bytes::from_static(&[0xff, 0xfb])), Ok(Bytes::from_static(&[1]))]);
        let resp = relay_stream(audio, AUDIO_MPEG).await.unwrap();
        assert_eq!(body_of(resp).await.unwrap().as_ref(), &[0xff, 0xfb, 1]);
    }

    #[tokio::test]
    async fn single_chunk_sets_content_type() {
        let resp = single_chunk("# Scope", TEXT_MARKDOWN);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], TEXT_MARKDOWN);
        assert_eq!(body_of(resp).await.unwrap(), Bytes::from("# Scope"));
    }
}
