//! Run event streams
//!
//! Raw `text/event-stream` bytes are decoded into [`SseFrame`]s and then
//! into typed [`StreamEvent`]s.

mod decoder;
mod event;

pub use decoder::{SseDecoder, SseFrame};
pub use event::{CustomEvent, StreamEvent};

use crate::error::{ClientError, ClientResult};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;

/// Boxed stream of typed run events
pub type EventStream = Pin<Box<dyn Stream<Item = ClientResult<StreamEvent>> + Send>>;

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<ClientResult<StreamEvent>>,
    exhausted: bool,
}

/// Turn an HTTP body into typed events
///
/// A transport error is yielded once and ends the stream.
pub fn decode_event_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.exhausted {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for frame in state.decoder.feed(chunk.as_ref()) {
                        state.pending.push_back(StreamEvent::from_frame(&frame));
                    }
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    state
                        .pending
                        .push_back(Err(ClientError::stream(format!("connection lost: {}", e))));
                }
                None => {
                    state.exhausted = true;
                    if let Some(frame) = state.decoder.finish() {
                        state.pending.push_back(StreamEvent::from_frame(&frame));
                    }
                }
            }
        }
    });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decode_event_stream() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"event: metadata\ndata: {\"run_id\": \"r\"}\n\nevent: val".to_vec()),
            Ok(b"ues\ndata: {\"messages\": []}\n\nevent: end\n".to_vec()),
        ];
        let events: Vec<_> = decode_event_stream(futures::stream::iter(chunks))
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(StreamEvent::Metadata { .. })));
        assert!(matches!(events[1], Ok(StreamEvent::Values(_))));
        assert!(matches!(events[2], Ok(StreamEvent::End)));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"event: metadata\ndata: {\"run_id\": \"r\"}\n\n".to_vec()),
            Err("reset by peer".to_string()),
            Ok(b"event: end\n\n".to_vec()),
        ];
        let events: Vec<_> = decode_event_stream(futures::stream::iter(chunks))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Err(e) if e.is_transport()));
    }
}
