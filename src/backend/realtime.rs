//! Server-sent change feed decoding
//!
//! The realtime endpoint streams `text/event-stream` where every event's
//! `data:` field holds one JSON [`ChangeEvent`]. Events named `ping`, empty
//! data and records for other tables or kinds are skipped.
//!
//! ```text
//! event: change
//! data: {"table":"study_sessions","type":"INSERT","record":{...}}
//!
//! ```

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::{ChangeEvent, ChangeEventFilter};

/// Which events a decoded stream forwards
#[derive(Debug, Clone)]
pub struct FeedScope {
    pub table: String,
    pub events: ChangeEventFilter,
}

impl FeedScope {
    fn accepts(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && self.events.matches(event.kind)
    }
}

/// Read an SSE byte stream and forward matching change events to `tx`.
///
/// Returns when the stream ends, `cancel` fires, or the receiver is gone.
pub async fn pump_change_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    tx: mpsc::UnboundedSender<ChangeEvent>,
    scope: FeedScope,
    cancel: CancellationToken,
) {
    use futures::StreamExt;

    // raw bytes between `\n\n` boundaries; decoded only once a block is complete
    let mut buffer = BytesMut::new();

    tokio::pin!(byte_stream);

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            chunk = byte_stream.next() => chunk,
        };

        let chunk = match chunk {
            Some(Ok(c)) => c,
            Some(Err(e)) => {
                tracing::warn!(table = %scope.table, error = %e, "Change feed stream failed");
                break;
            }
            None => break,
        };

        // `\r` never occurs inside a UTF-8 sequence or a JSON string, so
        // dropping it turns CRLF into LF even across chunk boundaries
        buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        while let Some(pos) = find_block_end(&buffer) {
            let block = buffer.split_to(pos + 2);
            if !forward_block(&block[..pos], &tx, &scope) {
                return;
            }
        }
    }

    if !buffer.iter().all(u8::is_ascii_whitespace) {
        forward_block(&buffer, &tx, &scope);
    }
    tracing::debug!(table = %scope.table, "Change feed stream ended");
}

fn find_block_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

/// Decode one raw block and forward it. Returns `false` once the receiver is closed.
fn forward_block(
    block: &[u8],
    tx: &mpsc::UnboundedSender<ChangeEvent>,
    scope: &FeedScope,
) -> bool {
    match std::str::from_utf8(block) {
        Ok(text) => forward_event(text, tx, scope),
        Err(e) => {
            tracing::debug!(table = %scope.table, error = %e, "Ignoring non UTF-8 change event");
            !tx.is_closed()
        }
    }
}

/// Forward one SSE event block. Returns `false` once the receiver is closed.
fn forward_event(
    block: &str,
    tx: &mpsc::UnboundedSender<ChangeEvent>,
    scope: &FeedScope,
) -> bool {
    match parse_event_block(block) {
        Some(event) if scope.accepts(&event) => tx.send(event).is_ok(),
        _ => !tx.is_closed(),
    }
}

/// Decode a single SSE event block into a change event
pub fn parse_event_block(block: &str) -> Option<ChangeEvent> {
    let mut data_lines: Vec<&str> = Vec::new();
    let mut event_name: Option<&str> = None;

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.trim());
        } else if let Some(value) = line.strip_prefix("event:") {
            event_name = Some(value.trim());
        }
        // `id:`, `retry:` and `:` comments carry nothing we use
    }

    if event_name.is_some_and(|name| name.eq_ignore_ascii_case("ping")) {
        return None;
    }

    let data = data_lines.join("\n");
    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<ChangeEvent>(&data) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring undecodable change event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChangeKind;

    fn scope() -> FeedScope {
        FeedScope {
            table: "study_sessions".to_string(),
            events: ChangeEventFilter::All,
        }
    }

    #[test]
    fn test_parse_event_block() {
        let block = "event: change\nid: 7\ndata: {\"table\":\"study_sessions\",\"type\":\"UPDATE\"}";
        let event = parse_event_block(block).unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
    }

    #[test]
    fn test_parse_skips_ping_and_garbage() {
        assert!(parse_event_block("event: ping\ndata: {}").is_none());
        assert!(parse_event_block(": keepalive").is_none());
        assert!(parse_event_block("data: not json").is_none());
    }

    #[tokio::test]
    async fn test_pump_splits_chunks_and_filters_table() {
        let chunks: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from("data: {\"table\":\"study_sessions\",")),
            Ok(Bytes::from("\"type\":\"INSERT\"}\n\ndata: {\"table\":\"other\",\"type\":\"INSERT\"}\n\n")),
            Ok(Bytes::from("data: {\"table\":\"study_sessions\",\"type\":\"DELETE\"}\r\n\r\n")),
        ];
        let (tx, mut rx) = mpsc::unbounded_channel();

        pump_change_stream(
            futures::stream::iter(chunks),
            tx,
            scope(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Insert);
        assert_eq!(rx.recv().await.unwrap().kind, ChangeKind::Delete);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_keeps_characters_split_across_chunks() {
        let raw = "data: {\"table\":\"study_sessions\",\"type\":\"INSERT\",\"record\":{\"title\":\"Fran\u{e7}ais\"}}\r\n\r\n"
            .as_bytes();
        // split between the two bytes of `ç`, then between `\r` and `\n`
        let cedilla = raw.iter().position(|b| *b == 0xC3).unwrap();
        let cr = raw.iter().position(|b| *b == b'\r').unwrap();
        let chunks: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::copy_from_slice(&raw[..cedilla + 1])),
            Ok(Bytes::copy_from_slice(&raw[cedilla + 1..cr + 1])),
            Ok(Bytes::copy_from_slice(&raw[cr + 1..])),
        ];
        let (tx, mut rx) = mpsc::unbounded_channel();

        pump_change_stream(
            futures::stream::iter(chunks),
            tx,
            scope(),
            CancellationToken::new(),
        )
        .await;

        let event = rx.recv().await.expect("insert should survive the split");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record.unwrap()["title"], "Fran\u{e7}ais");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_stops_when_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        pump_change_stream(
            futures::stream::pending::<reqwest::Result<Bytes>>(),
            tx,
            scope(),
            cancel,
        )
        .await;

        assert!(rx.recv().await.is_none());
    }
}
