use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::Event;
use futures::stream::Stream;
use serde_json::{json, Value};

use crate::orchestrator::ExchangeOutcome;

/// Split a reply into word chunks, trailing separator restored on every
/// chunk except the last. `"olá mundo"` becomes `["olá ", "mundo"]`.
pub fn split_chunks(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            if i == last {
                (*word).to_string()
            } else {
                format!("{} ", word)
            }
        })
        .collect()
}

/// One wire-level SSE frame before encoding.
#[derive(Debug)]
pub struct StreamFrame {
    /// SSE event name; `None` for the default (unnamed) chunk events.
    pub event: Option<&'static str>,
    pub data: Value,
}

/// The full frame sequence for a finished exchange: one unnamed frame per
/// word chunk with a monotonic `sequence` and `is_final` on the last, then
/// a single terminal frame tagged `end`.
pub fn stream_frames(outcome: &ExchangeOutcome) -> Vec<StreamFrame> {
    let chunks = split_chunks(&outcome.reply.text);
    let last = chunks.len().saturating_sub(1);

    let mut frames: Vec<StreamFrame> = chunks
        .into_iter()
        .enumerate()
        .map(|(sequence, chunk)| StreamFrame {
            event: None,
            data: json!({
                "chunk": chunk,
                "sequence": sequence,
                "is_final": sequence == last,
                "tokens": outcome.reply.tokens,
                "backend": outcome.reply.backend,
                "timestamp": outcome.reply.timestamp,
            }),
        })
        .collect();

    frames.push(StreamFrame {
        event: Some("end"),
        data: json!({
            "persisted": outcome.persisted,
            "persistence_failed": outcome.persistence_failed,
        }),
    });
    frames
}

/// Emit a finished exchange as an SSE chunk sequence.
///
/// The delay between frames is cosmetic; the reply is already complete
/// when streaming starts.
pub fn chunk_stream(
    outcome: ExchangeOutcome,
    chunk_delay: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let frames = stream_frames(&outcome);
        let last = frames.len().saturating_sub(1);

        for (i, frame) in frames.into_iter().enumerate() {
            let mut event = Event::default();
            if let Some(name) = frame.event {
                event = event.event(name);
            }
            match event.json_data(&frame.data) {
                Ok(event) => yield Ok(event),
                Err(err) => {
                    tracing::error!("failed to encode stream chunk: {err}");
                    yield Ok(Event::default()
                        .event("error")
                        .data("{\"error\":\"stream encoding failed\"}"));
                    return;
                }
            }
            if i < last {
                tokio::time::sleep(chunk_delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::{Envelope, ReplyStatus};

    fn outcome_with_reply(text: &str) -> ExchangeOutcome {
        ExchangeOutcome {
            reply: Envelope::new(text, 2, "demo-mode", ReplyStatus::Demo),
            user_message: None,
            assistant_message: None,
            persisted: false,
            persistence_failed: false,
        }
    }

    #[test]
    fn chunks_keep_separators_except_on_last() {
        assert_eq!(split_chunks("olá mundo"), vec!["olá ", "mundo"]);
        assert_eq!(split_chunks("uma"), vec!["uma"]);
        assert_eq!(
            split_chunks("  espaços   extras somem  "),
            vec!["espaços ", "extras ", "somem"]
        );
    }

    #[test]
    fn empty_reply_yields_no_chunks() {
        assert!(split_chunks("").is_empty());
        assert!(split_chunks("   ").is_empty());
    }

    #[test]
    fn two_word_reply_frames_exactly() {
        let frames = stream_frames(&outcome_with_reply("olá mundo"));
        assert_eq!(frames.len(), 3);

        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data["chunk"], "olá ");
        assert_eq!(frames[0].data["sequence"], 0);
        assert_eq!(frames[0].data["is_final"], false);
        assert_eq!(frames[0].data["backend"], "demo-mode");

        assert_eq!(frames[1].data["chunk"], "mundo");
        assert_eq!(frames[1].data["sequence"], 1);
        assert_eq!(frames[1].data["is_final"], true);

        assert_eq!(frames[2].event, Some("end"));
        assert_eq!(frames[2].data["persisted"], false);
    }

    #[test]
    fn sequences_are_strictly_increasing() {
        let frames = stream_frames(&outcome_with_reply("uma resposta com várias palavras"));
        let sequences: Vec<u64> = frames
            .iter()
            .filter(|f| f.event.is_none())
            .map(|f| f.data["sequence"].as_u64().unwrap())
            .collect();
        assert!(sequences.windows(2).all(|w| w[1] == w[0] + 1));
        assert_eq!(sequences.first(), Some(&0));
    }
}
