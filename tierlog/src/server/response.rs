//! HTTP response framing for the log server.
//!
//! Query responses are streamed: the body is produced one record at a
//! time as `{"logs": [<obj>,<obj>]}` with no trailing comma, and
//! `{"logs": []}` for the empty case. Dropping the body mid-transfer
//! (client disconnect) drops the underlying tier streams, which
//! releases the hot-tier cursor.

use axum::body::Body;
use bytes::Bytes;
use futures::stream;

use crate::model::LogRecord;
use crate::query::LogQueryStream;

const OPEN: &str = "{\"logs\": [";
const CLOSE: &str = "]}";

enum State {
    First(LogQueryStream),
    Rest(LogQueryStream),
    Done,
}

fn encode(record: &LogRecord) -> Result<String, std::io::Error> {
    serde_json::to_string(record).map_err(std::io::Error::other)
}

fn stream_error(e: crate::error::Error) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

/// Wraps a query stream as an incrementally produced response body.
///
/// A hot-tier failure mid-stream aborts the body; the status line has
/// already been sent by then, so the client sees a truncated transfer
/// rather than an error document.
pub fn logs_body(stream: LogQueryStream) -> Body {
    let chunks = stream::unfold(State::First(stream), |state| async move {
        match state {
            State::First(mut s) => match s.next().await {
                Ok(Some(record)) => match encode(&record) {
                    Ok(json) => Some((
                        Ok(Bytes::from(format!("{OPEN}{json}"))),
                        State::Rest(s),
                    )),
                    Err(e) => Some((Err(e), State::Done)),
                },
                Ok(None) => Some((
                    Ok(Bytes::from(format!("{OPEN}{CLOSE}"))),
                    State::Done,
                )),
                Err(e) => Some((Err(stream_error(e)), State::Done)),
            },
            State::Rest(mut s) => match s.next().await {
                Ok(Some(record)) => match encode(&record) {
                    Ok(json) => Some((Ok(Bytes::from(format!(",{json}"))), State::Rest(s))),
                    Err(e) => Some((Err(e), State::Done)),
                },
                Ok(None) => Some((Ok(Bytes::from_static(CLOSE.as_bytes())), State::Done)),
                Err(e) => Some((Err(stream_error(e)), State::Done)),
            },
            State::Done => None,
        }
    });
    Body::from_stream(chunks)
}
