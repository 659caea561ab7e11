//! Per-connection relay between a streaming socket and a PTY session.
//!
//! A connection moves through Attaching → Streaming → Closing → Closed:
//!
//! 1. register a consumer and send the session history as one `output`
//!    envelope;
//! 2. run the outbound relay (queue → `output` envelopes, pings) and the
//!    inbound relay (`input`/`resize` envelopes → session, pong tracking)
//!    as separate tasks;
//! 3. when either relay stops, stop the other, detach the consumer once and
//!    close the socket.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use protocol::{Envelope, MessageType};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::utf8::Utf8Decoder;
use super::{HeartbeatConfig, TransportError};
use crate::session::PtySession;

/// What an inbound frame asks the adapter to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound {
    Input(String),
    Resize(u16, u16),
    Pong,
    Close,
    Ignored,
}

/// Interprets one inbound frame.
///
/// Envelopes may arrive as text or binary frames. Unparsable frames,
/// client-sent `output` envelopes, and resizes with a zero or missing
/// dimension are ignored.
pub(crate) fn classify(message: Message) -> Inbound {
    let parsed = match message {
        Message::Text(text) => Envelope::from_json(&text),
        Message::Binary(bytes) => Envelope::from_slice(&bytes),
        Message::Pong(_) => return Inbound::Pong,
        Message::Close(_) => return Inbound::Close,
        Message::Ping(_) => return Inbound::Ignored,
    };

    match parsed {
        Ok(envelope) => match envelope.kind {
            MessageType::Input => Inbound::Input(envelope.data),
            MessageType::Resize => envelope
                .resize_dimensions()
                .map(|(rows, cols)| Inbound::Resize(rows, cols))
                .unwrap_or(Inbound::Ignored),
            MessageType::Output => Inbound::Ignored,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparsable frame");
            Inbound::Ignored
        }
    }
}

fn output_message(text: String) -> Result<Message, TransportError> {
    Ok(Message::Text(Envelope::output(text).to_json()?))
}

async fn send_with_deadline<S>(
    sink: &mut S,
    message: Message,
    wait: Duration,
) -> Result<(), TransportError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::Broken(e.to_string())),
        Err(_) => Err(TransportError::Broken("write timed out".to_string())),
    }
}

/// Relays one connection until either side goes away.
///
/// Returns once the consumer has been detached and the socket closed. The
/// error, if any, describes why the connection ended; it never affects the
/// session.
pub async fn serve<S, R, E>(
    session: Arc<PtySession>,
    mut sink: S,
    stream: R,
    config: HeartbeatConfig,
) -> Result<(), TransportError>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let (consumer, history) = match session.attach_with_history().await {
        Ok(attached) => attached,
        Err(e) => {
            let _ = sink.close().await;
            return Err(e.into());
        }
    };
    let (consumer_id, rx, done) = consumer.into_parts();
    tracing::info!(
        session_id = %session.id(),
        consumer_id,
        history_bytes = history.len(),
        "Client attached"
    );

    let mut decoder = Utf8Decoder::new();
    let replay = decoder.decode(&history);
    if !replay.is_empty() {
        let sent = match output_message(replay) {
            Ok(message) => send_with_deadline(&mut sink, message, config.write_wait).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            session.detach_consumer(consumer_id);
            let _ = sink.close().await;
            tracing::debug!(
                session_id = %session.id(),
                consumer_id,
                error = %e,
                "History replay failed"
            );
            return Err(e);
        }
    }

    let shutdown = CancellationToken::new();

    let outbound = tokio::spawn(run_outbound(
        sink,
        rx,
        decoder,
        done.clone(),
        shutdown.clone(),
        config,
    ));
    let inbound = tokio::spawn(run_inbound(
        stream,
        Arc::clone(&session),
        done,
        shutdown,
        config.pong_wait,
    ));

    let (outbound, inbound) = tokio::join!(outbound, inbound);
    session.detach_consumer(consumer_id);

    let outcome = [outbound, inbound]
        .into_iter()
        .map(|joined| joined.unwrap_or_else(|e| Err(TransportError::Broken(e.to_string()))))
        .find(Result::is_err)
        .unwrap_or(Ok(()));

    match &outcome {
        Ok(()) => tracing::info!(session_id = %session.id(), consumer_id, "Client detached"),
        Err(e) => tracing::info!(
            session_id = %session.id(),
            consumer_id,
            reason = %e,
            "Client detached"
        ),
    }
    outcome
}

/// Sends queued output and pings until the consumer terminates, the queue
/// closes, a write fails, or the inbound relay stops.
async fn run_outbound<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<Bytes>,
    mut decoder: Utf8Decoder,
    done: CancellationToken,
    shutdown: CancellationToken,
    config: HeartbeatConfig,
) -> Result<(), TransportError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let _stop_inbound = shutdown.clone().drop_guard();
    let mut ping = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            _ = done.cancelled() => {
                // Deliver what the session queued before it closed.
                let mut flushed = Ok(());
                while let Ok(chunk) = rx.try_recv() {
                    flushed = send_chunk(&mut sink, &mut decoder, &chunk, config.write_wait).await;
                    if flushed.is_err() {
                        break;
                    }
                }
                break flushed;
            }
            chunk = rx.recv() => match chunk {
                Some(chunk) => {
                    let sent = send_chunk(&mut sink, &mut decoder, &chunk, config.write_wait).await;
                    if let Err(e) = sent {
                        break Err(e);
                    }
                }
                None => break Ok(()),
            },
            _ = ping.tick() => {
                let frame = Message::Ping(Vec::new());
                if let Err(e) = send_with_deadline(&mut sink, frame, config.write_wait).await {
                    break Err(e);
                }
            }
        }
    };

    let _ = timeout(config.write_wait, sink.send(Message::Close(None))).await;
    let _ = sink.close().await;
    result
}

async fn send_chunk<S>(
    sink: &mut S,
    decoder: &mut Utf8Decoder,
    chunk: &[u8],
    wait: Duration,
) -> Result<(), TransportError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let text = decoder.decode(chunk);
    if text.is_empty() {
        return Ok(());
    }
    send_with_deadline(sink, output_message(text)?, wait).await
}

/// Applies inbound envelopes until the peer closes, a read fails, no pong
/// arrives within `pong_wait`, or the outbound relay stops.
async fn run_inbound<R, E>(
    mut stream: R,
    session: Arc<PtySession>,
    done: CancellationToken,
    shutdown: CancellationToken,
    pong_wait: Duration,
) -> Result<(), TransportError>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let _stop_outbound = shutdown.clone().drop_guard();
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = done.cancelled() => return Ok(()),
            next = timeout_at(deadline, stream.next()) => next,
        };

        let message = match next {
            Err(_) => return Err(TransportError::LivenessTimeout(pong_wait)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(TransportError::Broken(e.to_string())),
            Ok(Some(Ok(message))) => message,
        };

        match classify(message) {
            Inbound::Input(data) => {
                let target = Arc::clone(&session);
                let written =
                    tokio::task::spawn_blocking(move || target.write_input(data.as_bytes())).await;
                match written {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(session_id = %session.id(), error = %e, "Input rejected")
                    }
                    Err(e) => {
                        tracing::warn!(session_id = %session.id(), error = %e, "Input task failed")
                    }
                }
            }
            Inbound::Resize(rows, cols) => {
                if let Err(e) = session.resize(rows, cols) {
                    tracing::debug!(session_id = %session.id(), error = %e, "Resize rejected");
                }
            }
            Inbound::Pong => deadline = Instant::now() + pong_wait,
            Inbound::Close => return Ok(()),
            Inbound::Ignored => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{HistoryStore, SpawnOptions};
    use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
    use tempfile::TempDir;

    type Inject = UnboundedSender<Result<Message, std::io::Error>>;

    fn heartbeat() -> HeartbeatConfig {
        HeartbeatConfig {
            ping_interval: Duration::from_secs(30),
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(5),
        }
    }

    fn started_session(temp: &TempDir, id: &str) -> Arc<PtySession> {
        let session =
            PtySession::spawn(SpawnOptions::new(id, "/bin/sh"), HistoryStore::new(temp.path()))
                .unwrap();
        session.start(Box::new(|_| {})).unwrap();
        session
    }

    fn text(envelope: Envelope) -> Result<Message, std::io::Error> {
        Ok(Message::Text(envelope.to_json().unwrap()))
    }

    /// Collects `output` payloads until `needle` appears or five seconds pass.
    async fn output_until(out: &mut UnboundedReceiver<Message>, needle: &str) -> String {
        let mut seen = String::new();
        let _ = timeout(Duration::from_secs(5), async {
            while let Some(message) = out.next().await {
                if let Message::Text(json) = message {
                    let envelope = Envelope::from_json(&json).unwrap();
                    assert_eq!(envelope.kind, MessageType::Output);
                    seen.push_str(&envelope.data);
                    if seen.contains(needle) {
                        break;
                    }
                }
            }
        })
        .await;
        seen
    }

    fn connect(
        session: &Arc<PtySession>,
        config: HeartbeatConfig,
    ) -> (
        Inject,
        UnboundedReceiver<Message>,
        tokio::task::JoinHandle<Result<(), TransportError>>,
    ) {
        let (out_tx, out_rx) = unbounded::<Message>();
        let (in_tx, in_rx) = unbounded::<Result<Message, std::io::Error>>();
        let handle = tokio::spawn(serve(Arc::clone(session), out_tx, in_rx, config));
        (in_tx, out_rx, handle)
    }

    #[test]
    fn test_classify_input() {
        let frame = Message::Text(r#"{"type":"input","data":"ls\n"}"#.to_string());
        assert_eq!(classify(frame), Inbound::Input("ls\n".to_string()));
    }

    #[test]
    fn test_classify_binary_frame() {
        let frame = Message::Binary(br#"{"type":"resize","rows":24,"cols":80}"#.to_vec());
        assert_eq!(classify(frame), Inbound::Resize(24, 80));
    }

    #[test]
    fn test_classify_rejects_zero_resize() {
        for json in [
            r#"{"type":"resize","rows":0,"cols":80}"#,
            r#"{"type":"resize","rows":24,"cols":0}"#,
            r#"{"type":"resize"}"#,
        ] {
            assert_eq!(classify(Message::Text(json.to_string())), Inbound::Ignored);
        }
    }

    #[test]
    fn test_classify_ignores_output_and_garbage() {
        let output = Message::Text(r#"{"type":"output","data":"x"}"#.to_string());
        assert_eq!(classify(output), Inbound::Ignored);
        assert_eq!(classify(Message::Text("not json".to_string())), Inbound::Ignored);
        assert_eq!(classify(Message::Ping(vec![1])), Inbound::Ignored);
    }

    #[test]
    fn test_classify_control_frames() {
        assert_eq!(classify(Message::Pong(Vec::new())), Inbound::Pong);
        assert_eq!(classify(Message::Close(None)), Inbound::Close);
    }

    #[tokio::test]
    async fn test_replay_then_live_relay() {
        let temp = TempDir::new().unwrap();
        let session = started_session(&temp, "relay01");

        // Produce some history before the connection exists.
        let mut early = session.attach_consumer();
        session.write_input(b"echo $((40+2))\n").unwrap();
        let mut seen = String::new();
        while !seen.contains("42") {
            let chunk = timeout(Duration::from_secs(5), early.recv()).await.unwrap().unwrap();
            seen.push_str(&String::from_utf8_lossy(&chunk));
        }

        let (inject, mut out, handle) = connect(&session, heartbeat());

        // The first frame is the full history.
        let first = timeout(Duration::from_secs(5), out.next()).await.unwrap().unwrap();
        let json = match first {
            Message::Text(json) => json,
            other => panic!("expected text frame, got {:?}", other),
        };
        let replay = Envelope::from_json(&json).unwrap();
        assert_eq!(replay.kind, MessageType::Output);
        assert!(replay.data.contains("42"));

        // Input goes to the shell and its output comes back live.
        inject.unbounded_send(text(Envelope::input("echo $((50+5))\n"))).unwrap();
        let live = output_until(&mut out, "55").await;
        assert!(live.contains("55"), "live output was {:?}", live);

        // Client disconnect ends the relay and detaches.
        drop(inject);
        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert_eq!(session.consumer_count(), 1);
        assert!(!session.is_closed());

        session.close();
    }

    #[tokio::test]
    async fn test_resize_envelopes() {
        let temp = TempDir::new().unwrap();
        let session = started_session(&temp, "resize02");
        let (inject, _out, handle) = connect(&session, heartbeat());

        inject.unbounded_send(text(Envelope::resize(0, 100))).unwrap();
        inject.unbounded_send(text(Envelope::resize(30, 100))).unwrap();
        inject.unbounded_send(text(Envelope::resize(45, 0))).unwrap();
        inject.unbounded_send(Ok(Message::Close(None))).unwrap();

        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert_eq!(session.size(), (30, 100));

        session.close();
    }

    #[tokio::test]
    async fn test_session_close_terminates_connection() {
        let temp = TempDir::new().unwrap();
        let session = started_session(&temp, "close02");
        let (_inject, out, handle) = connect(&session, heartbeat());

        // Wait until the consumer is registered.
        for _ in 0..100 {
            if session.consumer_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        session.close();

        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());

        let frames: Vec<Message> = out.collect().await;
        assert!(matches!(frames.last(), Some(Message::Close(_))));
    }

    #[tokio::test]
    async fn test_missing_pong_times_out() {
        let temp = TempDir::new().unwrap();
        let session = started_session(&temp, "pong01");
        let config = HeartbeatConfig {
            ping_interval: Duration::from_millis(50),
            pong_wait: Duration::from_millis(200),
            write_wait: Duration::from_secs(1),
        };
        let (_inject, out, handle) = connect(&session, config);

        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(TransportError::LivenessTimeout(_))));
        assert_eq!(session.consumer_count(), 0);

        let frames: Vec<Message> = out.collect().await;
        assert!(frames.iter().any(|m| matches!(m, Message::Ping(_))));

        session.close();
    }

    #[tokio::test]
    async fn test_pongs_keep_connection_alive() {
        let temp = TempDir::new().unwrap();
        let session = started_session(&temp, "pong02");
        let config = HeartbeatConfig {
            ping_interval: Duration::from_millis(50),
            pong_wait: Duration::from_millis(200),
            write_wait: Duration::from_secs(1),
        };
        let (inject, _out, handle) = connect(&session, config);

        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            inject.unbounded_send(Ok(Message::Pong(Vec::new()))).unwrap();
        }
        assert!(!handle.is_finished());

        drop(inject);
        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(result.is_ok());

        session.close();
    }

    #[tokio::test]
    async fn test_read_error_is_broken() {
        let temp = TempDir::new().unwrap();
        let session = started_session(&temp, "broken01");
        let (inject, _out, handle) = connect(&session, heartbeat());

        inject
            .unbounded_send(Err(std::io::Error::other("connection reset")))
            .unwrap();

        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(TransportError::Broken(_))));
        assert_eq!(session.consumer_count(), 0);

        session.close();
    }

    #[tokio::test]
    async fn test_attach_to_closed_session_fails() {
        let temp = TempDir::new().unwrap();
        let session = started_session(&temp, "gone01");
        session.close();

        let (_inject, _out, handle) = connect(&session, heartbeat());
        let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(TransportError::Session(_))));
    }
}
