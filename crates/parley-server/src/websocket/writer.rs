//! Outbound half of a session: drain the mailbox, probe on a fixed cadence.

use std::fmt;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes};
use futures::{Sink, SinkExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::keepalive::KeepalivePolicy;
use crate::error::SessionError;
use crate::hub::Mailbox;

/// Write mailbox frames in order until the mailbox closes, a write fails,
/// or `cancel` fires.
///
/// A probe goes out every `probe_interval` whether or not data is flowing, so
/// a peer that only listens still has pongs to refresh its read deadline.
/// When the hub closes the mailbox, one close frame is attempted before
/// returning.
pub(crate) async fn run_writer<K>(
    sink: &mut K,
    mailbox: &mut Mailbox,
    policy: &KeepalivePolicy,
    cancel: &CancellationToken,
) -> Result<(), SessionError>
where
    K: Sink<Message> + Unpin,
    K::Error: fmt::Display,
{
    let mut probe = interval_at(Instant::now() + policy.probe_interval, policy.probe_interval);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = mailbox.recv() => {
                let Some(frame) = frame else {
                    debug!("mailbox closed, sending close frame");
                    let _ = write(sink, Message::Close(None), policy.write_deadline).await;
                    return Ok(());
                };
                write(sink, Message::Text(Utf8Bytes::from(&*frame)), policy.write_deadline).await?;
            }
            _ = probe.tick() => {
                trace!("sending probe");
                write(sink, Message::Ping(Vec::new().into()), policy.write_deadline).await?;
            }
        }
    }
}

async fn write<K>(sink: &mut K, message: Message, deadline: Duration) -> Result<(), SessionError>
where
    K: Sink<Message> + Unpin,
    K::Error: fmt::Display,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(SessionError::Transport(err.to_string())),
        Err(_) => Err(SessionError::WriteTimeout(deadline)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::Frame;
    use futures::StreamExt;
    use futures::channel::mpsc as fmpsc;
    use tokio::sync::mpsc;

    fn policy() -> KeepalivePolicy {
        KeepalivePolicy::new(
            Duration::from_secs(60),
            Duration::from_secs(10),
            Duration::from_secs(54),
            512,
        )
    }

    fn text_of(message: &Message) -> &str {
        match message {
            Message::Text(t) => t.as_str(),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn frames_written_in_order() {
        let (tx, mut mailbox) = mpsc::channel::<Frame>(8);
        let (mut sink, mut wire) = fmpsc::unbounded::<Message>();
        for i in 0..5 {
            tx.try_send(Frame::from(format!("f{i}"))).unwrap();
        }
        drop(tx);

        run_writer(&mut sink, &mut mailbox, &policy(), &CancellationToken::new())
            .await
            .unwrap();

        for i in 0..5 {
            let msg = wire.next().await.unwrap();
            assert_eq!(text_of(&msg), format!("f{i}"));
        }
        assert!(matches!(wire.next().await, Some(Message::Close(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_sent_after_idle_interval() {
        let (_tx, mut mailbox) = mpsc::channel::<Frame>(8);
        let (mut sink, mut wire) = fmpsc::unbounded::<Message>();
        let cancel = CancellationToken::new();

        let writer_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_writer(&mut sink, &mut mailbox, &policy(), &writer_cancel).await
        });

        let start = Instant::now();
        let msg = wire.next().await.unwrap();
        assert!(matches!(msg, Message::Ping(_)));
        assert!(start.elapsed() >= Duration::from_secs(54));

        let msg = wire.next().await.unwrap();
        assert!(matches!(msg, Message::Ping(_)));
        assert!(start.elapsed() >= Duration::from_secs(108));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn ping_cadence_holds_under_traffic() {
        let (tx, mut mailbox) = mpsc::channel::<Frame>(8);
        let (mut sink, mut wire) = fmpsc::unbounded::<Message>();
        let cancel = CancellationToken::new();

        let writer_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_writer(&mut sink, &mut mailbox, &policy(), &writer_cancel).await
        });
        let feeder = tokio::spawn(async move {
            for i in 0..6 {
                tokio::time::sleep(Duration::from_secs(20)).await;
                tx.send(Frame::from(format!("d{i}"))).await.unwrap();
            }
            tx
        });

        let start = Instant::now();
        let mut ping_times = Vec::new();
        let mut data = 0;
        while ping_times.len() < 2 {
            match wire.next().await.unwrap() {
                Message::Ping(_) => ping_times.push(start.elapsed()),
                Message::Text(_) => data += 1,
                other => panic!("unexpected frame {other:?}"),
            }
        }
        assert_eq!(ping_times[0].as_secs(), 54);
        assert_eq!(ping_times[1].as_secs(), 108);
        assert_eq!(data, 5, "frames at 20s..100s precede the second ping");

        let _tx = feeder.await.unwrap();
        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_write_is_transport_error() {
        let (tx, mut mailbox) = mpsc::channel::<Frame>(8);
        let (mut sink, wire) = fmpsc::unbounded::<Message>();
        drop(wire);
        tx.try_send(Frame::from("lost")).unwrap();

        let err = run_writer(&mut sink, &mut mailbox, &policy(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_write_hits_deadline() {
        let (tx, mut mailbox) = mpsc::channel::<Frame>(8);
        // zero-buffer channel whose receiver is never polled
        let (mut sink, _wire) = fmpsc::channel::<Message>(0);
        tx.try_send(Frame::from("a")).unwrap();
        tx.try_send(Frame::from("b")).unwrap();

        let err = run_writer(&mut sink, &mut mailbox, &policy(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WriteTimeout(d) if d == Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn cancellation_stops_writer() {
        let (_tx, mut mailbox) = mpsc::channel::<Frame>(8);
        let (mut sink, mut wire) = fmpsc::unbounded::<Message>();
        let cancel = CancellationToken::new();
        cancel.cancel();

        run_writer(&mut sink, &mut mailbox, &policy(), &cancel)
            .await
            .unwrap();
        drop(sink);
        assert!(wire.next().await.is_none());
    }
}
