//! Bounded row channels between operators.
//!
//! Every send and receive races the caller's cancellation signal, so a
//! cancelled operator never blocks on a slow consumer or a stalled producer.
//! Dropping a `RowStream` closes the channel; the producer's next `send`
//! then returns `false` and the producer task winds down.

use tokio::sync::mpsc;

use crate::context::Context;
use crate::value::Row;

/// Create a bounded channel. `capacity` is clamped to at least 1.
pub fn channel(capacity: usize) -> (RowSink, RowStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RowSink { tx }, RowStream { rx })
}

#[derive(Debug, Clone)]
pub struct RowSink {
    tx: mpsc::Sender<Row>,
}

impl RowSink {
    /// Send one row. Returns `false` if the consumer went away or `ctx` was
    /// cancelled; the producer should stop in either case.
    pub async fn send(&self, ctx: &Context, row: Row) -> bool {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => false,
            res = self.tx.send(row) => res.is_ok(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the consuming `RowStream` has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

#[derive(Debug)]
pub struct RowStream {
    rx: mpsc::Receiver<Row>,
}

impl RowStream {
    /// A stream that is already finished.
    pub fn empty() -> Self {
        let (_, stream) = channel(1);
        stream
    }

    /// Next row, or `None` once the producer finished or `ctx` is cancelled.
    pub async fn next(&mut self, ctx: &Context) -> Option<Row> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => None,
            row = self.rx.recv() => row,
        }
    }

    /// Drain to completion. Returns `None` if `ctx` was cancelled before the
    /// producer finished, so callers can refuse to act on a partial set.
    pub async fn drain(mut self, ctx: &Context) -> Option<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next(ctx).await {
            rows.push(row);
        }
        if ctx.is_cancelled() {
            None
        } else {
            Some(rows)
        }
    }

    /// Drain whatever arrives before completion or cancellation.
    pub async fn collect(mut self, ctx: &Context) -> Vec<Row> {
        let mut rows = Vec::new();
        while let Some(row) = self.next(ctx).await {
            rows.push(row);
        }
        rows
    }

    /// Forward every row into `sink`. Returns `false` if the downstream
    /// consumer went away (or `ctx` was cancelled) before this stream ended.
    pub async fn forward(mut self, ctx: &Context, sink: &RowSink) -> bool {
        while let Some(row) = self.next(ctx).await {
            if !sink.send(ctx, row).await {
                return false;
            }
        }
        !ctx.is_cancelled()
    }
}
