//! Copies a stream-mode job's output to the client and the cache at once.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::supervisor::{JobHandle, StreamOutcome, StreamOutput, SupervisorHandle};

/// Encoded audio as it is produced.
///
/// The stream ends once the encoder's output is exhausted and the job has
/// been committed. If the job fails instead, the last item is an error so
/// the response is aborted rather than ending cleanly. Dropping the stream
/// tells the supervisor that the client went away, which terminates the
/// job and discards its partial file.
pub struct TranscodeStream {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Stream for TranscodeStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Starts copying `output` on a background task and returns the client side.
pub(crate) fn tee(
    supervisor: SupervisorHandle,
    job_id: Uuid,
    mut job: JobHandle,
    mut output: StreamOutput,
    chunk_size: usize,
) -> TranscodeStream {
    // From here on the copy task reports a disconnect itself
    output.claim();

    // A small buffer keeps the encoder paced by the client
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        let outcome = pump(output, &tx, chunk_size.max(1)).await;
        let client_gone = outcome == StreamOutcome::ClientGone;
        supervisor.stream_finished(job_id, outcome).await;
        if client_gone {
            return;
        }

        // End of output is not success: the encoder may have died mid-way
        if let Err(e) = job.wait().await {
            debug!("Aborting stream of job {}: {}", job_id, e);
            let _ = tx.send(Err(io::Error::other(e))).await;
        }
    });
    TranscodeStream { rx }
}

async fn pump(
    mut output: StreamOutput,
    tx: &mpsc::Sender<io::Result<Bytes>>,
    chunk_size: usize,
) -> StreamOutcome {
    let mut buf = vec![0u8; chunk_size];

    loop {
        let read = tokio::select! {
            read = output.stdout.read(&mut buf) => read,
            _ = tx.closed() => return StreamOutcome::ClientGone,
        };

        let n = match read {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                return StreamOutcome::Failed(format!("failed to read encoder output: {}", e));
            }
        };

        let chunk = Bytes::copy_from_slice(&buf[..n]);
        if let Err(e) = output.sink.write_all(&chunk).await {
            return StreamOutcome::Failed(format!("failed to write partial file: {}", e));
        }
        if tx.send(Ok(chunk)).await.is_err() {
            return StreamOutcome::ClientGone;
        }
    }

    match output.sink.flush().await {
        Ok(()) => StreamOutcome::Complete,
        Err(e) => StreamOutcome::Failed(format!("failed to flush partial file: {}", e)),
    }
}
