use std::io;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, error};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::cloud::error::UploadError;
use crate::cloud::progress::{ProgressReporter, ProgressState};
use crate::config::ProducerPolicy;
use crate::constants::PIPE_CAPACITY;

/// One item travelling through the pipe: a slice of the request body, or the
/// error that poisons it.
pub type PipeItem = io::Result<Bytes>;

/// Create the bounded pipe between the producer and the HTTP transport.
///
/// The sending half blocks once `PIPE_CAPACITY` chunks are queued, so the
/// producer never runs more than that far ahead of the transport.
pub fn pipe() -> (mpsc::Sender<PipeItem>, reqwest::Body) {
    let (tx, rx) = mpsc::channel::<PipeItem>(PIPE_CAPACITY);
    (tx, reqwest::Body::wrap_stream(ReceiverStream::new(rx)))
}

/// What the producer did, returned through its completion handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    /// Bytes written into the pipe, framing included
    pub bytes_sent: u64,
    /// File chunks written
    pub chunks: u64,
    /// Read error swallowed under `ProducerPolicy::BestEffort`
    pub tolerated: Option<String>,
    /// The transport dropped the body before the pump finished
    pub consumer_closed: bool,
}

enum PumpFailure {
    Read(UploadError),
    Closed,
    Overrun(u64),
}

/// Single producer that feeds a request body.
///
/// Writes the opening header, then the file in chunks of at most `chunk_size`
/// bytes, then the trailer. Exactly `header + file_size + trailer` bytes go
/// into the pipe on success. The reader is owned by the pump and dropped when
/// `run` returns, on every path.
pub struct StreamPump<R> {
    reader: R,
    file_size: u64,
    chunk_size: usize,
    header: Option<Bytes>,
    trailer: Option<Bytes>,
    policy: ProducerPolicy,
    reporter: Arc<dyn ProgressReporter>,
}

impl<R> StreamPump<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, file_size: u64, chunk_size: usize, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reader,
            file_size,
            chunk_size: chunk_size.max(1),
            header: None,
            trailer: None,
            policy: ProducerPolicy::default(),
            reporter,
        }
    }

    /// Surround the file payload with multipart framing.
    pub fn with_framing(mut self, header: Bytes, trailer: Bytes) -> Self {
        self.header = Some(header).filter(|b| !b.is_empty());
        self.trailer = Some(trailer).filter(|b| !b.is_empty());
        self
    }

    pub fn with_policy(mut self, policy: ProducerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Exact number of bytes this pump writes on success.
    pub fn total_len(&self) -> Result<u64, UploadError> {
        let framing = self.header.as_ref().map_or(0, |b| b.len() as u64)
            + self.trailer.as_ref().map_or(0, |b| b.len() as u64);
        framing
            .checked_add(self.file_size)
            .ok_or_else(|| UploadError::construction("body length overflows u64"))
    }

    /// Start the pump on the runtime and return the body it feeds together with
    /// its completion handle.
    pub fn spawn(self) -> (reqwest::Body, JoinHandle<Result<PumpReport, UploadError>>) {
        let (tx, body) = pipe();
        let handle = tokio::spawn(self.run(tx));
        (body, handle)
    }

    /// Drive the pump to completion, writing into `tx`.
    ///
    /// The sender is dropped on return, which ends the body for the consumer.
    pub async fn run(mut self, tx: mpsc::Sender<PipeItem>) -> Result<PumpReport, UploadError> {
        let total = self.total_len()?;
        let mut progress = ProgressState::new(total);
        let mut chunks = 0u64;

        self.reporter.report(0, total);

        match self.pump(&tx, &mut progress, &mut chunks).await {
            Ok(()) => {
                debug!("Producer finished: {} bytes in {} chunks", progress.sent(), chunks);
                Ok(PumpReport { bytes_sent: progress.sent(), chunks, tolerated: None, consumer_closed: false })
            }
            Err(PumpFailure::Read(err)) => match self.policy {
                ProducerPolicy::FailFast => {
                    error!("Producer failed, aborting request body: {}", err);
                    // The consumer may already be gone; the error is returned either way
                    let _ = tx
                        .send(Err(io::Error::new(io::ErrorKind::Other, err.to_string())))
                        .await;
                    Err(err)
                }
                ProducerPolicy::BestEffort => {
                    error!("Producer failed, closing request body early: {}", err);
                    Ok(PumpReport {
                        bytes_sent: progress.sent(),
                        chunks,
                        tolerated: Some(err.to_string()),
                        consumer_closed: false,
                    })
                }
            },
            // Not a producer failure: the transport reports its own error
            Err(PumpFailure::Closed) => {
                debug!("Request body closed by the transport after {} of {} bytes", progress.sent(), total);
                Ok(PumpReport { bytes_sent: progress.sent(), chunks, tolerated: None, consumer_closed: true })
            }
            Err(PumpFailure::Overrun(n)) => Err(UploadError::construction(format!(
                "producer wrote {} bytes past the declared length {}",
                n, total
            ))),
        }
    }

    async fn pump(
        &mut self,
        tx: &mpsc::Sender<PipeItem>,
        progress: &mut ProgressState,
        chunks: &mut u64,
    ) -> Result<(), PumpFailure> {
        let reporter = &*self.reporter;
        if let Some(header) = self.header.clone() {
            write(tx, progress, reporter, header).await?;
        }

        let mut file_sent = 0u64;
        let mut limited = (&mut self.reader).take(self.file_size);
        loop {
            let want = chunk_len(self.chunk_size, limited.limit());
            let chunk = read_chunk(&mut limited, want).await.map_err(|e| {
                PumpFailure::Read(UploadError::producer(
                    format!("failed to read file after {} bytes", file_sent),
                    Some(e),
                ))
            })?;
            if chunk.is_empty() {
                break;
            }

            let n = chunk.len() as u64;
            debug!("sending bytes '{}' to '{}'", file_sent, file_sent + n);
            file_sent += n;
            *chunks += 1;
            write(tx, progress, reporter, chunk).await?;
        }

        if file_sent < self.file_size {
            return Err(PumpFailure::Read(UploadError::producer(
                format!("file ended after {} of {} bytes", file_sent, self.file_size),
                None,
            )));
        }

        if let Some(trailer) = self.trailer.clone() {
            write(tx, progress, reporter, trailer).await?;
        }
        Ok(())
    }
}

async fn write(
    tx: &mpsc::Sender<PipeItem>,
    progress: &mut ProgressState,
    reporter: &dyn ProgressReporter,
    bytes: Bytes,
) -> Result<(), PumpFailure> {
    let n = bytes.len() as u64;
    let sent = progress.advance(n).ok_or(PumpFailure::Overrun(n))?;
    tx.send(Ok(bytes)).await.map_err(|_| PumpFailure::Closed)?;
    reporter.report(sent, progress.total());
    Ok(())
}

/// Size of the next read buffer: a full chunk, or whatever is left of the file.
fn chunk_len(chunk_size: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(chunk_size, |left| left.min(chunk_size))
}

/// Read until `chunk_size` bytes are buffered or the reader is exhausted.
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, chunk_size: usize) -> io::Result<Bytes> {
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}
