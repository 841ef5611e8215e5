//! Asynchronous document sinks
//!
//! A sink accepts converted documents without blocking and acknowledges
//! each write through a [`WriteHandle`]. The CLI ships a JSON-lines sink
//! backed by a dedicated writer thread; anything speaking the same
//! `write_async`/`resolve` protocol can stand in for it.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use crate::document::Document;

/// Outcome of one write: the number of documents persisted, or a failure
/// message. A plain string keeps the result `Send` across the ack channel.
pub type WriteResult = Result<u64, String>;

/// Eventually-resolving reference to the outcome of one submitted write.
///
/// Exactly one owner resolves a handle; ownership moves from the
/// submitting worker into the in-flight buffer and out to whichever worker
/// drains it.
#[derive(Debug)]
pub struct WriteHandle {
    rx: Receiver<WriteResult>,
}

impl WriteHandle {
    pub fn new(rx: Receiver<WriteResult>) -> Self {
        Self { rx }
    }

    /// A handle that is already resolved; useful for sinks that complete
    /// writes synchronously.
    pub fn immediate(result: WriteResult) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(result);
        Self { rx }
    }

    /// Blocks until the write acknowledges, up to `timeout`. A timeout is
    /// reported as an error rather than waiting forever on a stuck sink.
    pub fn resolve(self, timeout: Duration) -> Result<u64> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(count)) => Ok(count),
            Ok(Err(message)) => Err(anyhow!("write failed: {message}")),
            Err(RecvTimeoutError::Timeout) => Err(anyhow!(
                "write was not acknowledged within {}s",
                timeout.as_secs()
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("sink dropped the write without acknowledging it"))
            }
        }
    }
}

/// Boundary to the destination document store.
pub trait DocumentSink: Send + Sync {
    /// Submits a document without blocking and returns its pending
    /// acknowledgment.
    fn write_async(&self, document: Document) -> WriteHandle;

    /// How many load threads this sink can usefully keep busy.
    fn concurrency_hint(&self) -> usize {
        num_cpus::get()
    }
}

/// Opens the sink selected by a destination URL: `-` or `stdout` for JSON
/// lines on stdout, `file://<path>` or a bare path for a JSON lines file.
pub fn open_sink(url: &str) -> Result<Arc<dyn DocumentSink>> {
    if url == "-" || url == "stdout" {
        return Ok(Arc::new(JsonlSink::stdout()));
    }
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(Arc::new(JsonlSink::file(Path::new(path))?));
    }
    if url.contains("://") {
        bail!("unsupported sink URL '{url}': expected '-', 'stdout', or file://<path>");
    }
    Ok(Arc::new(JsonlSink::file(Path::new(url))?))
}

enum WriterMsg {
    Write {
        document: Document,
        ack: Sender<WriteResult>,
    },
}

/// JSON-lines sink: one serialized document per line, written and flushed
/// by a background thread so that an acknowledgment means the bytes
/// reached the destination.
pub struct JsonlSink {
    tx: Sender<WriterMsg>,
}

impl JsonlSink {
    pub fn stdout() -> Self {
        Self::spawn(Box::new(io::stdout()))
    }

    pub fn file(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create '{}'", path.display()))?;
        Ok(Self::spawn(Box::new(file)))
    }

    fn spawn(out: Box<dyn Write + Send>) -> Self {
        let (tx, rx) = unbounded();
        thread::spawn(move || writer_loop(rx, out));
        Self { tx }
    }
}

impl DocumentSink for JsonlSink {
    fn write_async(&self, document: Document) -> WriteHandle {
        let (ack_tx, ack_rx) = bounded(1);
        // A failed send means the writer thread is gone; the dropped ack
        // sender then resolves the handle as a disconnected write.
        let _ = self.tx.send(WriterMsg::Write {
            document,
            ack: ack_tx,
        });
        WriteHandle::new(ack_rx)
    }
}

fn writer_loop(rx: Receiver<WriterMsg>, out: Box<dyn Write + Send>) {
    let mut writer = BufWriter::new(out);
    for msg in rx.iter() {
        let WriterMsg::Write { document, ack } = msg;
        let result = write_document(&mut writer, &document)
            .map(|_| 1)
            .map_err(|e| format!("{e:#}"));
        let _ = ack.send(result);
    }
    let _ = writer.flush();
}

fn write_document<W: Write>(writer: &mut W, document: &Document) -> Result<()> {
    serde_json::to_writer(&mut *writer, document).context("failed to serialize document")?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocValue;
    use std::fs;

    const ACK_TIMEOUT: Duration = Duration::from_secs(5);

    fn sample_doc(marker: &str) -> Document {
        let mut doc = Document::new();
        doc.set("marker", DocValue::scalar(marker));
        doc
    }

    #[test]
    fn test_jsonl_sink_writes_one_line_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let sink = JsonlSink::file(&path).unwrap();
        let first = sink.write_async(sample_doc("first"));
        let second = sink.write_async(sample_doc("second"));

        assert_eq!(first.resolve(ACK_TIMEOUT).unwrap(), 1);
        assert_eq!(second.resolve(ACK_TIMEOUT).unwrap(), 1);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec![r#"{"marker":"first"}"#, r#"{"marker":"second"}"#]);
    }

    #[test]
    fn test_ack_only_after_bytes_are_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let sink = JsonlSink::file(&path).unwrap();
        sink.write_async(sample_doc("durable"))
            .resolve(ACK_TIMEOUT)
            .unwrap();

        // The sink is still open, but the acknowledged write must already
        // be visible on disk.
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"marker\":\"durable\"}\n");
    }

    #[test]
    fn test_immediate_handle_resolves_without_waiting() {
        let handle = WriteHandle::immediate(Ok(3));
        assert_eq!(handle.resolve(Duration::from_millis(1)).unwrap(), 3);

        let failed = WriteHandle::immediate(Err("boom".to_string()));
        let err = failed.resolve(Duration::from_millis(1)).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_resolve_times_out_instead_of_hanging() {
        let (_tx, rx) = bounded::<WriteResult>(1);
        let handle = WriteHandle::new(rx);
        let err = handle.resolve(Duration::from_millis(50)).unwrap_err();
        assert!(err.to_string().contains("not acknowledged"));
    }

    #[test]
    fn test_open_sink_urls() {
        assert!(open_sink("-").is_ok());
        assert!(open_sink("stdout").is_ok());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");
        let url = format!("file://{}", path.display());
        assert!(open_sink(&url).is_ok());

        let err = open_sink("mongodb://localhost:27017/db.test").err().unwrap();
        assert!(err.to_string().contains("unsupported sink URL"));
    }
}
