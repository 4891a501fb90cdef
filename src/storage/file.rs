// Append-only JSON-lines result sink
// One record per line; the file is replayed on open to rebuild the index.

use super::*;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct FileSink {
    log: Mutex<LineLog<File>>,
    index: CheckIndex,
}

/// Appends newline-terminated records and keeps the log line-aligned.
///
/// A write that fails or is cancelled part way leaves a fragment with no
/// terminator. The next record then starts with a newline so the fragment
/// stays on its own (unparseable) line.
struct LineLog<W> {
    writer: W,
    needs_newline: bool,
}

impl<W: AsyncWrite + Unpin> LineLog<W> {
    fn new(writer: W, needs_newline: bool) -> Self {
        Self {
            writer,
            needs_newline,
        }
    }

    /// `line` must already end with `\n`.
    async fn append_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        if self.needs_newline {
            self.writer.write_all(b"\n").await?;
        }

        // Cleared only once the whole line is down.
        self.needs_newline = true;
        self.writer.write_all(line).await?;
        self.writer.flush().await?;
        self.needs_newline = false;
        Ok(())
    }
}

impl FileSink {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let index = CheckIndex::new();
        let mut replayed = 0usize;
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CheckRecord>(line) {
                Ok(record) => {
                    index.resume_after(record.id);
                    index.record(record);
                    replayed += 1;
                }
                Err(e) => warn!(
                    "Skipping malformed line {} in {}: {}",
                    line_no + 1,
                    path.display(),
                    e
                ),
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        // A torn final line from an earlier crash must not swallow the next record.
        let torn_tail = !contents.is_empty() && !contents.ends_with('\n');

        info!(
            "Opened result file {} ({} records, {} targets)",
            path.display(),
            replayed,
            index.latest.len()
        );

        Ok(Self {
            log: Mutex::new(LineLog::new(file, torn_tail)),
            index,
        })
    }
}

#[async_trait]
impl ResultSink for FileSink {
    async fn list_known_targets(&self) -> Result<Vec<Target>, StorageError> {
        Ok(self.index.known_targets())
    }

    async fn append(&self, outcome: &CheckOutcome) -> Result<CheckRecord, StorageError> {
        let mut log = self.log.lock().await;
        let record = CheckRecord::from_outcome(self.index.allocate_id(), outcome);

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        log.append_line(&line).await?;

        self.index.record(record.clone());
        Ok(record)
    }

    async fn latest_per_target(&self) -> Result<Vec<CheckRecord>, StorageError> {
        Ok(self.index.latest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    /// In-memory writer that can be told to accept a few bytes and then fail once.
    #[derive(Default)]
    struct FlakyWriter {
        written: Vec<u8>,
        fail_after: Option<usize>,
    }

    impl AsyncWrite for FlakyWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let accepted = match self.fail_after {
                Some(0) => {
                    self.fail_after = None;
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::Other,
                        "no space left on device",
                    )));
                }
                Some(budget) => {
                    let accepted = budget.min(buf.len());
                    self.fail_after = Some(budget - accepted);
                    accepted
                }
                None => buf.len(),
            };
            self.written.extend_from_slice(&buf[..accepted]);
            Poll::Ready(Ok(accepted))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_does_not_merge_with_next_record() {
        let mut log = LineLog::new(FlakyWriter::default(), false);
        log.append_line(b"{\"id\":1}\n").await.unwrap();

        log.writer.fail_after = Some(5);
        assert!(log.append_line(b"{\"id\":2}\n").await.is_err());

        log.append_line(b"{\"id\":3}\n").await.unwrap();

        let text = String::from_utf8(log.writer.written.clone()).unwrap();
        assert_eq!(text, "{\"id\":1}\n{\"id\"\n{\"id\":3}\n");

        let ids: Vec<u64> = text
            .lines()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter_map(|value| value["id"].as_u64())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_failed_newline_is_retried() {
        let mut log = LineLog::new(FlakyWriter::default(), true);

        log.writer.fail_after = Some(0);
        assert!(log.append_line(b"{\"id\":1}\n").await.is_err());
        assert!(log.writer.written.is_empty());

        log.append_line(b"{\"id\":2}\n").await.unwrap();
        assert_eq!(log.writer.written, b"\n{\"id\":2}\n");
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("checks.jsonl");

        {
            let sink = FileSink::open(&path).await.unwrap();
            sink.append(&CheckOutcome::reachable(Target::new("http://a.test"), 200, 5))
                .await
                .unwrap();
            sink.append(&CheckOutcome::reachable(Target::new("http://b.test"), 404, 7))
                .await
                .unwrap();
            sink.append(&CheckOutcome::unreachable(
                Target::new("http://a.test"),
                10_000,
                "timed out".into(),
            ))
            .await
            .unwrap();
        }

        let sink = FileSink::open(&path).await.unwrap();
        assert_eq!(
            sink.list_known_targets().await.unwrap(),
            vec![Target::new("http://a.test"), Target::new("http://b.test")]
        );

        let latest = sink.latest_per_target().await.unwrap();
        let a = latest.iter().find(|r| r.target.as_str() == "http://a.test").unwrap();
        assert_eq!(a.status_code, 0);
        assert_eq!(a.id, 3);

        let next = sink
            .append(&CheckOutcome::reachable(Target::new("http://c.test"), 200, 1))
            .await
            .unwrap();
        assert_eq!(next.id, 4);
    }

    #[tokio::test]
    async fn test_malformed_and_torn_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checks.jsonl");
        let good = serde_json::json!({
            "id": 5,
            "url": "http://a.test",
            "status_code": 200,
            "latency": 3,
            "created_at": "2024-01-01T00:00:00Z"
        });
        let contents = format!("{}\nnot json\n{{\"id\": 6, \"url\"", good);
        std::fs::write(&path, contents).unwrap();

        let sink = FileSink::open(&path).await.unwrap();
        assert_eq!(sink.latest_per_target().await.unwrap().len(), 1);

        let record = sink
            .append(&CheckOutcome::reachable(Target::new("http://b.test"), 200, 2))
            .await
            .unwrap();
        assert_eq!(record.id, 6);

        drop(sink);
        let reopened = FileSink::open(&path).await.unwrap();
        assert_eq!(reopened.latest_per_target().await.unwrap().len(), 2);
    }
}
