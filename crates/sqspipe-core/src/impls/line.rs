//! Newline-delimited adapters over async byte streams (stdout / stdin).

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

use crate::ports::{Sink, Source};

const DELIMITER: char = '\n';

/// Writes each body followed by a newline.
///
/// Body and delimiter go out in a single `write_all` under the lock, so
/// concurrent workers never interleave partial records.
pub struct LineSink<W> {
    writer: Mutex<W>,
}

impl<W> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Sink for LineSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&self, body: &str) -> io::Result<()> {
        let mut record = String::with_capacity(body.len() + 1);
        record.push_str(body);
        record.push(DELIMITER);

        let mut writer = self.writer.lock().await;
        writer.write_all(record.as_bytes()).await?;
        writer.flush().await
    }
}

/// Yields one record per input line, without the trailing `\n` / `\r\n`.
pub struct LineSource<R> {
    lines: Mutex<Lines<BufReader<R>>>,
}

impl<R> LineSource<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(BufReader::new(reader).lines()),
        }
    }
}

#[async_trait]
impl<R> Source for LineSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next(&self) -> io::Result<Option<String>> {
        // `next_line` is cancel-safe, so a dispatcher dropping this future on
        // cancellation does not lose a partially read line.
        self.lines.lock().await.next_line().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn sink_appends_delimiter() {
        let sink = LineSink::new(Vec::new());
        sink.write("hello").await.unwrap();
        sink.write("").await.unwrap();
        sink.write("world").await.unwrap();

        assert_eq!(sink.into_inner(), b"hello\n\nworld\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_keep_records_whole() {
        let sink = Arc::new(LineSink::new(Vec::new()));
        let mut handles = Vec::new();
        for worker in 0..8 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let body = format!("worker-{worker}-record-{i}-{}", "x".repeat(64));
                    sink.write(&body).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let sink = Arc::into_inner(sink).unwrap();
        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            assert!(line.starts_with("worker-"));
            assert!(line.ends_with(&"x".repeat(64)));
        }
    }

    #[tokio::test]
    async fn source_strips_line_endings_and_signals_end() {
        let input: &[u8] = b"one\r\ntwo\nthree";
        let source = LineSource::new(input);

        assert_eq!(source.next().await.unwrap().as_deref(), Some("one"));
        assert_eq!(source.next().await.unwrap().as_deref(), Some("two"));
        assert_eq!(source.next().await.unwrap().as_deref(), Some("three"));
        assert_eq!(source.next().await.unwrap(), None);
    }
}
