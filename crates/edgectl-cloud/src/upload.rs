//! Producer side of a streamed function upload.
//!
//! The multipart body is written on a blocking thread into a bounded channel
//! and the HTTP client reads the other end as a request body stream. When the
//! producer fails, it cancels the upload's [`CancelToken`] with its error as
//! the cause before aborting the stream, so the request side can report the
//! producer's error rather than a transport failure.

use std::fs::File;
use std::io::{self, Write};
use std::mem;
use std::path::{Path, PathBuf};

use edgectl_core::graph::walk_import_paths;
use edgectl_core::{CancelToken, Function, ImportMap, ProjectLayout, expand_static_files};
use futures::Stream;
use tokio::sync::mpsc;

use crate::api::UploadPayload;
use crate::multipart::MultipartWriter;

/// Chunks buffered before handing off to the HTTP client.
const CHUNK_SIZE: usize = 32 * 1024;
/// Chunks in flight between producer and request body.
const PIPE_DEPTH: usize = 8;

type Chunk = io::Result<Vec<u8>>;

#[derive(Debug, thiserror::Error)]
pub enum ProduceError {
    #[error(transparent)]
    Project(#[from] edgectl_core::Error),

    #[error("failed to stream {path}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write upload body")]
    Write { source: io::Error },
}

/// Writer half of the upload pipe.
pub struct ChannelWriter {
    tx: mpsc::Sender<Chunk>,
    buf: Vec<u8>,
}

impl ChannelWriter {
    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, format!("upload stream: {e}")))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

/// Both ends of an upload pipe.
pub struct Pipe {
    writer: MultipartWriter<ChannelWriter>,
    body: reqwest::Body,
    /// Sender kept to abort the body after a producer error.
    abort: mpsc::Sender<Chunk>,
}

impl Pipe {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(PIPE_DEPTH);
        let writer = MultipartWriter::new(ChannelWriter {
            tx: tx.clone(),
            buf: Vec::with_capacity(CHUNK_SIZE),
        });
        Self {
            writer,
            body: reqwest::Body::wrap_stream(receiver_stream(rx)),
            abort: tx,
        }
    }

    pub fn content_type(&self) -> String {
        self.writer.content_type()
    }

    /// Split into the request body and a producer started for `payload`.
    pub fn start(
        self,
        metadata: String,
        payload: UploadPayload,
        slug: String,
        ctx: CancelToken,
    ) -> reqwest::Body {
        spawn_producer(self.writer, self.abort, metadata, payload, slug, ctx);
        self.body
    }
}

impl Default for Pipe {
    fn default() -> Self {
        Self::new()
    }
}

fn receiver_stream(rx: mpsc::Receiver<Chunk>) -> impl Stream<Item = Chunk> + Send + 'static {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    })
}

/// Start producing the body on a blocking thread.
///
/// On failure the error becomes the cause of `ctx` and the body stream ends
/// with an error. If the request side is already gone, the failure is only
/// logged: the request's own error is the one worth reporting.
fn spawn_producer(
    writer: MultipartWriter<ChannelWriter>,
    abort: mpsc::Sender<Chunk>,
    metadata: String,
    payload: UploadPayload,
    slug: String,
    ctx: CancelToken,
) {
    tokio::task::spawn_blocking(move || {
        let Err(e) = produce(writer, &metadata, payload, &slug) else {
            tracing::debug!(function = %slug, "upload body complete");
            return;
        };
        if abort.is_closed() {
            tracing::debug!(function = %slug, "upload stream closed early: {e}");
            return;
        }
        let message = e.to_string();
        ctx.cancel_with_cause(e);
        if let Err(send) = abort.blocking_send(Err(io::Error::other(message))) {
            tracing::debug!(function = %slug, "upload stream closed before abort: {send}");
        }
    });
}

fn produce(
    mut mp: MultipartWriter<ChannelWriter>,
    metadata: &str,
    payload: UploadPayload,
    slug: &str,
) -> Result<(), ProduceError> {
    mp.write_field("metadata", metadata)
        .map_err(|e| ProduceError::Write { source: e })?;

    match payload {
        UploadPayload::Bundle {
            path,
            layout,
            static_files,
        } => {
            write_file_part(&mut mp, &path, &format!("{slug}.eszip"))?;
            write_static_files(&mut mp, &layout, &static_files)?;
        }
        UploadPayload::Sources { layout, function } => {
            write_sources(&mut mp, &layout, &function)?;
        }
    }

    let mut writer = mp.finish().map_err(|e| ProduceError::Write { source: e })?;
    writer
        .flush()
        .map_err(|e| ProduceError::Write { source: e })
}

fn write_sources(
    mp: &mut MultipartWriter<ChannelWriter>,
    layout: &ProjectLayout,
    function: &Function,
) -> Result<(), ProduceError> {
    let import_map = match &function.import_map {
        Some(path) => {
            write_file_part(mp, path, &layout.display_path(path))?;
            ImportMap::load(path)?
        }
        None => ImportMap::default(),
    };

    write_static_files(mp, layout, &function.static_files)?;

    let files = walk_import_paths(&function.entrypoint, &import_map, |path, source| {
        // Open first so a missing import never leaves a half-written part
        let mut file = File::open(path)?;
        mp.start_file("file", &layout.display_path(path))?;
        io::copy(
            &mut file,
            &mut Tee {
                primary: &mut *mp,
                secondary: source,
            },
        )?;
        mp.end_part()
    })?;
    tracing::debug!(files = files.len(), "streamed sources");
    Ok(())
}

fn write_static_files(
    mp: &mut MultipartWriter<ChannelWriter>,
    layout: &ProjectLayout,
    patterns: &[String],
) -> Result<(), ProduceError> {
    for file in expand_static_files(patterns)? {
        write_file_part(mp, &file, &layout.display_path(&file))?;
    }
    Ok(())
}

fn write_file_part(
    mp: &mut MultipartWriter<ChannelWriter>,
    path: &Path,
    filename: &str,
) -> Result<(), ProduceError> {
    let read_error = |e| ProduceError::Read {
        path: path.to_path_buf(),
        source: e,
    };
    let mut file = File::open(path).map_err(read_error)?;
    mp.start_file("file", filename)
        .map_err(|e| ProduceError::Write { source: e })?;
    io::copy(&mut file, mp).map_err(read_error)?;
    mp.end_part().map_err(|e| ProduceError::Write { source: e })
}

/// Copies everything written to `primary` into `secondary` as well.
struct Tee<'a> {
    primary: &'a mut dyn Write,
    secondary: &'a mut dyn Write,
}

impl Write for Tee<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.primary.write(buf)?;
        self.secondary.write_all(&buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        self.secondary.flush()
    }
}
