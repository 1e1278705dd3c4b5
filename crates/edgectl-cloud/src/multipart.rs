//! Streaming `multipart/form-data` encoder.
//!
//! Parts are written straight to the underlying writer; nothing is buffered
//! beyond what the writer itself buffers.

use std::io::{self, Write};

use rand::Rng;
use rand::distr::Alphanumeric;

const BOUNDARY_LEN: usize = 30;

pub struct MultipartWriter<W: Write> {
    inner: W,
    boundary: String,
}

impl<W: Write> MultipartWriter<W> {
    pub fn new(inner: W) -> Self {
        let boundary = rand::rng()
            .sample_iter(Alphanumeric)
            .take(BOUNDARY_LEN)
            .map(char::from)
            .collect();
        Self::with_boundary(inner, boundary)
    }

    pub fn with_boundary(inner: W, boundary: String) -> Self {
        Self { inner, boundary }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn write_field(&mut self, name: &str, value: &str) -> io::Result<()> {
        write!(
            self.inner,
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
            self.boundary,
            escape_quotes(name)
        )?;
        self.inner.write_all(value.as_bytes())?;
        self.end_part()
    }

    /// Open a file part. Its content is written through this writer's
    /// [`Write`] impl and closed with [`MultipartWriter::end_part`].
    pub fn start_file(&mut self, name: &str, filename: &str) -> io::Result<()> {
        write!(
            self.inner,
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            self.boundary,
            escape_quotes(name),
            escape_quotes(filename)
        )
    }

    pub fn end_part(&mut self) -> io::Result<()> {
        self.inner.write_all(b"\r\n")
    }

    /// Write the closing boundary and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        write!(self.inner, "--{}--\r\n", self.boundary)?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for MultipartWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_fields_and_files() {
        let mut mp = MultipartWriter::with_boundary(Vec::new(), "XYZ".to_owned());
        mp.write_field("metadata", r#"{"name":"hello"}"#).unwrap();
        mp.start_file("file", "supabase/functions/hello/index.ts")
            .unwrap();
        mp.write_all(b"export {}").unwrap();
        mp.end_part().unwrap();
        let body = String::from_utf8(mp.finish().unwrap()).unwrap();

        assert_eq!(
            body,
            "--XYZ\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{\"name\":\"hello\"}\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"supabase/functions/hello/index.ts\"\r\nContent-Type: application/octet-stream\r\n\r\nexport {}\r\n\
             --XYZ--\r\n"
        );
    }

    #[test]
    fn random_boundary_is_used_in_content_type() {
        let mp = MultipartWriter::new(Vec::new());
        let content_type = mp.content_type();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap();
        assert_eq!(boundary.len(), BOUNDARY_LEN);
        assert!(boundary.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn filenames_with_quotes_are_escaped() {
        let mut mp = MultipartWriter::with_boundary(Vec::new(), "B".to_owned());
        mp.start_file("file", "a\"b.ts").unwrap();
        let body = String::from_utf8(mp.finish().unwrap()).unwrap();
        assert!(body.contains(r#"filename="a\"b.ts""#));
    }
}
