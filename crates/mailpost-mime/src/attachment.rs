//! Attachment resolution: file name, MIME type and an open byte stream.

use crate::content_type::{ContentType, escape_quoted};
use crate::encoding::encode_base64_stream;
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Part, TransferEncoding};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Type used when the extension is unknown or missing.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Infers a MIME type from the path's extension using the `mime_guess` table.
///
/// Matching ignores case. Unknown or missing extensions yield
/// [`DEFAULT_MIME_TYPE`]. File contents are never inspected.
#[must_use]
pub fn mime_type_for_path(path: &Path) -> &'static str {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Returns the base name of a path, falling back to the full path text.
///
/// Control characters are replaced so the name is safe inside a header.
fn base_name(path: &Path) -> String {
    let name = path.file_name().map_or_else(
        || path.to_string_lossy().into_owned(),
        |name| name.to_string_lossy().into_owned(),
    );
    name.chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect()
}

/// An attachment with an open handle on its file.
///
/// The handle is released when the value is dropped, which happens as soon as
/// [`Attachment::into_part`] returns, successfully or not.
#[derive(Debug)]
pub struct Attachment {
    path: PathBuf,
    file_name: String,
    mime_type: &'static str,
    reader: BufReader<File>,
}

impl Attachment {
    /// Returns the path the attachment was resolved from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file's base name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the inferred MIME type.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Returns the byte stream for the file.
    pub fn reader(&mut self) -> &mut impl Read {
        &mut self.reader
    }

    /// Builds the attachment part, streaming the file through the Base64 encoder.
    ///
    /// Consumes the attachment, so the file handle is closed on return.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentEncoding`] if the file cannot be read to the end.
    pub fn into_part(mut self) -> Result<Part> {
        let escaped = escape_quoted(&self.file_name);
        let content_type = ContentType::parse(self.mime_type)?;

        let mut headers = Headers::new();
        headers.add(
            "Content-Disposition",
            format!("attachment; filename=\"{escaped}\""),
        );
        headers.add(
            "Content-Type",
            format!("{}; name=\"{escaped}\"", content_type.essence()),
        );
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::Base64.to_string(),
        );

        let mut body = Vec::new();
        let bytes = encode_base64_stream(&mut self.reader, &mut body).map_err(|source| {
            Error::AttachmentEncoding {
                path: self.path.clone(),
                source,
            }
        })?;

        tracing::debug!(
            file = %self.file_name,
            mime = self.mime_type,
            bytes,
            "Encoded attachment"
        );

        Ok(Part::new(headers, body))
    }
}

/// Resolves a file path into an [`Attachment`] with an open reader.
///
/// # Errors
///
/// Returns [`Error::AttachmentNotFound`] if the path cannot be opened for reading.
pub fn resolve(path: impl AsRef<Path>) -> Result<Attachment> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::AttachmentNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Attachment {
        path: path.to_path_buf(),
        file_name: base_name(path),
        mime_type: mime_type_for_path(path),
        reader: BufReader::new(file),
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::encoding::decode_base64;
    use std::io::Write;

    #[test]
    fn test_known_extensions() {
        assert_eq!(mime_type_for_path(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type_for_path(Path::new("/tmp/report.PDF")), "application/pdf");
        assert_eq!(mime_type_for_path(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for_path(Path::new("data.csv")), "text/csv");
        assert_eq!(mime_type_for_path(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(mime_type_for_path(Path::new("scan.tiff")), "image/tiff");
        assert_eq!(mime_type_for_path(Path::new("book.epub")), "application/epub+zip");
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(mime_type_for_path(Path::new("archive.nosuchext")), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_for_path(Path::new("Makefile")), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_for_path(Path::new(".bashrc")), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_resolve_missing_file() {
        let err = resolve("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, Error::AttachmentNotFound { .. }));
        assert!(err.is_attachment_error());
    }

    #[test]
    fn test_resolve_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello attachment").unwrap();

        let mut attachment = resolve(&path).unwrap();
        assert_eq!(attachment.file_name(), "hello.txt");
        assert_eq!(attachment.mime_type(), "text/plain");
        assert_eq!(attachment.path(), path.as_path());

        let mut content = Vec::new();
        attachment.reader().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"hello attachment");
    }

    #[test]
    fn test_into_part_headers_and_body() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let data: Vec<u8> = (0..=255).collect();
        file.write_all(&data).unwrap();

        let part = resolve(file.path()).unwrap().into_part().unwrap();
        let name = file.path().file_name().unwrap().to_string_lossy().into_owned();

        let names: Vec<&str> = part.headers.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["Content-Disposition", "Content-Type", "Content-Transfer-Encoding"]
        );
        assert_eq!(
            part.headers.get("Content-Type"),
            Some(format!("image/png; name=\"{name}\"").as_str())
        );
        assert_eq!(part.filename().as_deref(), Some(name.as_str()));
        assert_eq!(
            decode_base64(&String::from_utf8(part.body.clone()).unwrap()).unwrap(),
            data
        );
    }
}
