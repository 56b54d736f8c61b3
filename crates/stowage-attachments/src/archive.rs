//! Gzip-compressed tar bundles of attachment content
//!
//! Entries are appended one at a time from a reader, so a bundle never holds
//! more than one read buffer of content in memory.

use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::{write::GzEncoder, Compression};
use tar::Header;

use crate::model::Attachment;

/// Name, timestamp and recorded length of one file inside a bundle
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    name: String,
    mtime: u64,
    size: u64,
}

impl ArchiveEntry {
    pub fn new(attachment: &Attachment) -> Self {
        Self {
            name: entry_name(attachment),
            mtime: attachment.upload_time.timestamp().max(0) as u64,
            size: attachment.content_length,
        }
    }
}

/// Archive-safe base name: no directories, never empty
fn entry_name(attachment: &Attachment) -> String {
    Path::new(&attachment.filename)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != "..")
        .map(str::to_string)
        .unwrap_or_else(|| format!("attachment-{}", attachment.id))
}

/// `report.pdf` -> `report (2).pdf`
fn numbered(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

/// Reader that yields exactly `remaining` bytes or fails
struct Exact<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> Read for Exact<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "content shorter than its recorded length",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Streams a `.tar.gz` into `W`, renaming duplicate entry names
pub struct ArchiveWriter<W: Write> {
    builder: tar::Builder<GzEncoder<W>>,
    taken: HashSet<String>,
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            builder: tar::Builder::new(GzEncoder::new(out, Compression::default())),
            taken: HashSet::new(),
        }
    }

    /// Append one entry, reading exactly its recorded length from `data`
    pub fn append(&mut self, entry: &ArchiveEntry, data: impl Read) -> io::Result<()> {
        let mut name = entry.name.clone();
        let mut n = 2;
        while !self.taken.insert(name.clone()) {
            name = numbered(&entry.name, n);
            n += 1;
        }

        let mut header = Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o644);
        header.set_mtime(entry.mtime);
        header.set_size(entry.size);

        let mut data = Exact {
            inner: data,
            remaining: entry.size,
        };
        self.builder.append_data(&mut header, &name, &mut data)?;

        let mut rest = [0u8; 1];
        if data.inner.read(&mut rest)? != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{name} is longer than its recorded length"),
            ));
        }
        Ok(())
    }

    /// Write the tar trailer and gzip footer, returning the output
    pub fn finish(self) -> io::Result<W> {
        self.builder.into_inner()?.finish()
    }
}

#[cfg(test)]
pub(crate) fn entry_names(archive: &[u8]) -> io::Result<Vec<String>> {
    let decoder = flate2::read::GzDecoder::new(archive);
    let mut archive = tar::Archive::new(decoder);
    let mut names = Vec::new();
    for entry in archive.entries()? {
        names.push(entry?.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(id: &str, filename: &str, length: u64) -> Attachment {
        Attachment {
            id: id.to_string(),
            filename: filename.to_string(),
            content_length: length,
            ..Attachment::new()
        }
    }

    fn build(files: &[(&str, &str, &[u8])]) -> io::Result<Vec<u8>> {
        let mut writer = ArchiveWriter::new(Vec::new());
        for (id, filename, data) in files {
            let entry = ArchiveEntry::new(&attachment(id, filename, data.len() as u64));
            writer.append(&entry, *data)?;
        }
        writer.finish()
    }

    #[test]
    fn test_duplicate_names_are_numbered() {
        let archive = build(&[
            ("1", "report.pdf", b"one"),
            ("2", "report.pdf", b"two"),
            ("3", "report.pdf", b"three"),
            ("4", "README", b"four"),
            ("5", "README", b"five"),
        ])
        .unwrap();

        assert_eq!(
            entry_names(&archive).unwrap(),
            vec!["report.pdf", "report (2).pdf", "report (3).pdf", "README", "README (2)"]
        );
    }

    #[test]
    fn test_directory_components_are_dropped() {
        let archive = build(&[("1", "../../etc/passwd", b"x"), ("abc", "", b"y")]).unwrap();
        assert_eq!(entry_names(&archive).unwrap(), vec!["passwd", "attachment-abc"]);
    }

    #[test]
    fn test_entry_content() {
        let archive = build(&[("1", "a.txt", b"alpha")]).unwrap();

        let mut reader = tar::Archive::new(flate2::read::GzDecoder::new(archive.as_slice()));
        let mut entry = reader.entries().unwrap().next().unwrap().unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "alpha");
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let mut writer = ArchiveWriter::new(Vec::new());
        let short = writer.append(&ArchiveEntry::new(&attachment("1", "a", 10)), &b"abc"[..]);
        assert_eq!(short.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);

        let mut writer = ArchiveWriter::new(Vec::new());
        let long = writer.append(&ArchiveEntry::new(&attachment("1", "a", 2)), &b"abc"[..]);
        assert_eq!(long.unwrap_err().kind(), io::ErrorKind::InvalidData);
    }
}
