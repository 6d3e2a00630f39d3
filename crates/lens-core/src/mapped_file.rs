use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use memchr::memchr_iter;
use memmap2::Mmap;

/// A memory-mapped input file (raw bytecode or a hex corpus).
pub struct MappedFile {
    mmap: Mmap,
    len: u64,
}

impl MappedFile {
    /// Open and memory-map a file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let len = file.metadata()
            .with_context(|| format!("failed to read metadata for {}", path.display()))?
            .len();

        // SAFETY: The file must not be modified externally while mapped.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to mmap {}", path.display()))?;

        Ok(Self { mmap, len })
    }

    /// Total file size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// The whole file as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.mmap).ok()
    }

    /// The file as a hex corpus, or `None` if it should be read as raw bytecode.
    pub fn hex_corpus(&self) -> Option<&str> {
        self.text().filter(|text| looks_like_hex(text))
    }
}

/// True if the first content line of `text` is hex digits (with optional `0x`).
pub fn looks_like_hex(text: &str) -> bool {
    match hex_lines(text).next() {
        Some((_, line)) => {
            let digits = line
                .strip_prefix("0x")
                .or_else(|| line.strip_prefix("0X"))
                .unwrap_or(line);
            digits.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// Content lines of a hex corpus as `(line_number, trimmed_line)`.
///
/// Line numbers start at 1. Blank lines and lines starting with `#` are skipped.
pub fn hex_lines(text: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    let bytes = text.as_bytes();
    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));

    let mut start = 0;
    ends.enumerate()
        .map(move |(i, end)| {
            // `\n` is ASCII, so both offsets are char boundaries.
            let line = &text[start..end];
            start = (end + 1).min(text.len());
            (i + 1, line.trim())
        })
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}
