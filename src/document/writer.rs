//! Writing resolved files.
//!
//! Each file is written as its original text with the rewritten scalars
//! spliced in; see [`SourceFile::render`].

use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{FileDesignator, SourceFile};
use crate::constants::FLATTEN_SEPARATOR;
use crate::core::BuildrefError;
use crate::utils::{absolute_path, ensure_parent_dir, flatten_path, normalize_path, relative_path};

/// File name used for standard input when writing to an output directory.
const STDIN_OUTPUT_NAME: &str = "stdin.yaml";

/// Where resolved documents go.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    /// Output directory; `None` writes everything to the shared stream.
    pub output_dir: Option<PathBuf>,
    /// Join relative path components with `-` instead of mirroring directories.
    pub flatten: bool,
    /// Directory input paths are made relative to.
    pub base_dir: PathBuf,
}

impl OutputOptions {
    /// Output path for `designator`, or `None` when writing to the stream.
    pub fn destination(&self, designator: &FileDesignator) -> Result<Option<PathBuf>> {
        let Some(output_dir) = &self.output_dir else {
            return Ok(None);
        };

        let rel = match designator {
            FileDesignator::Stdin => PathBuf::from(STDIN_OUTPUT_NAME),
            FileDesignator::Path(path) => {
                relative_path(&absolute_path(&self.base_dir)?, &absolute_path(path)?)
            }
        };

        let target = if self.flatten {
            output_dir.join(flatten_path(&rel, FLATTEN_SEPARATOR))
        } else {
            normalize_path(&output_dir.join(rel))
        };
        Ok(Some(target))
    }
}

/// First line that is not blank or a comment.
fn first_content_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim_start).find(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Joins files into one multi-document stream.
#[derive(Default)]
struct StreamJoiner {
    /// A document has been written.
    open: bool,
    /// The last text written did not end with a newline.
    unterminated: bool,
}

impl StreamJoiner {
    fn push(&mut self, file: &SourceFile, out: &mut String) {
        let text = file.render();
        if text.is_empty() {
            return;
        }
        if self.unterminated {
            out.push('\n');
        }

        if self.open && !file.documents.is_empty() {
            match first_content_line(&text) {
                Some(line) if line.starts_with("---") => {}
                // Directives may only follow an explicit document end.
                Some(line) if line.starts_with('%') => out.push_str("...\n"),
                _ => out.push_str("---\n"),
            }
        }

        out.push_str(&text);
        self.unterminated = !text.ends_with('\n');
        self.open |= !file.documents.is_empty();
    }
}

fn output_error(path: &Path, e: impl std::fmt::Display) -> BuildrefError {
    BuildrefError::OutputError {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

/// Writes every file to its destination.
///
/// Without an output directory all files are written to `stream` as one
/// multi-document YAML stream, a `---` marker between the documents of
/// consecutive files. With one, each input file gets its own output file.
/// A failure stops the remaining writes; files already written stay.
pub fn write_documents(
    files: &[SourceFile],
    options: &OutputOptions,
    stream: &mut dyn Write,
) -> Result<()> {
    let mut joiner = StreamJoiner::default();

    for file in files {
        match options.destination(&file.designator)? {
            None => {
                let mut buf = String::new();
                joiner.push(file, &mut buf);
                stream.write_all(buf.as_bytes())?;
            }
            Some(path) => {
                ensure_parent_dir(&path).map_err(|e| output_error(&path, format!("{e:#}")))?;
                std::fs::write(&path, file.render()).map_err(|e| output_error(&path, e))?;
                tracing::debug!("Wrote {} to {}", file.designator, path.display());
            }
        }
    }
    stream.flush()?;
    Ok(())
}
