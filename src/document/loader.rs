//! Input enumeration and decoding.
//!
//! [`enumerate_files`] expands the `-f` inputs into a flat, de-duplicated list
//! of files; [`load_files`] reads and decodes each one into its documents.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::SourceFile;
use crate::constants::{DOCUMENT_EXTENSIONS, STDIN_DESIGNATOR};
use crate::core::BuildrefError;
use crate::utils::absolute_path;

/// A file to process: a path or standard input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileDesignator {
    Stdin,
    Path(PathBuf),
}

impl FileDesignator {
    /// Parses a `-f` argument; `-` designates standard input.
    pub fn parse(input: &str) -> Self {
        if input == STDIN_DESIGNATOR {
            Self::Stdin
        } else {
            Self::Path(PathBuf::from(input))
        }
    }
}

impl fmt::Display for FileDesignator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str(STDIN_DESIGNATOR),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext))
}

/// Expands inputs into the files to process.
///
/// Explicit files are kept whatever their extension. Directories contribute
/// their `.yaml` / `.json` files: only immediate children unless `recursive`
/// is set, in which case the whole subtree is walked in file name order. A
/// file reached through several inputs is listed once, at its first position.
/// Repeated `-` inputs are also listed once: standard input can only be read
/// to its end a single time, so later reads would see an empty file.
///
/// # Errors
///
/// Any walk failure, including a missing input path, is an
/// [`BuildrefError::EnumerationFailed`] error.
pub fn enumerate_files(inputs: &[String], recursive: bool) -> Result<Vec<FileDesignator>> {
    let mut files = Vec::new();
    let mut seen: HashSet<FileDesignator> = HashSet::new();

    let mut push = |designator: FileDesignator, files: &mut Vec<FileDesignator>| -> Result<()> {
        let key = match &designator {
            FileDesignator::Stdin => FileDesignator::Stdin,
            FileDesignator::Path(p) => FileDesignator::Path(absolute_path(p)?),
        };
        if seen.insert(key) {
            files.push(designator);
        }
        Ok(())
    };

    for input in inputs {
        let designator = FileDesignator::parse(input);
        let FileDesignator::Path(root) = &designator else {
            push(designator, &mut files)?;
            continue;
        };

        let max_depth = if recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(root).max_depth(max_depth).sort_by_file_name() {
            let entry = entry.map_err(|e| BuildrefError::EnumerationFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;
            if entry.file_type().is_dir() {
                if entry.depth() > 0 {
                    tracing::trace!("Descending into {}", entry.path().display());
                }
                continue;
            }
            // Files found inside a directory must look like documents.
            if entry.depth() > 0 && !has_document_extension(entry.path()) {
                continue;
            }
            push(FileDesignator::Path(entry.into_path()), &mut files)?;
        }
    }

    tracing::debug!("Enumerated {} input file(s)", files.len());
    Ok(files)
}

/// Decodes the documents in `bytes`. Blank and comment-only input has none.
pub fn decode_file(designator: FileDesignator, bytes: Vec<u8>) -> Result<SourceFile> {
    let text = String::from_utf8(bytes).map_err(|e| BuildrefError::ParseError {
        file: designator.to_string(),
        reason: e.to_string(),
    })?;
    SourceFile::parse(designator, text)
}

/// Reads one file (or all of stdin) and decodes its documents.
pub fn load_file(designator: FileDesignator) -> Result<SourceFile> {
    let bytes = match &designator {
        FileDesignator::Stdin => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("Failed to read standard input")?;
            buf
        }
        FileDesignator::Path(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
    };

    let file = decode_file(designator, bytes)?;
    tracing::debug!("Loaded {} document(s) from {}", file.documents.len(), file.designator);
    Ok(file)
}

/// Loads all files in order, stopping at the first failure.
pub fn load_files(designators: Vec<FileDesignator>) -> Result<Vec<SourceFile>> {
    designators.into_iter().map(load_file).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(files: &[FileDesignator]) -> Vec<String> {
        files
            .iter()
            .map(|f| match f {
                FileDesignator::Stdin => "-".to_string(),
                FileDesignator::Path(p) => p.file_name().unwrap().to_string_lossy().into_owned(),
            })
            .collect()
    }

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.yaml"), "a: 1\n").unwrap();
        fs::write(temp.path().join("b.json"), "{\"b\": 2}\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/c.yaml"), "c: 3\n").unwrap();
        temp
    }

    #[test]
    fn test_directory_without_recursion_skips_subdirs() {
        let temp = tree();
        let files = enumerate_files(&[temp.path().display().to_string()], false).unwrap();
        assert_eq!(paths(&files), vec!["a.yaml", "b.json"]);
    }

    #[test]
    fn test_directory_with_recursion() {
        let temp = tree();
        let files = enumerate_files(&[temp.path().display().to_string()], true).unwrap();
        assert_eq!(paths(&files), vec!["a.yaml", "b.json", "c.yaml"]);
    }

    #[test]
    fn test_explicit_file_ignores_extension() {
        let temp = tree();
        let notes = temp.path().join("notes.txt").display().to_string();
        let files = enumerate_files(&[notes], false).unwrap();
        assert_eq!(paths(&files), vec!["notes.txt"]);
    }

    #[test]
    fn test_duplicates_and_stdin() {
        let temp = tree();
        let dir = temp.path().display().to_string();
        let file = temp.path().join("a.yaml").display().to_string();
        let inputs = vec!["-".to_string(), file, dir, "-".to_string()];
        let files = enumerate_files(&inputs, false).unwrap();
        assert_eq!(paths(&files), vec!["-", "a.yaml", "b.json"]);
    }

    #[test]
    fn test_missing_input_is_enumeration_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing").display().to_string();
        let err = enumerate_files(&[missing], false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildrefError>(),
            Some(BuildrefError::EnumerationFailed { .. })
        ));
    }

    fn decode(bytes: &[u8]) -> Result<SourceFile> {
        decode_file(FileDesignator::Stdin, bytes.to_vec())
    }

    #[test]
    fn test_decode_multi_document() {
        let file = decode(b"a: 1\n---\nb: 2\n---\n- x\n").unwrap();
        assert_eq!(file.documents.len(), 3);
        assert_eq!(file.text, "a: 1\n---\nb: 2\n---\n- x\n");
    }

    #[test]
    fn test_decode_blank_and_comment_only_input() {
        assert!(decode(b"  \n").unwrap().documents.is_empty());
        let file = decode(b"# only a comment\n").unwrap();
        assert!(file.documents.is_empty());
        assert_eq!(file.render(), "# only a comment\n");
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = decode(b"a: \xff\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildrefError>(),
            Some(BuildrefError::ParseError { .. })
        ));
    }

    #[test]
    fn test_decode_error_names_file() {
        let designator = FileDesignator::Path(PathBuf::from("broken.yaml"));
        let err = decode_file(designator, b"a: [1, 2\n".to_vec()).unwrap_err();
        match err.downcast_ref::<BuildrefError>() {
            Some(BuildrefError::ParseError {
                file,
                ..
            }) => assert_eq!(file, "broken.yaml"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_file() {
        let temp = tree();
        let file = load_file(FileDesignator::Path(temp.path().join("b.json"))).unwrap();
        assert_eq!(file.documents.len(), 1);
    }
}
