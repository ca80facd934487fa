//! Corpus loading for the demo binary: one document per line.

use std::fmt;
use std::path::Path;

/// Errors produced while loading a training corpus.
#[derive(Debug)]
pub enum DataError {
    /// I/O failure reading the corpus file.
    Io(std::io::Error),

    /// The file yields no non-empty lines.
    EmptyCorpus,
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::Io(e) => write!(f, "corpus io: {e}"),
            DataError::EmptyCorpus => write!(f, "corpus: no non-empty lines in input"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Io(e) => Some(e),
            DataError::EmptyCorpus => None,
        }
    }
}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        DataError::Io(e)
    }
}

/// Loads documents from `path`, one per line, trimmed; blank lines are
/// dropped.
///
/// # Errors
///
/// Returns [`DataError::Io`] if the file cannot be read and
/// [`DataError::EmptyCorpus`] if nothing usable remains after trimming.
pub fn load_docs(path: &Path) -> Result<Vec<String>, DataError> {
    let input = std::fs::read_to_string(path)?;
    let docs: Vec<String> = input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if docs.is_empty() {
        return Err(DataError::EmptyCorpus);
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_docs_trims_and_drops_blank_lines() {
        let path = std::env::temp_dir().join("chargpt_data_test_lines.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "anna").unwrap();
        writeln!(f, "   ").unwrap();
        writeln!(f, "  bob  ").unwrap();
        drop(f);

        let result = load_docs(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(result.unwrap(), ["anna", "bob"]);
    }

    #[test]
    fn load_docs_empty_file_is_an_error() {
        let path = std::env::temp_dir().join("chargpt_data_test_empty.txt");
        std::fs::File::create(&path).unwrap();

        let result = load_docs(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(DataError::EmptyCorpus)));
    }

    #[test]
    fn load_docs_missing_file_is_io_error() {
        let result = load_docs(Path::new("/nonexistent/chargpt_never_exists.txt"));
        assert!(matches!(result, Err(DataError::Io(_))));
    }
}
