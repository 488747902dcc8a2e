//! Where the contract text comes from: an uploaded file, piped stdin, or the
//! user's editor.

use std::io::Read;
use std::path::PathBuf;

use crate::extract::{ExtractError, TextExtractor};

const EDITOR_TEMPLATE: &str = "";

#[derive(Debug, Clone)]
pub enum ContractSource {
    File(PathBuf),
    Stdin,
    Editor,
}

impl ContractSource {
    /// A file if one was given, stdin when something is piped in, the editor otherwise
    pub fn detect(file: Option<PathBuf>) -> Self {
        match file {
            Some(path) => ContractSource::File(path),
            None if !atty::is(atty::Stream::Stdin) => ContractSource::Stdin,
            None => ContractSource::Editor,
        }
    }
}

/// Read the contract text. Blank text is returned as-is; the analyzer rejects it.
pub fn read_contract(
    source: &ContractSource,
    extractor: &TextExtractor,
    on_status: Option<&dyn Fn(&str)>,
) -> Result<String, ExtractError> {
    match source {
        ContractSource::File(path) => extractor.extract_path(path, on_status),
        ContractSource::Stdin => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
        ContractSource::Editor => Ok(edit::edit(EDITOR_TEMPLATE)?),
    }
}

/// Characters of contract text, ignoring surrounding whitespace
pub fn char_count(text: &str) -> usize {
    text.trim().chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(char_count("  Miete: 1.200 €  \n"), 14);
        assert_eq!(char_count("Übergabe"), 8);
        assert_eq!(char_count(" \n\t"), 0);
    }

    #[test]
    fn explicit_file_wins() {
        let source = ContractSource::detect(Some(PathBuf::from("lease.pdf")));
        assert!(matches!(source, ContractSource::File(p) if p == PathBuf::from("lease.pdf")));
    }

    #[test]
    fn file_source_goes_through_the_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offer.txt");
        std::fs::write(&path, "Salary: 50,000 per year.").unwrap();

        let text = read_contract(
            &ContractSource::File(path),
            &TextExtractor::default(),
            None,
        )
        .unwrap();
        assert_eq!(text, "Salary: 50,000 per year.");
    }

    #[test]
    fn unsupported_file_is_rejected() {
        let err = read_contract(
            &ContractSource::File(PathBuf::from("offer.docx")),
            &TextExtractor::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(_)));
    }
}
