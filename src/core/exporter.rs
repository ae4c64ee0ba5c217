/*
 * Rebuilds document text from the sections that are currently selected.
 *
 * Each selected section contributes its heading line (`"#" x level + " " +
 * title`, omitted for the preface) followed by its content lines. Sections are
 * separated by a blank line, trailing whitespace is trimmed and exactly one
 * newline terminates the output. Exporting an untouched document therefore
 * reproduces it up to whitespace normalization.
 */
use crate::core::document::ParsedDocument;
use crate::core::selection::SelectionMap;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug)]
pub enum ExportError {
    NothingSelected,
    Io(io::Error),
}

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Io(err)
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::NothingSelected => write!(f, "No sections selected for export"),
            ExportError::Io(e) => write!(f, "Export I/O error: {e}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(e) => Some(e),
            ExportError::NothingSelected => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutput {
    pub content: String,
    pub sections_included: usize,
    pub exclusive_tokens: usize,
}

/*
 * Builds the export text. Sections are emitted in document order; a section is
 * included only when its own state is `On` (mixed ancestors are left out).
 */
pub fn create_export_content(
    document: &ParsedDocument,
    selection: &SelectionMap,
) -> Result<ExportOutput, ExportError> {
    let mut content = String::new();
    let mut sections_included = 0;
    let mut exclusive_tokens = 0;

    for section in document.sections() {
        if !selection.is_on(section.id) {
            continue;
        }
        sections_included += 1;
        exclusive_tokens += section.exclusive_token_count;
        if let Some(heading) = section.heading_line() {
            content.push_str(&heading);
            content.push('\n');
        }
        content.push_str(&section.joined_content());
        content.push_str("\n\n");
    }

    if sections_included == 0 {
        log::warn!("Exporter: Nothing selected, no export produced.");
        return Err(ExportError::NothingSelected);
    }

    let mut content = content.trim_end().to_string();
    content.push('\n');
    log::debug!(
        "Exporter: Exported {sections_included} sections (~{exclusive_tokens} exclusive tokens)."
    );
    Ok(ExportOutput {
        content,
        sections_included,
        exclusive_tokens,
    })
}

pub fn write_export(output: &ExportOutput, path: &Path) -> Result<(), ExportError> {
    log::debug!("Exporter: Writing {} bytes to {path:?}.", output.content.len());
    fs::write(path, output.content.as_bytes())?;
    Ok(())
}
