/*
 * Platform-agnostic logic of the pruner: parsing an llms.txt document into a
 * section tree, token accounting, duplicate detection, the tri-state selection
 * engine and export. `EditorSession` ties these together behind one mutation
 * API. Configuration and path helpers live here as well.
 */
pub mod config;
pub mod document;
pub mod duplicates;
pub mod editor_session;
pub mod exporter;
pub mod parser;
pub mod path_utils;
pub mod selection;
pub mod token_accounting;
pub mod tokenizer_utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export the document model and selection types
pub use document::SectionId;

pub use duplicates::DuplicateKey;

pub use selection::{CheckState, SelectionState};

pub use editor_session::{EditorSession, SessionError, TokenSummary};

pub use exporter::write_export;

// Re-export config related items
pub use config::{ConfigManagerOperations, CoreConfigManager, PrunerConfig};

#[cfg(test)]
pub use config::ConfigError;

pub use tokenizer_utils::{TokenCounterOperations, TokenizerKind, create_token_counter};
