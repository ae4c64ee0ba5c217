use crate::core::document::{ParsedDocument, Section};
use crate::core::editor_session::ParseSummary;
use crate::core::selection::SelectionMap;
use crate::core::{
    CheckState, ConfigManagerOperations, DuplicateKey, EditorSession, PrunerConfig, SectionId,
    SelectionState, SessionError, TokenCounterOperations, TokenSummary, TokenizerKind,
    create_token_counter, write_export,
};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) const APP_NAME: &str = "LlmsPruner";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Information,
    Warning,
    Error,
}

/* Requests coming from the command line front end. */
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    LoadDocument(PathBuf),
    /* Document text that did not come from a file, e.g. stdin. */
    LoadContent(String),
    ToggleSection { id: SectionId, check: CheckState },
    ToggleDuplicateGroup { key: DuplicateKey, check: CheckState },
    SelectAll(CheckState),
    ShowReport,
    Export { destination: Option<PathBuf> },
}

/* What the front end should do in response to an event. */
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    ShowMessage {
        severity: MessageSeverity,
        text: String,
    },
    ShowReport(String),
    /* Export text for stdout, used when no destination file was given. */
    EmitExport(String),
}

pub trait PrunerEventHandler {
    fn handle_event(&mut self, event: AppEvent) -> Vec<AppCommand>;
}

/*
 * Presenter for the pruner. It owns the editing session, translates events
 * into session operations and renders the results as report text. Settings are
 * read through `ConfigManagerOperations`; the path of every successfully loaded
 * document is written back as `last_document_path`.
 */
pub struct PrunerAppLogic {
    pub(crate) config_manager: Arc<dyn ConfigManagerOperations>,
    pub(crate) config: PrunerConfig,
    pub(crate) session: EditorSession,
    pub(crate) document_path: Option<PathBuf>,
}

impl PrunerAppLogic {
    /*
     * Loads the settings and builds a session with the configured tokenizer.
     * `tokenizer_override` wins over the stored preference. Unreadable settings
     * are reported and replaced by the defaults.
     */
    pub fn new(
        config_manager: Arc<dyn ConfigManagerOperations>,
        tokenizer_override: Option<TokenizerKind>,
    ) -> Self {
        let config = match config_manager.load_config(APP_NAME) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("AppLogic: Could not load settings ({e}), using defaults.");
                PrunerConfig::default()
            }
        };
        let kind = tokenizer_override.unwrap_or(config.tokenizer);
        Self::with_token_counter(config_manager, config, create_token_counter(kind))
    }

    pub fn with_token_counter(
        config_manager: Arc<dyn ConfigManagerOperations>,
        config: PrunerConfig,
        token_counter: Box<dyn TokenCounterOperations>,
    ) -> Self {
        let session = EditorSession::new(
            token_counter,
            config.line_break_surcharge,
            config.min_duplicate_group_size,
        );
        PrunerAppLogic {
            config_manager,
            config,
            session,
            document_path: None,
        }
    }

    pub fn last_document_path(&self) -> Option<&PathBuf> {
        self.config.last_document_path.as_ref()
    }

    fn on_load_document(&mut self, path: PathBuf) -> Vec<AppCommand> {
        let ticket = match self.session.begin_parse() {
            Ok(ticket) => ticket,
            Err(e) => return vec![message(MessageSeverity::Warning, e.to_string())],
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                self.session.abort_parse();
                log::error!("AppLogic: Failed to read {path:?}: {e}");
                return vec![message(
                    MessageSeverity::Error,
                    format!("Could not read '{}': {e}", path.display()),
                )];
            }
        };
        let summary = match self.session.complete_parse(ticket, &text) {
            Ok(summary) => summary,
            Err(e) => return vec![message(MessageSeverity::Error, e.to_string())],
        };

        self.document_path = Some(path.clone());
        self.config.last_document_path = Some(path.clone());
        let mut commands = self.parsed_commands(&format!("'{}'", path.display()), &summary);
        if let Err(e) = self.config_manager.save_config(APP_NAME, &self.config) {
            log::warn!("AppLogic: Failed to remember last document: {e}");
            commands.push(message(
                MessageSeverity::Warning,
                format!("Could not save settings: {e}"),
            ));
        }
        commands
    }

    fn on_load_content(&mut self, text: String) -> Vec<AppCommand> {
        match self.session.process_content(&text) {
            Ok(summary) => {
                self.document_path = None;
                self.parsed_commands("stdin", &summary)
            }
            Err(e) => vec![message(MessageSeverity::Warning, e.to_string())],
        }
    }

    fn parsed_commands(&self, source: &str, summary: &ParseSummary) -> Vec<AppCommand> {
        let mut commands = vec![message(
            MessageSeverity::Information,
            format!(
                "Parsed {source}: {} sections, {} duplicate groups, {} tokens.",
                summary.section_count,
                summary.duplicate_group_count,
                summary.tokens.original_total
            ),
        )];
        if self.session.document().is_some_and(ParsedDocument::is_empty) {
            commands.push(message(
                MessageSeverity::Warning,
                format!("No sections found in {source}."),
            ));
        }
        commands
    }

    fn on_export(&self, destination: Option<PathBuf>) -> Vec<AppCommand> {
        let output = match self.session.export() {
            Ok(output) => output,
            Err(e) => return vec![message(MessageSeverity::Error, e.to_string())],
        };
        let Some(path) = destination else {
            return vec![AppCommand::EmitExport(output.content)];
        };
        match write_export(&output, &path) {
            Ok(()) => vec![message(
                MessageSeverity::Information,
                format!(
                    "Wrote {} sections (~{} tokens) to '{}'.",
                    output.sections_included,
                    output.exclusive_tokens,
                    path.display()
                ),
            )],
            Err(e) => {
                log::error!("AppLogic: Export to {path:?} failed: {e}");
                vec![message(MessageSeverity::Error, e.to_string())]
            }
        }
    }

    fn summary_commands(result: Result<TokenSummary, SessionError>) -> Vec<AppCommand> {
        match result {
            Ok(summary) => vec![message(
                MessageSeverity::Information,
                format_summary(&summary),
            )],
            Err(e) => vec![message(MessageSeverity::Warning, e.to_string())],
        }
    }

    /*
     * Renders the section tree, the duplicate groups and the token summary.
     * Markers: `[x]` on, `[ ]` off, `[-]` mixed.
     */
    pub(crate) fn render_report(&self) -> Option<String> {
        let document = self.session.document()?;
        let selection = self.session.selection()?;
        let mut report = String::new();
        if let Err(e) = self.write_report(&mut report, document, selection) {
            log::error!("AppLogic: Failed to render report: {e}");
            return None;
        }
        Some(report)
    }

    fn write_report(
        &self,
        out: &mut impl fmt::Write,
        document: &ParsedDocument,
        selection: &SelectionMap,
    ) -> fmt::Result {
        writeln!(out, "Sections:")?;
        let mut stack: Vec<(&Section, usize)> = document.roots().map(|s| (s, 1)).collect();
        stack.reverse();
        while let Some((section, depth)) = stack.pop() {
            writeln!(
                out,
                "{}{} {} {} ({} / {} tokens)",
                "  ".repeat(depth),
                marker(selection.section_state(section.id)),
                section.id,
                section.title,
                section.exclusive_token_count,
                section.total_token_count
            )?;
            let children: Vec<&Section> = document.children(section.id).collect();
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }

        let groups = self.session.groups();
        if !groups.is_empty() {
            writeln!(out, "Duplicate groups:")?;
            for group in groups {
                writeln!(
                    out,
                    "  {} {} ({} sections)",
                    marker(selection.group_state(&group.key)),
                    group.key,
                    group.member_ids.len()
                )?;
            }
        }

        if let Ok(summary) = self.session.token_summary() {
            writeln!(out, "{}", format_summary(&summary))?;
        }
        Ok(())
    }
}

impl PrunerEventHandler for PrunerAppLogic {
    fn handle_event(&mut self, event: AppEvent) -> Vec<AppCommand> {
        log::trace!("AppLogic: Handling {event:?}");
        match event {
            AppEvent::LoadDocument(path) => self.on_load_document(path),
            AppEvent::LoadContent(text) => self.on_load_content(text),
            AppEvent::ToggleSection { id, check } => {
                Self::summary_commands(self.session.toggle(id, check))
            }
            AppEvent::ToggleDuplicateGroup { key, check } => {
                Self::summary_commands(self.session.toggle_group(&key, check))
            }
            AppEvent::SelectAll(check) => Self::summary_commands(self.session.select_all(check)),
            AppEvent::ShowReport => match self.render_report() {
                Some(report) => vec![AppCommand::ShowReport(report)],
                None => vec![message(MessageSeverity::Warning, "No document loaded.".into())],
            },
            AppEvent::Export { destination } => self.on_export(destination),
        }
    }
}

fn message(severity: MessageSeverity, text: String) -> AppCommand {
    AppCommand::ShowMessage { severity, text }
}

pub(crate) fn marker(state: Option<SelectionState>) -> &'static str {
    match state {
        Some(SelectionState::On) => "[x]",
        Some(SelectionState::Mixed) => "[-]",
        Some(SelectionState::Off) | None => "[ ]",
    }
}

pub(crate) fn format_summary(summary: &TokenSummary) -> String {
    format!(
        "Tokens: {} of {} selected ({:.1}% removed), {} of {} sections",
        summary.selected_total,
        summary.original_total,
        summary.percentage_removed,
        summary.selected_sections,
        summary.section_count
    )
}
