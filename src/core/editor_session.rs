/*
 * Owns the document currently being edited: the parse result, its duplicate
 * groups and the selection. Every mutation goes through the session, which
 * answers with a fresh `TokenSummary`.
 *
 * Parsing is two-phase. `begin_parse` hands out a `ParseTicket` and marks the
 * session busy; `complete_parse` redeems the ticket, parses the text and swaps
 * the new state in as a whole. While a ticket is outstanding further parses and
 * selection changes are rejected with `SessionError::Busy`. `abort_parse` drops
 * the outstanding ticket, which then counts as stale.
 */
use crate::core::document::{ParsedDocument, SectionId};
use crate::core::duplicates::{DuplicateGroup, DuplicateKey, find_duplicates};
use crate::core::exporter::{self, ExportError, ExportOutput};
use crate::core::parser::DocumentParser;
use crate::core::selection::{CheckState, SelectionEngine, SelectionError, SelectionMap};
use crate::core::token_accounting::TokenAccountant;
use crate::core::tokenizer_utils::TokenCounterOperations;

#[derive(Debug)]
pub enum SessionError {
    Busy,
    StaleTicket,
    NoDocument,
    Selection(SelectionError),
    Export(ExportError),
}

impl From<SelectionError> for SessionError {
    fn from(err: SelectionError) -> Self {
        SessionError::Selection(err)
    }
}

impl From<ExportError> for SessionError {
    fn from(err: ExportError) -> Self {
        SessionError::Export(err)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Busy => write!(f, "A document is still being parsed"),
            SessionError::StaleTicket => write!(f, "Parse ticket has been superseded"),
            SessionError::NoDocument => write!(f, "No document loaded"),
            SessionError::Selection(e) => write!(f, "{e}"),
            SessionError::Export(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Selection(e) => Some(e),
            SessionError::Export(e) => Some(e),
            _ => None,
        }
    }
}

/*
 * Token and section totals after a mutation. `percentage_removed` is 0 for an
 * empty document.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenSummary {
    pub original_total: usize,
    pub selected_total: usize,
    pub percentage_removed: f64,
    pub selected_sections: usize,
    pub section_count: usize,
}

impl TokenSummary {
    pub fn new(original_total: usize, selected_total: usize) -> Self {
        let percentage_removed = if original_total == 0 {
            0.0
        } else {
            original_total.saturating_sub(selected_total) as f64 * 100.0 / original_total as f64
        };
        TokenSummary {
            original_total,
            selected_total,
            percentage_removed,
            selected_sections: 0,
            section_count: 0,
        }
    }

    pub fn with_sections(mut self, selected_sections: usize, section_count: usize) -> Self {
        self.selected_sections = selected_sections;
        self.section_count = section_count;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseSummary {
    pub section_count: usize,
    pub duplicate_group_count: usize,
    pub tokens: TokenSummary,
}

/* Proof that the caller owns the in-flight parse. Consumed on completion. */
#[derive(Debug)]
pub struct ParseTicket {
    generation: u64,
}

struct DocumentState {
    document: ParsedDocument,
    groups: Vec<DuplicateGroup>,
    selection: SelectionMap,
}

impl DocumentState {
    fn token_summary(&self) -> TokenSummary {
        let engine = SelectionEngine::new(&self.document, &self.groups);
        TokenSummary::new(
            self.document.total_token_count(),
            engine.selected_token_count(&self.selection),
        )
        .with_sections(
            engine.selected_section_count(&self.selection),
            self.document.len(),
        )
    }
}

pub struct EditorSession {
    token_counter: Box<dyn TokenCounterOperations>,
    line_break_surcharge: usize,
    min_duplicate_group_size: usize,
    state: Option<DocumentState>,
    generation: u64,
    in_flight: Option<u64>,
}

impl EditorSession {
    pub fn new(
        token_counter: Box<dyn TokenCounterOperations>,
        line_break_surcharge: usize,
        min_duplicate_group_size: usize,
    ) -> Self {
        log::debug!(
            "EditorSession: Created with tokenizer '{}', surcharge {line_break_surcharge}, min group size {min_duplicate_group_size}.",
            token_counter.name()
        );
        EditorSession {
            token_counter,
            line_break_surcharge,
            min_duplicate_group_size,
            state: None,
            generation: 0,
            in_flight: None,
        }
    }

    pub fn is_parsing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn begin_parse(&mut self) -> Result<ParseTicket, SessionError> {
        if self.is_parsing() {
            log::warn!(
                "EditorSession: Parse requested while parse {:?} is in flight.",
                self.in_flight
            );
            return Err(SessionError::Busy);
        }
        self.generation += 1;
        self.in_flight = Some(self.generation);
        log::trace!("EditorSession: Began parse {}.", self.generation);
        Ok(ParseTicket {
            generation: self.generation,
        })
    }

    /* Releases the busy flag without touching the current document. */
    pub fn abort_parse(&mut self) {
        if let Some(generation) = self.in_flight.take() {
            log::debug!("EditorSession: Aborted parse {generation}.");
        }
    }

    /*
     * Parses `text` and replaces document, groups and selection in one step.
     * The new selection has every section and group `On`.
     */
    pub fn complete_parse(
        &mut self,
        ticket: ParseTicket,
        text: &str,
    ) -> Result<ParseSummary, SessionError> {
        if self.in_flight != Some(ticket.generation) {
            log::warn!(
                "EditorSession: Ignoring result of parse {} (current: {:?}).",
                ticket.generation,
                self.in_flight
            );
            return Err(SessionError::StaleTicket);
        }

        let accountant = TokenAccountant::new(self.token_counter.as_ref(), self.line_break_surcharge);
        let document = DocumentParser::new(&accountant).parse(text);
        let groups = find_duplicates(document.sections(), self.min_duplicate_group_size);
        let selection = SelectionEngine::new(&document, &groups).initial_selection();
        let state = DocumentState {
            document,
            groups,
            selection,
        };
        let summary = ParseSummary {
            section_count: state.document.len(),
            duplicate_group_count: state.groups.len(),
            tokens: state.token_summary(),
        };

        self.state = Some(state);
        self.in_flight = None;
        log::debug!(
            "EditorSession: Parse {} complete: {} sections, {} duplicate groups, {} tokens.",
            ticket.generation,
            summary.section_count,
            summary.duplicate_group_count,
            summary.tokens.original_total
        );
        Ok(summary)
    }

    pub fn process_content(&mut self, text: &str) -> Result<ParseSummary, SessionError> {
        let ticket = self.begin_parse()?;
        self.complete_parse(ticket, text)
    }

    pub fn toggle(&mut self, id: SectionId, check: CheckState) -> Result<TokenSummary, SessionError> {
        let state = self.state_for_mutation()?;
        SelectionEngine::new(&state.document, &state.groups).toggle(&mut state.selection, id, check)?;
        Ok(state.token_summary())
    }

    pub fn toggle_group(
        &mut self,
        key: &DuplicateKey,
        check: CheckState,
    ) -> Result<TokenSummary, SessionError> {
        let state = self.state_for_mutation()?;
        SelectionEngine::new(&state.document, &state.groups).toggle_group(
            &mut state.selection,
            key,
            check,
        )?;
        Ok(state.token_summary())
    }

    pub fn select_all(&mut self, check: CheckState) -> Result<TokenSummary, SessionError> {
        let state = self.state_for_mutation()?;
        SelectionEngine::new(&state.document, &state.groups).select_all(&mut state.selection, check);
        Ok(state.token_summary())
    }

    pub fn token_summary(&self) -> Result<TokenSummary, SessionError> {
        self.current_state().map(DocumentState::token_summary)
    }

    pub fn export(&self) -> Result<ExportOutput, SessionError> {
        let state = self.current_state()?;
        Ok(exporter::create_export_content(
            &state.document,
            &state.selection,
        )?)
    }

    pub fn document(&self) -> Option<&ParsedDocument> {
        self.state.as_ref().map(|s| &s.document)
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        self.state.as_ref().map(|s| s.groups.as_slice()).unwrap_or(&[])
    }

    pub fn selection(&self) -> Option<&SelectionMap> {
        self.state.as_ref().map(|s| &s.selection)
    }

    fn current_state(&self) -> Result<&DocumentState, SessionError> {
        self.state.as_ref().ok_or(SessionError::NoDocument)
    }

    fn state_for_mutation(&mut self) -> Result<&mut DocumentState, SessionError> {
        if self.is_parsing() {
            log::warn!("EditorSession: Selection change rejected while parsing.");
            return Err(SessionError::Busy);
        }
        self.state.as_mut().ok_or(SessionError::NoDocument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selection::SelectionState;
    use crate::core::test_support::WordCounter;

    const DOC: &str = "# Guide\nintro\n## Example\nx\n## Example\ny\n## Example\nz\n# Other\nrest\n";

    fn session() -> EditorSession {
        EditorSession::new(Box::new(WordCounter), 1, 3)
    }

    #[test]
    fn test_token_summary_percentage() {
        let summary = TokenSummary::new(200, 150);
        assert_eq!(summary.percentage_removed, 25.0);
        assert_eq!(TokenSummary::new(0, 0).percentage_removed, 0.0);
        assert_eq!(TokenSummary::new(10, 10).percentage_removed, 0.0);
    }

    #[test]
    fn test_process_content_starts_fully_selected() {
        let mut session = session();
        let summary = session.process_content(DOC).unwrap();
        assert_eq!(summary.section_count, 5);
        assert_eq!(summary.duplicate_group_count, 1);
        assert_eq!(summary.tokens.original_total, summary.tokens.selected_total);
        assert_eq!(summary.tokens.selected_sections, 5);
        assert_eq!(summary.tokens.section_count, 5);
        let selection = session.selection().unwrap();
        for section in session.document().unwrap().sections() {
            assert_eq!(selection.section_state(section.id), Some(SelectionState::On));
        }
        assert_eq!(
            selection.group_state(&DuplicateKey::new("Example", 2)),
            Some(SelectionState::On)
        );
    }

    #[test]
    fn test_operations_without_document() {
        let mut session = session();
        assert!(matches!(session.token_summary(), Err(SessionError::NoDocument)));
        assert!(matches!(
            session.toggle(SectionId(0), CheckState::Unchecked),
            Err(SessionError::NoDocument)
        ));
        assert!(matches!(session.export(), Err(SessionError::NoDocument)));
        assert!(session.groups().is_empty());
    }

    #[test]
    fn test_busy_while_parse_in_flight() {
        let mut session = session();
        session.process_content(DOC).unwrap();
        let ticket = session.begin_parse().unwrap();
        assert!(session.is_parsing());
        assert!(matches!(session.begin_parse(), Err(SessionError::Busy)));
        assert!(matches!(session.process_content(DOC), Err(SessionError::Busy)));
        assert!(matches!(
            session.select_all(CheckState::Unchecked),
            Err(SessionError::Busy)
        ));
        // Reading is still possible while parsing.
        assert!(session.token_summary().is_ok());

        session.complete_parse(ticket, "# New\n").unwrap();
        assert!(!session.is_parsing());
        assert_eq!(session.document().unwrap().len(), 1);
    }

    #[test]
    fn test_aborted_ticket_is_stale() {
        let mut session = session();
        let ticket = session.begin_parse().unwrap();
        session.abort_parse();
        assert!(matches!(
            session.complete_parse(ticket, DOC),
            Err(SessionError::StaleTicket)
        ));
        assert!(session.document().is_none());

        let stale = session.begin_parse().unwrap();
        session.abort_parse();
        let fresh = session.begin_parse().unwrap();
        assert!(matches!(
            session.complete_parse(stale, DOC),
            Err(SessionError::StaleTicket)
        ));
        assert!(session.complete_parse(fresh, DOC).is_ok());
    }

    #[test]
    fn test_reparse_replaces_state_and_resets_selection() {
        let mut session = session();
        session.process_content(DOC).unwrap();
        let first = session.document().unwrap().sections()[0].id;
        session.toggle(first, CheckState::Unchecked).unwrap();
        assert!(!session.selection().unwrap().is_on(first));

        session.process_content(DOC).unwrap();
        let selection = session.selection().unwrap();
        assert!(
            session
                .document()
                .unwrap()
                .sections()
                .iter()
                .all(|s| selection.is_on(s.id))
        );
    }

    #[test]
    fn test_mutations_return_token_summary() {
        let mut session = session();
        let parsed = session.process_content(DOC).unwrap();
        let original = parsed.tokens.original_total;

        let summary = session
            .toggle_group(&DuplicateKey::new("Example", 2), CheckState::Unchecked)
            .unwrap();
        assert_eq!(summary.original_total, original);
        assert!(summary.selected_total < original);
        assert!(summary.percentage_removed > 0.0);

        // Guide had only the three examples as children, so it is off as well.
        assert_eq!(summary.selected_sections, 1);
        assert_eq!(summary.section_count, 5);

        let none = session.select_all(CheckState::Unchecked).unwrap();
        assert_eq!(none.selected_total, 0);
        assert_eq!(none.selected_sections, 0);
        assert_eq!(none.percentage_removed, 100.0);

        let all = session.select_all(CheckState::Checked).unwrap();
        assert_eq!(all.selected_total, original);
    }

    #[test]
    fn test_unknown_ids_leave_state_untouched() {
        let mut session = session();
        session.process_content(DOC).unwrap();
        let before = session.selection().unwrap().clone();
        assert!(matches!(
            session.toggle(SectionId(999), CheckState::Unchecked),
            Err(SessionError::Selection(SelectionError::UnknownSection(_)))
        ));
        assert!(matches!(
            session.toggle_group(&DuplicateKey::new("Nope", 1), CheckState::Unchecked),
            Err(SessionError::Selection(SelectionError::UnknownGroup(_)))
        ));
        assert_eq!(session.selection().unwrap(), &before);
    }

    #[test]
    fn test_export_through_session() {
        let mut session = session();
        session.process_content("# A\na\n# B\nb\n").unwrap();
        let b = session.document().unwrap().sections()[1].id;
        session.toggle(b, CheckState::Unchecked).unwrap();
        let output = session.export().unwrap();
        assert_eq!(output.content, "# A\na\n");

        session.select_all(CheckState::Unchecked).unwrap();
        assert!(matches!(
            session.export(),
            Err(SessionError::Export(ExportError::NothingSelected))
        ));
    }
}
