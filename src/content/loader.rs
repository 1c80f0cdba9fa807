//! Loads documents into a graph

use super::parser::Parser;
use super::statements::Statements;
use super::{Content, ContentResult};
use crate::config::ParserConfig;
use crate::xa::XaResolverSession;
use oxrdf::Term;
use tracing::info;

/// Result of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    /// Statements added to the graph
    pub statements: u64,
    /// Statements skipped because a term could not be stored
    pub skipped: u64,
    /// Blank nodes allocated for the document
    pub blank_nodes: u64,
    pub count_is_total: bool,
}

/// Streams documents into the open transaction of a session
#[derive(Debug, Clone, Default)]
pub struct ContentLoader {
    config: ParserConfig,
}

impl ContentLoader {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse `content` and add every statement to `graph`. The session must
    /// be refreshed; committing is left to the caller.
    pub fn load(
        &self,
        session: &mut XaResolverSession,
        content: &dyn Content,
        graph: &Term,
    ) -> ContentResult<LoadStats> {
        let graph = session.localize(graph)?;
        let parser = Parser::start(content, &self.config)?;
        let mut statements = Statements::new(parser, session)?;

        let mut added = 0u64;
        while let Some(triple) = statements.next() {
            let [subject, predicate, object] = triple?;
            statements.session().add_triple(subject, predicate, object, graph)?;
            added += 1;
        }

        let stats = LoadStats {
            statements: added,
            skipped: statements.skipped(),
            blank_nodes: statements.blank_nodes(),
            count_is_total: statements.parser().is_statement_count_total(),
        };
        info!(
            "Loaded {} statements from {} ({} skipped)",
            stats.statements,
            content.uri().unwrap_or("<anonymous>"),
            stats.skipped
        );
        Ok(stats)
    }
}
