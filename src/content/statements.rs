//! Localized statements of a parse

use super::blank::BlankNodeMap;
use super::parser::{ParsedNode, ParsedTriple, Parser};
use super::{ContentError, ContentResult};
use crate::node::{NodeId, NONE};
use crate::string_pool::StringPoolError;
use crate::xa::{SessionError, XaResolverSession};
use std::collections::VecDeque;
use tracing::warn;

/// Triples of node identifiers, localized batch by batch through a session.
///
/// Every batch first has its blank labels allocated, then its terms
/// localized. A statement whose term cannot be stored is skipped with a
/// warning.
pub struct Statements<'a> {
    parser: Parser,
    session: &'a mut XaResolverSession,
    blanks: BlankNodeMap,
    ready: VecDeque<[NodeId; 3]>,
    skipped: u64,
    done: bool,
}

impl<'a> Statements<'a> {
    pub fn new(parser: Parser, session: &'a mut XaResolverSession) -> ContentResult<Self> {
        let blanks = BlankNodeMap::new(parser.format())?;
        Ok(Self {
            parser,
            session,
            blanks,
            ready: VecDeque::new(),
            skipped: 0,
            done: false,
        })
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Statements dropped because a term could not be localized
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Blank nodes allocated so far
    pub fn blank_nodes(&self) -> u64 {
        self.blanks.allocated()
    }

    /// Session the statements are localized through
    pub fn session(&mut self) -> &mut XaResolverSession {
        &mut *self.session
    }

    fn localize_batch(&mut self, batch: Vec<ParsedTriple>) -> ContentResult<()> {
        for triple in &batch {
            for node in triple.nodes() {
                if let ParsedNode::Blank(label) = node {
                    self.blanks.note(label)?;
                }
            }
        }
        self.blanks.allocate(&mut *self.session)?;

        'triples: for triple in &batch {
            let mut nodes = [NONE; 3];
            for (slot, node) in triple.nodes().into_iter().enumerate() {
                nodes[slot] = match node {
                    ParsedNode::Blank(label) => self.blanks.get(label)?,
                    ParsedNode::Term(term) => match self.session.localize(term) {
                        Ok(id) => id,
                        Err(SessionError::StringPool(StringPoolError::Localize(reason))) => {
                            warn!("Skipping statement with unstorable term {}: {}", term, reason);
                            self.skipped += 1;
                            continue 'triples;
                        }
                        Err(e) => return Err(e.into()),
                    },
                };
            }
            self.ready.push_back(nodes);
        }
        Ok(())
    }
}

impl Iterator for Statements<'_> {
    type Item = ContentResult<[NodeId; 3]>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(triple) = self.ready.pop_front() {
                return Some(Ok(triple));
            }
            if self.done {
                return None;
            }
            match self.parser.next_batch() {
                Ok(Some(batch)) => {
                    if let Err(e) = self.localize_batch(batch) {
                        self.done = true;
                        self.parser.abort();
                        return Some(Err(e));
                    }
                }
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(ContentError::Parse(e)));
                }
            }
        }
    }
}
