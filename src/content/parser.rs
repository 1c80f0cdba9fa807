//! Streaming document parser
//!
//! The producer thread runs a rio parser over the document and sends
//! batches of [`ParsedTriple`]s through a bounded channel; a full channel
//! blocks the producer until the consumer catches up. Blank nodes are left
//! as document tokens since only the consuming thread may allocate nodes.

use super::{Content, ContentResult, RdfFormat};
use crate::config::ParserConfig;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use oxiri::Iri;
use oxrdf::{Literal, NamedNode, Term};
use parking_lot::Mutex;
use rio_api::model;
use rio_api::parser::TriplesParser;
use rio_turtle::{TurtleError, TurtleParser};
use rio_xml::{RdfXmlError, RdfXmlParser};
use std::io::{BufReader, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that end a parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The document is malformed
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Parser thread failed: {0}")]
    Thread(String),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// A term as it appears in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedNode {
    Term(Term),
    /// Blank node label, scoped to the document
    Blank(String),
}

/// A statement before localization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTriple {
    pub subject: ParsedNode,
    pub predicate: ParsedNode,
    pub object: ParsedNode,
}

impl ParsedTriple {
    pub fn nodes(&self) -> [&ParsedNode; 3] {
        [&self.subject, &self.predicate, &self.object]
    }
}

/// Parser lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Producer not yet running
    Created,
    /// Producer thread active
    Running,
    /// Producer finished, queue may hold triples
    Draining,
    /// Queue drained; the recorded error, if any, says how it ended
    Complete,
}

#[derive(Debug)]
struct ParseStatus {
    state: ParserState,
    count_is_total: bool,
    error: Option<ParseError>,
}

enum Event {
    Batch(Vec<ParsedTriple>),
    Closed,
    Aborted,
}

enum ProduceError {
    Syntax(String),
    Aborted,
}

impl From<TurtleError> for ProduceError {
    fn from(e: TurtleError) -> Self {
        ProduceError::Syntax(e.to_string())
    }
}

impl From<RdfXmlError> for ProduceError {
    fn from(e: RdfXmlError) -> Self {
        ProduceError::Syntax(e.to_string())
    }
}

/// Stops a running parse from any thread.
#[derive(Clone)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
    /// Dropping the sender disconnects every waiter on the abort channel.
    signal: Arc<Mutex<Option<Sender<()>>>>,
    queue: Receiver<Vec<ParsedTriple>>,
}

impl AbortHandle {
    /// Request termination: wake both threads and drop queued triples.
    pub fn abort(&self) {
        if self.aborted.swap(true, Ordering::AcqRel) {
            return;
        }
        self.signal.lock().take();
        let mut dropped = 0;
        while let Ok(batch) = self.queue.try_recv() {
            dropped += batch.len();
        }
        debug!("Parse aborted, {} queued triples dropped", dropped);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

/// Consumer end of a running parse
pub struct Parser {
    receiver: Receiver<Vec<ParsedTriple>>,
    abort_rx: Receiver<()>,
    abort: AbortHandle,
    status: Arc<Mutex<ParseStatus>>,
    count: Arc<AtomicU64>,
    format: RdfFormat,
    handle: Option<JoinHandle<()>>,
}

impl Parser {
    /// Open the content and start the producer thread.
    pub fn start(content: &dyn Content, config: &ParserConfig) -> ContentResult<Self> {
        config.validate()?;
        let format = content.format()?;
        let stream = content.new_input_stream()?;
        let base = content.uri().and_then(|uri| Iri::parse(uri.to_string()).ok());
        let name = content.uri().unwrap_or("<anonymous>").to_string();

        let (batch_size, capacity) = match format {
            RdfFormat::RdfXml => (config.rdfxml_batch_size, config.rdfxml_queue_buffers),
            RdfFormat::N3 => (1, config.n3_queue_triples),
        };
        let (sender, receiver) = bounded(capacity);
        let (abort_tx, abort_rx) = bounded::<()>(0);

        let abort = AbortHandle {
            aborted: Arc::new(AtomicBool::new(false)),
            signal: Arc::new(Mutex::new(Some(abort_tx))),
            queue: receiver.clone(),
        };
        let status = Arc::new(Mutex::new(ParseStatus {
            state: ParserState::Created,
            count_is_total: false,
            error: None,
        }));
        let count = Arc::new(AtomicU64::new(0));

        let producer = Producer {
            sender,
            abort_rx: abort_rx.clone(),
            aborted: Arc::clone(&abort.aborted),
            count: Arc::clone(&count),
            batch: Vec::with_capacity(batch_size),
            batch_size,
            log_batch: config.statement_log_batch,
            started: Instant::now(),
            name: name.clone(),
        };
        let thread_status = Arc::clone(&status);

        status.lock().state = ParserState::Running;
        let handle = std::thread::Builder::new()
            .name("quadstore-parser".to_string())
            .spawn(move || producer.run(format, stream, base, thread_status))?;
        info!("Started {:?} parse of {}", format, name);

        Ok(Self {
            receiver,
            abort_rx,
            abort,
            status,
            count,
            format,
            handle: Some(handle),
        })
    }

    pub fn format(&self) -> RdfFormat {
        self.format
    }

    pub fn state(&self) -> ParserState {
        self.status.lock().state
    }

    /// Statements parsed so far
    pub fn statement_count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// True once the parse reached the end of the document without error
    /// or abort, making [`Parser::statement_count`] final.
    pub fn is_statement_count_total(&self) -> bool {
        self.status.lock().count_is_total
    }

    /// Handle for aborting from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    fn recorded_error(&self) -> Option<ParseError> {
        self.status.lock().error.clone()
    }

    fn finish(&mut self) -> ParseResult<()> {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                let mut status = self.status.lock();
                status.error = Some(ParseError::Thread("producer panicked".to_string()));
                status.count_is_total = false;
            }
        }
        let mut status = self.status.lock();
        status.state = ParserState::Complete;
        match &status.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn discard_queue(&self) {
        while self.receiver.try_recv().is_ok() {}
    }

    /// Next batch of triples, blocking while the producer works.
    ///
    /// `Ok(None)` marks the end of the document or an abort. A parse error
    /// is returned once the producer records it; triples still queued at
    /// that point are discarded.
    pub fn next_batch(&mut self) -> ParseResult<Option<Vec<ParsedTriple>>> {
        if self.recorded_error().is_some() {
            self.discard_queue();
            return self.finish().map(|_| None);
        }
        if self.is_aborted() {
            self.discard_queue();
            self.finish()?;
            return Ok(None);
        }

        let event = select! {
            recv(self.receiver) -> batch => match batch {
                Ok(batch) => Event::Batch(batch),
                Err(_) => Event::Closed,
            },
            recv(self.abort_rx) -> _ => Event::Aborted,
        };

        match event {
            Event::Batch(batch) => {
                if self.recorded_error().is_some() {
                    self.discard_queue();
                    return self.finish().map(|_| None);
                }
                Ok(Some(batch))
            }
            Event::Closed => {
                self.finish()?;
                Ok(None)
            }
            Event::Aborted => {
                self.discard_queue();
                self.finish()?;
                Ok(None)
            }
        }
    }

    /// Drain the rest of the document and return the final count.
    pub fn wait_for_statement_total(&mut self) -> ParseResult<u64> {
        while self.next_batch()?.is_some() {}
        Ok(self.statement_count())
    }
}

impl Drop for Parser {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.abort();
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

struct Producer {
    sender: Sender<Vec<ParsedTriple>>,
    abort_rx: Receiver<()>,
    aborted: Arc<AtomicBool>,
    count: Arc<AtomicU64>,
    batch: Vec<ParsedTriple>,
    batch_size: usize,
    log_batch: u64,
    started: Instant,
    name: String,
}

impl Producer {
    fn run(
        mut self,
        format: RdfFormat,
        stream: Box<dyn Read + Send>,
        base: Option<Iri<String>>,
        status: Arc<Mutex<ParseStatus>>,
    ) {
        let reader = BufReader::new(stream);
        let result = match format {
            RdfFormat::RdfXml => self.drive(RdfXmlParser::new(reader, base)),
            RdfFormat::N3 => self.drive(TurtleParser::new(reader, base)),
        }
        .and_then(|()| self.flush());

        let count = self.count.load(Ordering::Acquire);
        let mut status = status.lock();
        status.state = ParserState::Draining;
        match result {
            Ok(()) => {
                status.count_is_total = !self.aborted.load(Ordering::Acquire);
                info!(
                    "Parsed {} statements from {} in {:.2?}",
                    count,
                    self.name,
                    self.started.elapsed()
                );
            }
            Err(ProduceError::Syntax(message)) => {
                warn!("Parse of {} failed after {} statements: {}", self.name, count, message);
                status.error = Some(ParseError::Syntax(message));
            }
            Err(ProduceError::Aborted) => {
                debug!("Parse of {} aborted after {} statements", self.name, count);
            }
        }
        // The sender drops with `self`, waking the consumer.
    }

    fn drive<P>(&mut self, mut parser: P) -> Result<(), ProduceError>
    where
        P: TriplesParser,
        ProduceError: From<P::Error>,
    {
        while !parser.is_end() {
            if self.aborted.load(Ordering::Acquire) {
                return Err(ProduceError::Aborted);
            }
            parser.parse_step(&mut |triple| self.on_triple(triple))?;
        }
        Ok(())
    }

    fn on_triple(&mut self, triple: model::Triple<'_>) -> Result<(), ProduceError> {
        let parsed = match convert_triple(&triple) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!("Skipping statement {}: {}", triple, reason);
                return Ok(());
            }
        };
        self.batch.push(parsed);

        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        if count % self.log_batch == 0 {
            let secs = self.started.elapsed().as_secs_f64();
            info!(
                "Parsed {} statements from {} ({:.0} statements/s)",
                count,
                self.name,
                count as f64 / secs.max(f64::EPSILON)
            );
        }

        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ProduceError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
        select! {
            send(self.sender, batch) -> sent => sent.map_err(|_| ProduceError::Aborted),
            recv(self.abort_rx) -> _ => Err(ProduceError::Aborted),
        }
    }
}

fn convert_triple(triple: &model::Triple<'_>) -> Result<ParsedTriple, String> {
    let subject = match triple.subject {
        model::Subject::NamedNode(node) => ParsedNode::Term(named(node)?),
        model::Subject::BlankNode(node) => ParsedNode::Blank(node.id.to_string()),
        _ => return Err("embedded triples are not supported".to_string()),
    };
    let predicate = ParsedNode::Term(named(triple.predicate)?);
    let object = match triple.object {
        model::Term::NamedNode(node) => ParsedNode::Term(named(node)?),
        model::Term::BlankNode(node) => ParsedNode::Blank(node.id.to_string()),
        model::Term::Literal(literal) => ParsedNode::Term(Term::Literal(convert_literal(literal)?)),
        _ => return Err("embedded triples are not supported".to_string()),
    };
    Ok(ParsedTriple {
        subject,
        predicate,
        object,
    })
}

fn named(node: model::NamedNode<'_>) -> Result<Term, String> {
    Ok(Term::NamedNode(NamedNode::new(node.iri).map_err(|e| e.to_string())?))
}

fn convert_literal(literal: model::Literal<'_>) -> Result<Literal, String> {
    match literal {
        model::Literal::Simple { value } => Ok(Literal::new_simple_literal(value)),
        model::Literal::LanguageTaggedString { value, language } => {
            Literal::new_language_tagged_literal(value, language).map_err(|e| e.to_string())
        }
        model::Literal::Typed { value, datatype } => {
            let datatype = NamedNode::new(datatype.iri).map_err(|e| e.to_string())?;
            Ok(Literal::new_typed_literal(value, datatype))
        }
    }
}
