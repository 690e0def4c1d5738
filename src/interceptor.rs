//! Two-phase security interceptors.
//!
//! Interceptors are the hook points security modules use to observe and
//! mutate a request/response around handler execution. Each exposes a
//! Before hook, run ahead of the handler, and a Commit hook, run after the
//! response is committed but before it flushes. Hooks run in registration
//! order, and that order is part of the contract: a later module may depend
//! on state an earlier one produced, so the chain is never reordered at
//! runtime.
//!
//! A Before hook short-circuits by driving the writer to completion and
//! returning [`Flow::Done`]; the handler and the remaining Before hooks are
//! skipped, but the Commit hooks of every interceptor that already ran
//! (the short-circuiting one included) still fire, so a rejected request
//! still leaves with its security headers.
use http::{HeaderName, HeaderValue};

use crate::{
    request::IncomingRequest,
    response::{CommitWriter, Outcome, ResponseWriter},
};

/// Flow control returned by interceptor hooks.
#[derive(Debug)]
pub enum Flow {
    /// Keep going with the next hook (and eventually the handler).
    Proceed,
    /// The response has been fully decided; skip what remains of this phase.
    Done(Outcome),
}

/// A security module hooked around handler execution.
///
/// Both hooks default to [`Flow::Proceed`], so a module implements only the
/// phase it cares about.
pub trait Interceptor: Send + Sync + 'static {
    /// Runs before the handler. May mutate the request and writer, and may
    /// short-circuit by committing a response.
    fn before(&self, _w: &mut ResponseWriter, _req: &mut IncomingRequest) -> Flow {
        Flow::Proceed
    }

    /// Runs after the response is committed, strictly before it flushes.
    /// Header and cookie mutation only; the body is out of reach by
    /// construction. Returning [`Flow::Done`] stops the remaining Commit
    /// hooks but cannot un-commit the response.
    fn commit(&self, _w: &mut CommitWriter<'_>, _req: &IncomingRequest) -> Flow {
        Flow::Proceed
    }
}

// ===== Chain =====

/// Ordered interceptor list, immutable once the dispatcher is built.
pub(crate) struct Chain {
    list: Vec<Box<dyn Interceptor>>,
}

impl Chain {
    pub(crate) fn new(list: Vec<Box<dyn Interceptor>>) -> Self {
        Self { list }
    }

    /// Run the Before phase in order. Returns how many interceptors ran and
    /// the short-circuit outcome, if any.
    pub(crate) fn before(
        &self,
        w: &mut ResponseWriter,
        req: &mut IncomingRequest,
    ) -> (usize, Option<Outcome>) {
        for (ran, interceptor) in self.list.iter().enumerate() {
            if let Flow::Done(outcome) = interceptor.before(w, req) {
                return (ran + 1, Some(outcome));
            }
        }
        (self.list.len(), None)
    }

    /// Run the Commit phase over the first `ran` interceptors in order.
    pub(crate) fn commit(&self, ran: usize, w: &mut ResponseWriter, req: &IncomingRequest) {
        for interceptor in &self.list[..ran] {
            let mut commit = CommitWriter::new(w);
            if let Flow::Done(_) = interceptor.commit(&mut commit, req) {
                break;
            }
        }
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Chain").field(&self.list.len()).finish()
    }
}

// ===== StaticHeaders =====

/// Commit-phase interceptor installing fixed security headers when absent.
///
/// The default set is `X-Content-Type-Options: nosniff` and
/// `X-Frame-Options: SAMEORIGIN`. Handlers and earlier interceptors win:
/// a header that is already present is left alone.
#[derive(Debug)]
pub struct StaticHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl StaticHeaders {
    /// An empty set, for building a custom header list.
    pub fn empty() -> Self {
        Self { headers: Vec::new() }
    }

    /// Add a header to install.
    pub fn with(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }
}

impl Default for StaticHeaders {
    fn default() -> Self {
        Self::empty()
            .with(
                http::header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            )
            .with(
                http::header::X_FRAME_OPTIONS,
                HeaderValue::from_static("SAMEORIGIN"),
            )
    }
}

impl Interceptor for StaticHeaders {
    fn commit(&self, w: &mut CommitWriter<'_>, _req: &IncomingRequest) -> Flow {
        for (name, value) in &self.headers {
            if !w.headers().contains_key(name) {
                w.set_header(name.clone(), value.clone());
            }
        }
        Flow::Proceed
    }
}
