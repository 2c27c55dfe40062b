//! Lazy, closeable result streams
//!
//! A stream starts pending: nothing is read until the first item is pulled.
//! Pulling runs the deferred opener once; closing drops whatever the stream
//! holds, including child streams.

use std::fmt;
use std::iter;
use std::mem;

use crate::query::{QueryError, QueryResult};

type Items<T> = Box<dyn Iterator<Item = QueryResult<T>> + Send>;
type Opener<T> = Box<dyn FnOnce() -> QueryResult<Items<T>> + Send>;

enum State<T> {
    Pending(Opener<T>),
    Open(Items<T>),
    Closed,
}

/// Iterator of query results with explicit pending/open/closed states.
pub struct ResultStream<T> {
    state: State<T>,
}

impl<T: Send + 'static> ResultStream<T> {
    /// Stream whose items come from `open`, run on the first pull
    pub fn lazy<F, I>(open: F) -> Self
    where
        F: FnOnce() -> QueryResult<I> + Send + 'static,
        I: Iterator<Item = QueryResult<T>> + Send + 'static,
    {
        let opener: Opener<T> = Box::new(move || open().map(|items| Box::new(items) as Items<T>));
        Self {
            state: State::Pending(opener),
        }
    }

    /// Stream over already materialized items
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            state: State::Open(Box::new(items.into_iter().map(Ok))),
        }
    }

    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Stream that yields a single error
    pub fn failed(err: QueryError) -> Self {
        Self {
            state: State::Open(Box::new(iter::once(Err(err)))),
        }
    }

    /// Lazily transforms each item
    pub fn map_items<U, F>(self, mut f: F) -> ResultStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        ResultStream::lazy(move || Ok(Iterator::map(self, move |item| item.map(&mut f))))
    }

    /// Drains the stream into a vector, stopping at the first error
    pub fn to_list(mut self) -> QueryResult<Vec<T>> {
        let mut out = Vec::new();
        for item in &mut self {
            out.push(item?);
        }
        Ok(out)
    }
}

impl<T> ResultStream<T> {
    /// True until the first pull
    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Releases the underlying reader. Idempotent.
    pub fn close(&mut self) {
        self.state = State::Closed;
    }
}

impl<T> Iterator for ResultStream<T> {
    type Item = QueryResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match mem::replace(&mut self.state, State::Closed) {
                State::Pending(open) => match open() {
                    Ok(items) => self.state = State::Open(items),
                    Err(e) => return Some(Err(e)),
                },
                State::Open(mut items) => {
                    let next = items.next();
                    if next.is_some() {
                        self.state = State::Open(items);
                    }
                    return next;
                }
                State::Closed => return None,
            }
        }
    }
}

impl<T> fmt::Debug for ResultStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Pending(_) => "pending",
            State::Open(_) => "open",
            State::Closed => "closed",
        };
        f.debug_struct("ResultStream").field("state", &state).finish()
    }
}
