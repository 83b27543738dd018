//! Result delivery
//!
//! Every execution produces exactly one final delivery. The one exception is
//! `CacheThenNetwork` with a cached entry present, which first delivers the
//! cached payload and then the network result.

use std::fmt;
use std::marker::PhantomData;

use tokio::sync::mpsc;

use crate::cache::{CachedPayload, Record};

use super::errors::{ExecError, ExecResult};

/// Where a delivered result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Network,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Network => "network",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One result handed back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<T> {
    pub source: Source,
    pub result: ExecResult<T>,
}

impl<T> Delivery<T> {
    pub fn new(source: Source, result: ExecResult<T>) -> Self {
        Self { source, result }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl Delivery<CachedPayload> {
    fn into_shape<T: ResultShape>(self) -> Delivery<T> {
        Delivery {
            source: self.source,
            result: self.result.and_then(T::from_payload),
        }
    }
}

/// Typed view of a `CachedPayload`
pub trait ResultShape: Sized + Send + 'static {
    /// Name of the payload variant this shape expects
    const EXPECTED: &'static str;

    fn from_payload(payload: CachedPayload) -> ExecResult<Self>;
}

fn mismatch<T: ResultShape>(payload: &CachedPayload) -> ExecError {
    ExecError::PayloadMismatch {
        expected: T::EXPECTED,
        found: payload.type_name(),
    }
}

impl ResultShape for Vec<Record> {
    const EXPECTED: &'static str = "records";

    fn from_payload(payload: CachedPayload) -> ExecResult<Self> {
        match payload {
            CachedPayload::Records(records) => Ok(records),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ResultShape for Record {
    const EXPECTED: &'static str = "record";

    fn from_payload(payload: CachedPayload) -> ExecResult<Self> {
        match payload {
            CachedPayload::Record(record) => Ok(record),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl ResultShape for u64 {
    const EXPECTED: &'static str = "count";

    fn from_payload(payload: CachedPayload) -> ExecResult<Self> {
        match payload {
            CachedPayload::Count(n) => Ok(n),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// Receiving end of a background execution
pub struct Deliveries<T> {
    rx: mpsc::UnboundedReceiver<Delivery<CachedPayload>>,
    _shape: PhantomData<fn() -> T>,
}

impl<T: ResultShape> Deliveries<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Delivery<CachedPayload>>) -> Self {
        Self {
            rx,
            _shape: PhantomData,
        }
    }

    /// Waits for the next delivery; `None` once the execution has finished
    pub async fn next(&mut self) -> Option<Delivery<T>> {
        self.rx.recv().await.map(Delivery::into_shape)
    }

    /// Waits for the execution to finish and returns every delivery in order
    pub async fn collect(mut self) -> Vec<Delivery<T>> {
        let mut all = Vec::new();
        while let Some(delivery) = self.next().await {
            all.push(delivery);
        }
        all
    }

    /// Waits for the execution to finish and returns the final delivery
    pub async fn last(self) -> Option<Delivery<T>> {
        self.collect().await.pop()
    }
}
