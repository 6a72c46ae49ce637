//! Replacement of one scheduled send by a corrupt record.

use std::fmt;

use log::{debug, warn};

/// Where and what to inject during one handshake attempt.
///
/// After `countdown` legitimate scheduled sends, the next one is replaced by
/// a single payload pulled from `records`.
pub struct FaultPlan<'a> {
    countdown: usize,
    records: Box<dyn Iterator<Item = Vec<u8>> + 'a>,
}

impl<'a> FaultPlan<'a> {
    pub fn new<I>(countdown: usize, records: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: 'a,
    {
        Self {
            countdown,
            records: Box::new(records.into_iter()),
        }
    }

    pub fn countdown(&self) -> usize {
        self.countdown
    }
}

impl fmt::Debug for FaultPlan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultPlan")
            .field("countdown", &self.countdown)
            .finish_non_exhaustive()
    }
}

/// Consulted before every scheduled send of an attempt.
#[derive(Debug, Default)]
pub struct Injector<'a> {
    plan: Option<FaultPlan<'a>>,
    injected: bool,
}

impl<'a> Injector<'a> {
    pub fn new(plan: Option<FaultPlan<'a>>) -> Self {
        Self {
            plan,
            injected: false,
        }
    }

    /// Returns the bytes to send instead of the scheduled message, if this is
    /// the send the plan targets. Each call counts as one scheduled send.
    pub fn maybe_inject(&mut self) -> Option<Vec<u8>> {
        let plan = self.plan.as_mut()?;

        if plan.countdown > 0 {
            plan.countdown -= 1;
            return None;
        }

        let mut plan = self.plan.take()?;
        match plan.records.next() {
            Some(record) => {
                debug!("injecting {} corrupt bytes", record.len());
                self.injected = true;
                Some(record)
            }
            None => {
                warn!("corrupt record source is exhausted, nothing injected");
                None
            }
        }
    }

    /// Whether a corrupt record replaced a send.
    pub fn injected(&self) -> bool {
        self.injected
    }

    /// Whether the plan still has a send to replace.
    pub fn is_armed(&self) -> bool {
        self.plan.is_some()
    }
}
