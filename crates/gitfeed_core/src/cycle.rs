//! Per-cycle state shared with record handlers.
//!
//! Handlers receive a [`CycleContext`] and use it to defer work until a
//! category, or the whole cycle, has been applied. Tasks run in enqueue
//! order. Queues are cleared at cycle start and again once the cycle ends,
//! so nothing leaks from one cycle into the next.

use crate::category::Category;
use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// A deferred unit of work.
pub type DeferredTask = Box<dyn FnOnce() -> CoreResult<()> + Send>;

#[derive(Default)]
struct Queues {
    per_category: HashMap<Category, Vec<DeferredTask>>,
    finished: Vec<DeferredTask>,
    current: Option<Category>,
}

/// Deferred-task queues and the category being applied.
#[derive(Default)]
pub struct CycleContext {
    queues: Mutex<Queues>,
}

impl CycleContext {
    /// Creates a context with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the category currently being applied.
    pub fn current_category(&self) -> Option<Category> {
        self.queues.lock().current.clone()
    }

    /// Defers `task` until `category` has finished applying.
    ///
    /// Tasks for a category that already finished in this cycle never run.
    pub fn after_class_finished<F>(&self, category: impl Into<Category>, task: F)
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        self.queues
            .lock()
            .per_category
            .entry(category.into())
            .or_default()
            .push(Box::new(task));
    }

    /// Defers `task` until the category currently being applied has
    /// finished.
    ///
    /// # Errors
    ///
    /// Returns `NoCurrentCategory` outside of category application.
    pub fn after_current_class_finished<F>(&self, task: F) -> CoreResult<()>
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        let mut queues = self.queues.lock();
        let current = queues
            .current
            .clone()
            .ok_or(CoreError::NoCurrentCategory)?;
        queues
            .per_category
            .entry(current)
            .or_default()
            .push(Box::new(task));
        Ok(())
    }

    /// Defers `task` until every category has been applied.
    pub fn after_finished<F>(&self, task: F)
    where
        F: FnOnce() -> CoreResult<()> + Send + 'static,
    {
        self.queues.lock().finished.push(Box::new(task));
    }

    /// Marks `category` as the one being applied.
    pub fn begin_category(&self, category: &Category) {
        self.queues.lock().current = Some(category.clone());
    }

    /// Clears the current category.
    pub fn end_category(&self) {
        self.queues.lock().current = None;
    }

    /// Runs the tasks deferred for `category`, returning how many ran.
    ///
    /// Tasks enqueued while the queue drains run in the same call.
    pub fn run_category(&self, category: &Category) -> CoreResult<usize> {
        let mut ran = 0;
        loop {
            let batch = self
                .queues
                .lock()
                .per_category
                .remove(category)
                .unwrap_or_default();
            if batch.is_empty() {
                return Ok(ran);
            }
            for task in batch {
                task()?;
                ran += 1;
            }
        }
    }

    /// Runs the tasks deferred until cycle end, returning how many ran.
    pub fn run_finished(&self) -> CoreResult<usize> {
        let mut ran = 0;
        loop {
            let batch = std::mem::take(&mut self.queues.lock().finished);
            if batch.is_empty() {
                return Ok(ran);
            }
            for task in batch {
                task()?;
                ran += 1;
            }
        }
    }

    /// Returns the number of tasks waiting in all queues.
    pub fn pending(&self) -> usize {
        let queues = self.queues.lock();
        queues.per_category.values().map(Vec::len).sum::<usize>() + queues.finished.len()
    }

    /// Drops every queued task and the current category.
    pub fn clear(&self) {
        let mut queues = self.queues.lock();
        let dropped = queues.per_category.values().map(Vec::len).sum::<usize>()
            + queues.finished.len();
        if dropped > 0 {
            debug!(dropped, "discarding deferred tasks");
        }
        queues.per_category.clear();
        queues.finished.clear();
        queues.current = None;
    }
}

impl fmt::Debug for CycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CycleContext")
            .field("current", &self.current_category())
            .field("pending", &self.pending())
            .finish()
    }
}
