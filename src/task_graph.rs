//! Dependency-graph executor for multi-step flows.
//!
//! A graph is a set of named steps, each declaring the steps it depends on. Steps whose
//! dependencies have all completed run concurrently on the calling task; a step only ever sees
//! the results of its own dependencies. The first failing step stops scheduling: steps already
//! in flight are driven to completion and their results dropped, and the failure is returned.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt as _};
use futures::stream::{FuturesUnordered, StreamExt as _};
use thiserror::Error;

type Value = Arc<dyn Any + Send + Sync>;
type StepFn<'a, E> = Box<dyn FnOnce(StepResults) -> BoxFuture<'a, Result<Value, E>> + Send + 'a>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate step `{0}`")]
    DuplicateStep(&'static str),

    #[error("step `{step}` depends on unknown step `{dependency}`")]
    UnknownDependency {
        step: &'static str,
        dependency: &'static str,
    },

    #[error("dependency cycle involving step `{0}`")]
    Cycle(&'static str),

    #[error("no result for step `{0}`")]
    MissingResult(&'static str),

    #[error("result of step `{0}` has an unexpected type")]
    TypeMismatch(&'static str),

    #[error("result of step `{0}` is still shared")]
    SharedResult(&'static str),
}

/// Results keyed by step name.
#[derive(Clone, Default)]
pub struct StepResults {
    values: HashMap<&'static str, Value>,
}

impl StepResults {
    pub fn get<T: Any + Send + Sync>(&self, step: &'static str) -> Result<&T, GraphError> {
        let value = self
            .values
            .get(step)
            .ok_or(GraphError::MissingResult(step))?;
        (**value)
            .downcast_ref::<T>()
            .ok_or(GraphError::TypeMismatch(step))
    }

    /// Moves a result out. Only valid once the graph has finished and no step holds a copy.
    pub fn take<T: Any + Send + Sync>(&mut self, step: &'static str) -> Result<T, GraphError> {
        let value = self
            .values
            .remove(step)
            .ok_or(GraphError::MissingResult(step))?;
        let value = value
            .downcast::<T>()
            .map_err(|_| GraphError::TypeMismatch(step))?;
        Arc::try_unwrap(value).map_err(|_| GraphError::SharedResult(step))
    }

    pub fn contains(&self, step: &str) -> bool {
        self.values.contains_key(step)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn subset(&self, steps: &[&'static str]) -> Self {
        let values = steps
            .iter()
            .filter_map(|s| self.values.get(s).map(|v| (*s, v.clone())))
            .collect();
        Self { values }
    }
}

struct Step<'a, E> {
    deps: Vec<&'static str>,
    run: StepFn<'a, E>,
}

pub struct TaskGraph<'a, E> {
    steps: BTreeMap<&'static str, Step<'a, E>>,
    invalid: Option<GraphError>,
}

impl<'a, E> Default for TaskGraph<'a, E>
where
    E: From<GraphError> + Send + 'a,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, E> TaskGraph<'a, E>
where
    E: From<GraphError> + Send + 'a,
{
    pub fn new() -> Self {
        Self {
            steps: BTreeMap::new(),
            invalid: None,
        }
    }

    /// Adds a step. `compute` receives the results of `deps` only.
    pub fn step<T, F, Fut>(mut self, name: &'static str, deps: &[&'static str], compute: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(StepResults) -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        if self.steps.contains_key(name) {
            self.invalid.get_or_insert(GraphError::DuplicateStep(name));
            return self;
        }

        let run: StepFn<'a, E> = Box::new(move |inputs| {
            async move { compute(inputs).await.map(|v| Arc::new(v) as Value) }.boxed()
        });
        self.steps.insert(
            name,
            Step {
                deps: deps.to_vec(),
                run,
            },
        );
        self
    }

    fn validate(&self) -> Result<(), GraphError> {
        if let Some(err) = &self.invalid {
            return Err(err.clone());
        }

        for (name, step) in &self.steps {
            for dep in &step.deps {
                if !self.steps.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        step: *name,
                        dependency: *dep,
                    });
                }
            }
        }

        // Kahn's algorithm; whatever is left with unmet dependencies sits on a cycle.
        let mut pending: HashMap<&'static str, usize> = self
            .steps
            .iter()
            .map(|(name, step)| (*name, step.deps.len()))
            .collect();
        let mut ready: Vec<&'static str> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut visited = 0;
        while let Some(done) = ready.pop() {
            visited += 1;
            for (name, step) in &self.steps {
                if step.deps.contains(&done)
                    && let Some(n) = pending.get_mut(name)
                {
                    *n -= step.deps.iter().filter(|d| **d == done).count();
                    if *n == 0 {
                        ready.push(*name);
                    }
                }
            }
        }

        if visited < self.steps.len() {
            let stuck = pending
                .iter()
                .filter(|(_, n)| **n > 0)
                .map(|(name, _)| *name)
                .min()
                .unwrap_or("<unknown>");
            return Err(GraphError::Cycle(stuck));
        }
        Ok(())
    }

    /// Runs every step to completion, or until the first failure.
    pub async fn run(self) -> Result<StepResults, E> {
        self.validate()?;

        let mut pending = self.steps;
        let mut completed = StepResults::default();
        let mut in_flight = FuturesUnordered::new();

        loop {
            let eligible: Vec<&'static str> = pending
                .iter()
                .filter(|(_, step)| step.deps.iter().all(|d| completed.contains(d)))
                .map(|(name, _)| *name)
                .collect();

            for name in eligible {
                let Some(step) = pending.remove(name) else {
                    continue;
                };
                let inputs = completed.subset(&step.deps);
                let fut = (step.run)(inputs);
                in_flight.push(async move { (name, fut.await) });
            }

            let Some((name, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(value) => {
                    completed.values.insert(name, value);
                }
                Err(err) => {
                    tracing::debug!(
                        step = name,
                        skipped = pending.len(),
                        "task graph step failed"
                    );
                    while in_flight.next().await.is_some() {}
                    return Err(err);
                }
            }
        }

        debug_assert!(pending.is_empty());
        Ok(completed)
    }
}
