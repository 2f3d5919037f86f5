//! Breadth-first walk over a process instance's execution tree

use pim_model::ElementInstance;
use pim_state::{ElementInstanceState, StateError};
use std::collections::{HashSet, VecDeque};

/// Visit `root` and every element instance below it, parents before children
///
/// Iterative: one pending queue, dequeue, visit, enqueue direct children.
/// Stops at the first error `visit` returns. Returns the number of visited
/// element instances.
///
/// # Errors
/// Whatever `visit` returns, or [`StateError::CyclicExecutionTree`] if an
/// element instance is reached twice.
pub fn traverse<'s, S, E>(
    state: &'s S,
    root: &'s ElementInstance,
    mut visit: impl FnMut(&'s ElementInstance) -> Result<(), E>,
) -> Result<usize, E>
where
    S: ElementInstanceState + ?Sized,
    E: From<StateError>,
{
    let mut pending = VecDeque::from([root]);
    let mut visited = HashSet::new();

    while let Some(instance) = pending.pop_front() {
        if !visited.insert(instance.key) {
            return Err(StateError::CyclicExecutionTree(instance.key).into());
        }
        tracing::trace!(
            element_instance_key = %instance.key,
            element_id = %instance.element_id,
            "Visiting element instance"
        );
        visit(instance)?;
        pending.extend(state.children(instance.key));
    }

    Ok(visited.len())
}
