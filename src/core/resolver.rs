//! Prerequisite expansion.
//!
//! Depth-first over the store's recipe arena, prerequisites before the recipe
//! itself. Each recipe is tracked by its index in the store with a three-state
//! mark; the current expansion path is a stack of indices, so a cycle is
//! reported as the exact chain of names that closes the loop.

use super::error::ResolutionError;
use super::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Resolve the ordered, deduplicated list of recipes to run for `root`.
/// The root is always last.
pub fn resolve<'a>(store: &'a RecipeStore, root: &str) -> Result<Vec<&'a Recipe>, ResolutionError> {
    let root_index = store
        .recipes
        .get_index_of(root)
        .ok_or_else(|| ResolutionError::UnknownRecipe {
            name: root.to_string(),
            required_by: None,
        })?;

    let mut walk = Walk {
        store,
        marks: vec![Mark::Unvisited; store.recipes.len()],
        path: Vec::new(),
        order: Vec::new(),
    };
    walk.visit(root_index)?;

    let order: Vec<&Recipe> = walk
        .order
        .iter()
        .filter_map(|&i| store.recipes.get_index(i).map(|(_, r)| r))
        .collect();
    tracing::debug!(
        root,
        order = ?order.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        "resolved prerequisites"
    );
    Ok(order)
}

/// Resolve every recipe in the store and collect all distinct errors.
/// An empty list means every prerequisite exists and the graph is acyclic.
pub fn validate(store: &RecipeStore) -> Vec<ResolutionError> {
    let mut errors: Vec<ResolutionError> = Vec::new();
    for name in store.recipes.keys() {
        if let Err(e) = resolve(store, name) {
            let seen = errors.iter().any(|existing| same_problem(existing, &e));
            if !seen {
                errors.push(e);
            }
        }
    }
    errors
}

/// Two errors describe the same problem (cycles compare as rotations).
fn same_problem(a: &ResolutionError, b: &ResolutionError) -> bool {
    match (a, b) {
        (ResolutionError::Cycle { chain: x }, ResolutionError::Cycle { chain: y }) => {
            let ring_x = &x[..x.len().saturating_sub(1)];
            let ring_y = &y[..y.len().saturating_sub(1)];
            ring_x.len() == ring_y.len()
                && (0..ring_x.len()).any(|shift| {
                    ring_x
                        .iter()
                        .cycle()
                        .skip(shift)
                        .take(ring_x.len())
                        .eq(ring_y.iter())
                })
        }
        _ => a == b,
    }
}

struct Walk<'a> {
    store: &'a RecipeStore,
    marks: Vec<Mark>,
    /// Recipes being expanded, each with the index of its next prerequisite
    path: Vec<(usize, usize)>,
    order: Vec<usize>,
}

impl Walk<'_> {
    /// Depth-first post-order from `root`, driven by `path` rather than
    /// recursion so long prerequisite chains cannot exhaust the stack.
    fn visit(&mut self, root: usize) -> Result<(), ResolutionError> {
        if self.marks[root] == Mark::Done {
            return Ok(());
        }
        self.marks[root] = Mark::OnPath;
        self.path.push((root, 0));

        let store = self.store;
        while let Some(top) = self.path.last_mut() {
            let (index, cursor) = *top;
            top.1 += 1;

            let prereq = store
                .recipes
                .get_index(index)
                .and_then(|(name, recipe)| Some((name, recipe.prerequisites.get(cursor)?)));
            let Some((name, prereq)) = prereq else {
                self.path.pop();
                self.marks[index] = Mark::Done;
                self.order.push(index);
                continue;
            };

            let next = store.recipes.get_index_of(prereq).ok_or_else(|| {
                ResolutionError::UnknownRecipe {
                    name: prereq.clone(),
                    required_by: Some(name.clone()),
                }
            })?;
            match self.marks[next] {
                Mark::Done => {}
                Mark::OnPath => return Err(self.cycle(next)),
                Mark::Unvisited => {
                    self.marks[next] = Mark::OnPath;
                    self.path.push((next, 0));
                }
            }
        }
        Ok(())
    }

    /// The chain from the first occurrence of `index` on the path back to it.
    fn cycle(&self, index: usize) -> ResolutionError {
        let start = self.path.iter().position(|&(i, _)| i == index).unwrap_or(0);
        let chain = self.path[start..]
            .iter()
            .map(|&(i, _)| i)
            .chain(std::iter::once(index))
            .filter_map(|i| self.store.recipes.get_index(i).map(|(n, _)| n.clone()))
            .collect();
        ResolutionError::Cycle { chain }
    }
}
