//! Read-only AST navigation with computed structural metrics.
//!
//! [`Navigator::new`] indexes an expression tree once into a flat arena:
//! each node gets a parent back-index, its depth (root = 0), its height
//! (leaf = 0), and the maximum id in its subtree. Traversals are lazy,
//! restartable iterators over the arena and never mutate the tree.

use std::collections::HashMap;

use crate::ast::{Expr, ExprId};

/// Default depth cap for navigator construction.
pub const DEFAULT_DEPTH_LIMIT: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigatorError {
    /// The tree is nested deeper than the configured cap.
    #[error("expression nesting exceeds depth limit of {limit}")]
    RecursionLimitExceeded { limit: u32 },
}

/// Visitation order for traversals.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraversalOrder {
    /// Self before children.
    Pre,
    /// Self after children.
    Post,
}

#[derive(Debug)]
struct Entry<'t> {
    expr: &'t Expr,
    parent: Option<usize>,
    depth: u32,
    height: u32,
    max_id: ExprId,
    children: Vec<usize>,
}

/// Indexed view over one AST.
#[derive(Debug)]
pub struct Navigator<'t> {
    entries: Vec<Entry<'t>>,
    by_id: HashMap<ExprId, usize>,
}

impl<'t> Navigator<'t> {
    pub fn new(root: &'t Expr) -> Result<Self, NavigatorError> {
        Self::with_depth_limit(root, DEFAULT_DEPTH_LIMIT)
    }

    pub fn with_depth_limit(root: &'t Expr, limit: u32) -> Result<Self, NavigatorError> {
        let mut entries: Vec<Entry<'t>> = Vec::new();
        let mut by_id = HashMap::new();

        let mut stack: Vec<(&'t Expr, Option<usize>, u32)> = vec![(root, None, 0)];
        while let Some((expr, parent, depth)) = stack.pop() {
            if depth > limit {
                return Err(NavigatorError::RecursionLimitExceeded { limit });
            }
            let index = entries.len();
            if let Some(p) = parent {
                entries[p].children.push(index);
            }
            by_id.insert(expr.id, index);
            entries.push(Entry {
                expr,
                parent,
                depth,
                height: 0,
                max_id: expr.id,
                children: Vec::new(),
            });
            // Reverse push keeps pop order left-to-right, so sibling
            // entries land in visitation order.
            for child in expr.children().into_iter().rev() {
                stack.push((child, Some(index), depth + 1));
            }
        }

        // Entries are in pre-order, so children always follow their parent;
        // a reverse sweep sees every child before its parent.
        for index in (0..entries.len()).rev() {
            let (height, max_id) = {
                let entry = &entries[index];
                let mut height = 0;
                let mut max_id = entry.expr.id;
                for &child in &entry.children {
                    height = height.max(entries[child].height + 1);
                    if entries[child].max_id > max_id {
                        max_id = entries[child].max_id;
                    }
                }
                (height, max_id)
            };
            entries[index].height = height;
            entries[index].max_id = max_id;
        }

        Ok(Self { entries, by_id })
    }

    pub fn root(&self) -> NavNode<'_, 't> {
        NavNode {
            nav: self,
            index: 0,
        }
    }

    pub fn find_by_id(&self, id: ExprId) -> Option<NavNode<'_, 't>> {
        self.by_id.get(&id).map(|&index| NavNode {
            nav: self,
            index,
        })
    }

    pub fn node_count(&self) -> usize {
        self.entries.len()
    }
}

/// One node of a navigated AST.
#[derive(Clone, Copy)]
pub struct NavNode<'n, 't> {
    nav: &'n Navigator<'t>,
    index: usize,
}

impl<'n, 't> NavNode<'n, 't> {
    fn entry(&self) -> &'n Entry<'t> {
        &self.nav.entries[self.index]
    }

    pub fn expr(&self) -> &'t Expr {
        self.entry().expr
    }

    pub fn id(&self) -> ExprId {
        self.entry().expr.id
    }

    /// Distance from the root; the root is 0.
    pub fn depth(&self) -> u32 {
        self.entry().depth
    }

    /// Longest downward path; leaves are 0.
    pub fn height(&self) -> u32 {
        self.entry().height
    }

    /// Largest id in this subtree.
    pub fn max_id(&self) -> ExprId {
        self.entry().max_id
    }

    pub fn parent(&self) -> Option<NavNode<'n, 't>> {
        self.entry().parent.map(|index| NavNode {
            nav: self.nav,
            index,
        })
    }

    /// Immediate children in normative visitation order.
    pub fn children(&self) -> impl Iterator<Item = NavNode<'n, 't>> + use<'n, 't> {
        let nav = self.nav;
        self.entry()
            .children
            .iter()
            .map(move |&index| NavNode { nav, index })
    }

    /// Lazy traversal of this subtree including self.
    pub fn all_nodes(&self, order: TraversalOrder) -> Traversal<'n, 't> {
        Traversal::new(self.nav, self.index, order)
    }

    /// Lazy traversal of this subtree excluding self.
    pub fn descendants(
        &self,
        order: TraversalOrder,
    ) -> impl Iterator<Item = NavNode<'n, 't>> + use<'n, 't> {
        let this = self.index;
        self.all_nodes(order).filter(move |n| n.index != this)
    }
}

impl std::fmt::Debug for NavNode<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavNode")
            .field("id", &self.id())
            .field("depth", &self.depth())
            .field("height", &self.height())
            .finish()
    }
}

/// Lazy pre- or post-order walk over a [`Navigator`] subtree.
pub struct Traversal<'n, 't> {
    nav: &'n Navigator<'t>,
    order: TraversalOrder,
    /// `(index, children_pushed)` frames; post-order re-visits frames.
    stack: Vec<(usize, bool)>,
}

impl<'n, 't> Traversal<'n, 't> {
    fn new(nav: &'n Navigator<'t>, start: usize, order: TraversalOrder) -> Self {
        Self {
            nav,
            order,
            stack: vec![(start, false)],
        }
    }
}

impl<'n, 't> Iterator for Traversal<'n, 't> {
    type Item = NavNode<'n, 't>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, expanded) = self.stack.pop()?;
            let children = &self.nav.entries[index].children;
            match self.order {
                TraversalOrder::Pre => {
                    for &child in children.iter().rev() {
                        self.stack.push((child, false));
                    }
                    return Some(NavNode {
                        nav: self.nav,
                        index,
                    });
                }
                TraversalOrder::Post => {
                    if expanded {
                        return Some(NavNode {
                            nav: self.nav,
                            index,
                        });
                    }
                    self.stack.push((index, true));
                    for &child in children.iter().rev() {
                        self.stack.push((child, false));
                    }
                }
            }
        }
    }
}
