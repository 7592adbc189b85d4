//! Nested groupings of values.
//!
//! A [`Tree`] addresses subsystems (`Tree<KetSpace>`) and carries values that
//! run parallel to them, such as control keys or measured outcomes. All
//! traversals are depth-first, left to right.

use crate::core::errors::TreeError;

/// A leaf value or an ordered list of subtrees.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tree<T> {
    Leaf(T),
    Node(Vec<Tree<T>>),
}

impl<T> Tree<T> {
    pub fn leaf(value: T) -> Self {
        Tree::Leaf(value)
    }

    pub fn node(children: impl IntoIterator<Item = Tree<T>>) -> Self {
        Tree::Node(children.into_iter().collect())
    }

    /// A one-level node whose children are all leaves.
    pub fn flat(values: impl IntoIterator<Item = T>) -> Self {
        Tree::Node(values.into_iter().map(Tree::Leaf).collect())
    }

    /// Children of a node, `None` for a leaf.
    pub fn children(&self) -> Option<&[Tree<T>]> {
        match self {
            Tree::Leaf(_) => None,
            Tree::Node(children) => Some(children),
        }
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        match self {
            Tree::Leaf(_) => 1,
            Tree::Node(children) => children.iter().map(Tree::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Leaves in depth-first order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut leaves = Vec::with_capacity(self.len());
        self.collect_refs(&mut leaves);
        leaves.into_iter()
    }
    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            Tree::Leaf(value) => out.push(value),
            Tree::Node(children) => children.iter().for_each(|c| c.collect_refs(out)),
        }
    }

    /// Same nesting, every leaf replaced by `f(leaf)`.
    pub fn map<U>(&self, f: &mut impl FnMut(&T) -> U) -> Tree<U> {
        match self {
            Tree::Leaf(value) => Tree::Leaf(f(value)),
            Tree::Node(children) => Tree::Node(children.iter().map(|c| c.map(f)).collect()),
        }
    }

    /// Walks `self` and `other` in lock-step and pairs up their leaves.
    ///
    /// # Arguments
    ///
    /// * `other` - A tree with exactly the same nesting as `self`.
    ///
    /// # Returns
    ///
    /// One `(self leaf, other leaf)` pair per leaf position, depth-first.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::ShapeMismatch` if a leaf meets a node or two nodes
    /// have a different number of children.
    pub fn zip_flatten<'a, U>(
        &'a self,
        other: &'a Tree<U>,
    ) -> Result<Vec<(&'a T, &'a U)>, TreeError> {
        let mut pairs = Vec::with_capacity(self.len());
        zip_into(self, other, &mut pairs)?;
        Ok(pairs)
    }

    /// Re-nests `values` into the shape of `self`.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::LengthMismatch` unless `values` yields exactly as
    /// many items as `self` has leaves.
    pub fn restore<U>(&self, values: impl IntoIterator<Item = U>) -> Result<Tree<U>, TreeError> {
        let values: Vec<U> = values.into_iter().collect();
        let expected = self.len();
        let got = values.len();
        if got != expected {
            return Err(TreeError::LengthMismatch { expected, got });
        }
        self.restore_from(&mut values.into_iter())
            .ok_or(TreeError::LengthMismatch { expected, got })
    }

    fn restore_from<U>(&self, values: &mut impl Iterator<Item = U>) -> Option<Tree<U>> {
        match self {
            Tree::Leaf(_) => values.next().map(Tree::Leaf),
            Tree::Node(children) => children
                .iter()
                .map(|c| c.restore_from(values))
                .collect::<Option<Vec<_>>>()
                .map(Tree::Node),
        }
    }
}

impl<T: Clone> Tree<T> {
    /// Leaves in depth-first order, cloned.
    pub fn flatten(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> From<T> for Tree<T> {
    fn from(value: T) -> Self {
        Tree::Leaf(value)
    }
}

fn zip_into<'a, T, U>(
    a: &'a Tree<T>,
    b: &'a Tree<U>,
    out: &mut Vec<(&'a T, &'a U)>,
) -> Result<(), TreeError> {
    match (a, b) {
        (Tree::Leaf(x), Tree::Leaf(y)) => {
            out.push((x, y));
            Ok(())
        }
        (Tree::Node(xs), Tree::Node(ys)) if xs.len() == ys.len() => {
            for (x, y) in xs.iter().zip(ys) {
                zip_into(x, y, out)?;
            }
            Ok(())
        }
        _ => Err(TreeError::ShapeMismatch),
    }
}

/// Lock-step traversal over any number of trees of the same leaf type.
///
/// Yields one row per leaf position, holding that leaf from every tree.
pub fn zip_flatten_all<'a, T>(trees: &[&'a Tree<T>]) -> Result<Vec<Vec<&'a T>>, TreeError> {
    let Some((first, rest)) = trees.split_first() else {
        return Ok(Vec::new());
    };
    let mut rows: Vec<Vec<&T>> = first.iter().map(|x| vec![x]).collect();
    for tree in rest {
        for (row, (_, value)) in rows.iter_mut().zip(first.zip_flatten(tree)?) {
            row.push(value);
        }
    }
    Ok(rows)
}
