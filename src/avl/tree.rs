//! Copy-on-write AVL tree

use super::AvlComparator;
use std::cmp::{max, Ordering};
use std::sync::Arc;

type Link<T> = Option<Arc<AvlNode<T>>>;

#[derive(Clone, Debug)]
struct AvlNode<T> {
    value: T,
    height: u32,
    left: Link<T>,
    right: Link<T>,
}

impl<T> AvlNode<T> {
    fn leaf(value: T) -> Self {
        Self {
            value,
            height: 1,
            left: None,
            right: None,
        }
    }

    fn update_height(&mut self) {
        self.height = 1 + max(height(&self.left), height(&self.right));
    }

    fn balance(&self) -> i64 {
        height(&self.left) as i64 - height(&self.right) as i64
    }
}

fn height<T>(link: &Link<T>) -> u32 {
    link.as_ref().map_or(0, |node| node.height)
}

fn balance_of<T>(link: &Link<T>) -> i64 {
    link.as_ref().map_or(0, |node| node.balance())
}

/// An ordered set of values kept in a balanced tree with shared nodes.
///
/// Ordering is defined entirely by the comparators handed to each
/// operation; the tree never compares values itself.
#[derive(Clone, Debug)]
pub struct AvlTree<T> {
    root: Link<T>,
    len: usize,
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<T: Clone> AvlTree<T> {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a balanced tree from values already in comparator order.
    pub fn from_sorted(values: Vec<T>) -> Self {
        let len = values.len();
        let mut iter = values.into_iter();
        let root = Self::build(len, &mut iter);
        Self { root, len }
    }

    fn build(len: usize, iter: &mut impl Iterator<Item = T>) -> Link<T> {
        if len == 0 {
            return None;
        }
        let left_len = len / 2;
        let left = Self::build(left_len, iter);
        let value = iter.next()?;
        let right = Self::build(len - left_len - 1, iter);
        let mut node = AvlNode {
            value,
            height: 0,
            left,
            right,
        };
        node.update_height();
        Some(Arc::new(node))
    }

    /// Number of values in the tree
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree; an empty tree has height 0.
    pub fn height(&self) -> u32 {
        height(&self.root)
    }

    /// Find the value the comparator reports as equal.
    pub fn find<C: AvlComparator<T>>(&self, cmp: &mut C) -> Result<Option<&T>, C::Error> {
        let mut link = &self.root;
        while let Some(node) = link {
            match cmp.compare(&node.value)? {
                Ordering::Less => link = &node.left,
                Ordering::Greater => link = &node.right,
                Ordering::Equal => return Ok(Some(&node.value)),
            }
        }
        Ok(None)
    }

    /// Insert `value` at the position chosen by `cmp`, which must order the
    /// value being inserted. Returns false if an equal value is present.
    pub fn insert<C: AvlComparator<T>>(&mut self, value: T, cmp: &mut C) -> Result<bool, C::Error> {
        let inserted = Self::insert_at(&mut self.root, value, cmp)?;
        if inserted {
            self.len += 1;
        }
        Ok(inserted)
    }

    fn insert_at<C: AvlComparator<T>>(
        link: &mut Link<T>,
        value: T,
        cmp: &mut C,
    ) -> Result<bool, C::Error> {
        let node = match link {
            None => {
                *link = Some(Arc::new(AvlNode::leaf(value)));
                return Ok(true);
            }
            Some(node) => node,
        };

        let ord = cmp.compare(&node.value)?;
        let inserted = match ord {
            Ordering::Equal => return Ok(false),
            Ordering::Less => Self::insert_at(&mut Arc::make_mut(node).left, value, cmp)?,
            Ordering::Greater => Self::insert_at(&mut Arc::make_mut(node).right, value, cmp)?,
        };

        if inserted {
            Self::rebalance(link);
        }
        Ok(inserted)
    }

    /// Remove and return the value the comparator reports as equal.
    pub fn remove<C: AvlComparator<T>>(&mut self, cmp: &mut C) -> Result<Option<T>, C::Error> {
        let removed = Self::remove_at(&mut self.root, cmp)?;
        if removed.is_some() {
            self.len -= 1;
        }
        Ok(removed)
    }

    fn remove_at<C: AvlComparator<T>>(
        link: &mut Link<T>,
        cmp: &mut C,
    ) -> Result<Option<T>, C::Error> {
        let node = match link {
            None => return Ok(None),
            Some(node) => node,
        };

        let removed = match cmp.compare(&node.value)? {
            Ordering::Less => Self::remove_at(&mut Arc::make_mut(node).left, cmp)?,
            Ordering::Greater => Self::remove_at(&mut Arc::make_mut(node).right, cmp)?,
            Ordering::Equal => {
                let Some(owned) = link.take() else {
                    return Ok(None);
                };
                let AvlNode {
                    value, left, right, ..
                } = Self::unshare(owned);
                *link = match (left, right) {
                    (None, right) => right,
                    (left, None) => left,
                    (left, right) => {
                        let mut right = right;
                        match Self::remove_min(&mut right) {
                            Some(successor) => {
                                let mut node = AvlNode {
                                    value: successor,
                                    height: 0,
                                    left,
                                    right,
                                };
                                node.update_height();
                                Some(Arc::new(node))
                            }
                            None => left,
                        }
                    }
                };
                Some(value)
            }
        };

        if removed.is_some() {
            Self::rebalance(link);
        }
        Ok(removed)
    }

    fn remove_min(link: &mut Link<T>) -> Option<T> {
        let node = link.as_mut()?;
        if node.left.is_some() {
            let value = Self::remove_min(&mut Arc::make_mut(node).left);
            Self::rebalance(link);
            value
        } else {
            let owned = link.take()?;
            let AvlNode { value, right, .. } = Self::unshare(owned);
            *link = right;
            Some(value)
        }
    }

    fn unshare(node: Arc<AvlNode<T>>) -> AvlNode<T> {
        Arc::try_unwrap(node).unwrap_or_else(|shared| (*shared).clone())
    }

    fn rebalance(link: &mut Link<T>) {
        let balance = match link.as_mut() {
            None => return,
            Some(node) => {
                let node = Arc::make_mut(node);
                node.update_height();
                let balance = node.balance();
                if balance > 1 && balance_of(&node.left) < 0 {
                    Self::rotate_left(&mut node.left);
                } else if balance < -1 && balance_of(&node.right) > 0 {
                    Self::rotate_right(&mut node.right);
                }
                balance
            }
        };

        if balance > 1 {
            Self::rotate_right(link);
        } else if balance < -1 {
            Self::rotate_left(link);
        }
    }

    fn rotate_right(link: &mut Link<T>) {
        let Some(mut top) = link.take() else {
            return;
        };
        let node = Arc::make_mut(&mut top);
        let Some(mut pivot) = node.left.take() else {
            *link = Some(top);
            return;
        };
        let pivot_node = Arc::make_mut(&mut pivot);
        node.left = pivot_node.right.take();
        node.update_height();
        pivot_node.right = Some(top);
        pivot_node.update_height();
        *link = Some(pivot);
    }

    fn rotate_left(link: &mut Link<T>) {
        let Some(mut top) = link.take() else {
            return;
        };
        let node = Arc::make_mut(&mut top);
        let Some(mut pivot) = node.right.take() else {
            *link = Some(top);
            return;
        };
        let pivot_node = Arc::make_mut(&mut pivot);
        node.right = pivot_node.left.take();
        node.update_height();
        pivot_node.left = Some(top);
        pivot_node.update_height();
        *link = Some(pivot);
    }

    /// Cursor over every value in order.
    pub fn iter(&self) -> AvlCursor<T> {
        let mut cursor = AvlCursor { stack: Vec::new() };
        cursor.push_left(self.root.clone());
        cursor
    }

    /// Cursor positioned at the first value for which the comparator
    /// returns `Less` or `Equal`, i.e. the first value not before the key.
    pub fn lower_bound<C: AvlComparator<T>>(&self, cmp: &mut C) -> Result<AvlCursor<T>, C::Error> {
        let mut stack = Vec::new();
        let mut link = self.root.clone();
        while let Some(node) = link {
            match cmp.compare(&node.value)? {
                Ordering::Greater => link = node.right.clone(),
                Ordering::Less | Ordering::Equal => {
                    link = node.left.clone();
                    stack.push(node);
                }
            }
        }
        Ok(AvlCursor { stack })
    }

    /// First value in order
    pub fn first(&self) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        while let Some(left) = &node.left {
            node = left;
        }
        Some(&node.value)
    }

    /// Last value in order
    pub fn last(&self) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        while let Some(right) = &node.right {
            node = right;
        }
        Some(&node.value)
    }
}

/// In-order cursor over a tree snapshot.
///
/// The cursor holds references to the nodes it still has to visit, so it
/// keeps seeing the tree as it was when the cursor was created.
#[derive(Clone)]
pub struct AvlCursor<T> {
    stack: Vec<Arc<AvlNode<T>>>,
}

impl<T> AvlCursor<T> {
    fn push_left(&mut self, mut link: Link<T>) {
        while let Some(node) = link {
            link = node.left.clone();
            self.stack.push(node);
        }
    }

    /// Value the next call to `next` will return.
    pub fn peek(&self) -> Option<&T> {
        self.stack.last().map(|node| &node.value)
    }
}

impl<T: Clone> Iterator for AvlCursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let node = self.stack.pop()?;
        self.push_left(node.right.clone());
        Some(node.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avl::{infallible, KeyComparator};

    fn insert(tree: &mut AvlTree<u64>, value: u64) -> bool {
        infallible(tree.insert(value, &mut KeyComparator(&value)))
    }

    fn check_balanced(link: &Link<u64>) -> u32 {
        match link {
            None => 0,
            Some(node) => {
                let left = check_balanced(&node.left);
                let right = check_balanced(&node.right);
                assert!((left as i64 - right as i64).abs() <= 1, "unbalanced node {}", node.value);
                assert_eq!(node.height, 1 + left.max(right));
                1 + left.max(right)
            }
        }
    }

    fn scrambled(n: u64) -> Vec<u64> {
        // Multiplicative permutation of 0..n (n is prime below).
        (0..n).map(|i| (i * 7919) % n).collect()
    }

    #[test]
    fn test_insert_keeps_order_and_balance() {
        let mut tree = AvlTree::new();
        for value in scrambled(1009) {
            assert!(insert(&mut tree, value));
        }
        assert_eq!(tree.len(), 1009);
        check_balanced(&tree.root);
        let values: Vec<u64> = tree.iter().collect();
        assert_eq!(values, (0..1009).collect::<Vec<_>>());
    }

    #[test]
    fn test_duplicate_insert_refused() {
        let mut tree = AvlTree::new();
        assert!(insert(&mut tree, 5));
        assert!(!insert(&mut tree, 5));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut tree = AvlTree::new();
        for value in scrambled(1009) {
            insert(&mut tree, value);
        }
        for value in (0..1009).filter(|v| v % 3 == 0) {
            let removed = infallible(tree.remove(&mut KeyComparator(&value)));
            assert_eq!(removed, Some(value));
        }
        assert_eq!(infallible(tree.remove(&mut KeyComparator(&3))), None);
        check_balanced(&tree.root);
        let values: Vec<u64> = tree.iter().collect();
        let expected: Vec<u64> = (0..1009).filter(|v| v % 3 != 0).collect();
        assert_eq!(values, expected);
        assert_eq!(tree.len(), expected.len());
    }

    #[test]
    fn test_clone_is_isolated_snapshot() {
        let mut tree = AvlTree::new();
        for value in 0..100 {
            insert(&mut tree, value);
        }
        let snapshot = tree.clone();
        let cursor = tree.iter();
        for value in 100..200 {
            insert(&mut tree, value);
        }
        infallible(tree.remove(&mut KeyComparator(&50)));

        assert_eq!(snapshot.len(), 100);
        assert_eq!(snapshot.iter().count(), 100);
        assert_eq!(cursor.count(), 100);
        assert_eq!(tree.len(), 199);
    }

    #[test]
    fn test_lower_bound() {
        let mut tree = AvlTree::new();
        for value in (0..100).map(|v| v * 2) {
            insert(&mut tree, value);
        }
        let from: Vec<u64> = infallible(tree.lower_bound(&mut KeyComparator(&51)))
            .take(3)
            .collect();
        assert_eq!(from, vec![52, 54, 56]);
        let exact = infallible(tree.lower_bound(&mut KeyComparator(&52)));
        assert_eq!(exact.peek(), Some(&52));
        let past = infallible(tree.lower_bound(&mut KeyComparator(&500)));
        assert_eq!(past.count(), 0);
    }

    #[test]
    fn test_from_sorted() {
        let tree = AvlTree::from_sorted((0..1000u64).collect());
        assert_eq!(tree.len(), 1000);
        check_balanced(&tree.root);
        assert_eq!(tree.first(), Some(&0));
        assert_eq!(tree.last(), Some(&999));
        assert_eq!(infallible(tree.find(&mut KeyComparator(&345))), Some(&345));
    }
}
