//! Assembles the flat, creation-ordered comment rows of one idea into a
//! forest of reply trees.
//!
//! Building is two linear passes over an index arena: the first maps every
//! id to its slot, the second links each slot to its parent's child list.
//! Nodes are then assembled bottom-up with an explicit stack, so thread depth
//! never touches the call stack.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::mem;

use uuid::Uuid;

use crate::{Comment, CommentWithAuthor};

/// Replies are offered to nodes shallower than this. The tree itself is
/// always built to full depth.
pub const MAX_REPLY_DEPTH: usize = 3;

pub fn can_reply(depth: usize) -> bool {
    depth < MAX_REPLY_DEPTH
}

/// A record that can be placed in a reply tree.
pub trait Threaded {
    fn id(&self) -> Uuid;
    fn parent_id(&self) -> Option<Uuid>;
}

impl Threaded for Comment {
    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }
}

impl Threaded for CommentWithAuthor {
    fn id(&self) -> Uuid {
        self.comment.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.comment.parent_id
    }
}

/// One comment with its replies, in input order. Never serialized as is:
/// see [`crate::CommentThread`] for the wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentTree<T> {
    pub comment: T,
    pub replies: Vec<CommentTree<T>>,
}

impl<T> CommentTree<T> {
    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&CommentTree<T>> = vec![self];
        while let Some(node) = stack.pop() {
            count += node.replies.len();
            stack.extend(node.replies.iter());
        }
        count
    }
}

// Unlinks children before they drop so that a very deep thread is freed
// without recursing once per level.
impl<T> Drop for CommentTree<T> {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// Output of [`build_comment_tree`].
#[derive(Debug, Clone, PartialEq)]
pub struct CommentForest<T> {
    pub roots: Vec<CommentTree<T>>,
    /// Records left out of the tree because their parent chain does not reach
    /// a root, in input order.
    pub orphans: Vec<Uuid>,
}

impl<T> CommentForest<T> {
    /// Nodes in the forest, roots and replies alike.
    pub fn total(&self) -> usize {
        self.roots.len()
            + self
                .roots
                .iter()
                .map(CommentTree::descendant_count)
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Pre-order walk yielding each node with its depth (roots are 0).
    pub fn iter_depth_first(&self) -> DepthFirst<'_, T> {
        DepthFirst {
            stack: self.roots.iter().rev().map(|root| (0, root)).collect(),
        }
    }
}

pub struct DepthFirst<'a, T> {
    stack: Vec<(usize, &'a CommentTree<T>)>,
}

impl<'a, T> Iterator for DepthFirst<'a, T> {
    type Item = (usize, &'a CommentTree<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.replies.iter().rev().map(|reply| (depth + 1, reply)));
        Some((depth, node))
    }
}

/// Builds the reply forest for one idea's comments.
///
/// Input order is authoritative: roots and every reply list keep it. A record
/// whose parent is missing (or whose ancestry loops) is reported in
/// [`CommentForest::orphans`] instead of being placed, and so are its
/// descendants. When an id repeats, the first record wins.
pub fn build_comment_tree<T, I>(records: I) -> CommentForest<T>
where
    T: Threaded,
    I: IntoIterator<Item = T>,
{
    let records: Vec<T> = records.into_iter().collect();
    let n = records.len();

    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(n);
    let mut duplicate = vec![false; n];
    for (pos, record) in records.iter().enumerate() {
        match index.entry(record.id()) {
            Entry::Vacant(slot) => {
                slot.insert(pos);
            }
            Entry::Occupied(_) => duplicate[pos] = true,
        }
    }

    let mut roots: Vec<usize> = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (pos, record) in records.iter().enumerate() {
        if duplicate[pos] {
            continue;
        }
        match record.parent_id() {
            None => roots.push(pos),
            Some(parent) => {
                if let Some(&parent_pos) = index.get(&parent) {
                    children[parent_pos].push(pos);
                }
            }
        }
    }

    let mut slots: Vec<Option<T>> = records.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentTree<T>>> = (0..n).map(|_| None).collect();

    // Post-order: a node is assembled only after all of its replies.
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&pos| (pos, false)).collect();
    while let Some((pos, expanded)) = stack.pop() {
        if expanded {
            let replies = children[pos]
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            if let Some(comment) = slots[pos].take() {
                built[pos] = Some(CommentTree { comment, replies });
            }
        } else {
            stack.push((pos, true));
            stack.extend(children[pos].iter().rev().map(|&child| (child, false)));
        }
    }

    let roots = roots.iter().filter_map(|&pos| built[pos].take()).collect();
    let orphans = slots.into_iter().flatten().map(|record| record.id()).collect();

    CommentForest { roots, orphans }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn comment(n: u128, parent: Option<u128>) -> Comment {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(n as i64);
        Comment {
            id: id(n),
            idea_id: id(1000),
            user_id: id(2000),
            parent_id: parent.map(id),
            content: format!("comment {n}"),
            created_at: at,
            updated_at: at,
        }
    }

    /// (id, replies) shape of a forest, for compact assertions.
    #[derive(Debug, PartialEq)]
    struct Shape(u128, Vec<Shape>);

    fn shape(nodes: &[CommentTree<Comment>]) -> Vec<Shape> {
        nodes
            .iter()
            .map(|node| Shape(node.comment.id.as_u128(), shape(&node.replies)))
            .collect()
    }

    #[test]
    fn empty_input_gives_empty_forest() {
        let forest = build_comment_tree(Vec::<Comment>::new());
        assert!(forest.is_empty());
        assert_eq!(forest.total(), 0);
        assert!(forest.orphans.is_empty());
    }

    #[test]
    fn missing_parent_is_dropped() {
        let forest = build_comment_tree(vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, None),
            comment(4, Some(99)),
        ]);

        assert_eq!(
            shape(&forest.roots),
            vec![Shape(1, vec![Shape(2, vec![])]), Shape(3, vec![])]
        );
        assert_eq!(forest.total(), 3);
        assert_eq!(forest.orphans, vec![id(4)]);
    }

    #[test]
    fn roots_and_replies_keep_input_order() {
        let forest = build_comment_tree(vec![
            comment(5, None),
            comment(1, None),
            comment(9, Some(5)),
            comment(3, Some(5)),
            comment(7, Some(1)),
            comment(2, Some(5)),
        ]);

        assert_eq!(
            shape(&forest.roots),
            vec![
                Shape(5, vec![Shape(9, vec![]), Shape(3, vec![]), Shape(2, vec![])]),
                Shape(1, vec![Shape(7, vec![])]),
            ]
        );
    }

    #[test]
    fn reply_listed_before_its_parent_is_still_linked() {
        let forest = build_comment_tree(vec![comment(2, Some(1)), comment(1, None)]);
        assert_eq!(shape(&forest.roots), vec![Shape(1, vec![Shape(2, vec![])])]);
        assert!(forest.orphans.is_empty());
    }

    #[test]
    fn descendants_of_an_orphan_are_dropped_too() {
        let forest = build_comment_tree(vec![
            comment(1, None),
            comment(2, Some(50)),
            comment(3, Some(2)),
            comment(4, Some(3)),
        ]);
        assert_eq!(forest.total(), 1);
        assert_eq!(forest.orphans, vec![id(2), id(3), id(4)]);
    }

    #[test]
    fn parent_cycles_and_self_parents_never_reach_the_tree() {
        let forest = build_comment_tree(vec![
            comment(1, Some(2)),
            comment(2, Some(1)),
            comment(3, Some(3)),
            comment(4, None),
        ]);
        assert_eq!(shape(&forest.roots), vec![Shape(4, vec![])]);
        assert_eq!(forest.orphans, vec![id(1), id(2), id(3)]);
    }

    #[test]
    fn first_record_wins_on_duplicate_ids() {
        let mut dup = comment(1, None);
        dup.content = "second copy".into();
        let forest = build_comment_tree(vec![comment(1, None), comment(2, Some(1)), dup]);

        assert_eq!(forest.roots.len(), 1);
        assert_eq!(forest.roots[0].comment.content, "comment 1");
        assert_eq!(forest.roots[0].replies.len(), 1);
        assert_eq!(forest.orphans, vec![id(1)]);
    }

    #[test]
    fn deep_thread_builds_walks_and_drops_without_recursion() {
        let depth = 100_000u128;
        let records = (1..=depth).map(|n| comment(n, if n == 1 { None } else { Some(n - 1) }));
        let forest = build_comment_tree(records);

        assert_eq!(forest.roots.len(), 1);
        assert_eq!(forest.total(), depth as usize);
        let deepest = forest.iter_depth_first().map(|(d, _)| d).max();
        assert_eq!(deepest, Some(depth as usize - 1));
    }

    #[test]
    fn depth_first_walk_reports_depths() {
        let forest = build_comment_tree(vec![
            comment(1, None),
            comment(2, Some(1)),
            comment(3, Some(2)),
            comment(4, Some(3)),
            comment(5, None),
        ]);
        let walk: Vec<(usize, u128)> = forest
            .iter_depth_first()
            .map(|(depth, node)| (depth, node.comment.id.as_u128()))
            .collect();
        assert_eq!(walk, vec![(0, 1), (1, 2), (2, 3), (3, 4), (0, 5)]);

        let replyable: Vec<bool> = walk.iter().map(|(depth, _)| can_reply(*depth)).collect();
        assert_eq!(replyable, vec![true, true, true, false, true]);
    }

    #[test]
    fn node_count_matches_resolvable_records() {
        // Deterministic pseudo-random comment sets with dangling parents.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..50 {
            let len = (next() % 40) as u128;
            let records: Vec<Comment> = (1..=len)
                .map(|n| {
                    let parent = match next() % 4 {
                        0 => None,
                        1 => Some(500 + next() as u128 % 10),
                        _ => Some(1 + next() as u128 % len),
                    };
                    comment(n, parent)
                })
                .collect();

            let parents: HashMap<Uuid, Option<Uuid>> =
                records.iter().map(|c| (c.id, c.parent_id)).collect();
            let resolvable = records
                .iter()
                .filter(|c| {
                    let mut current = c.parent_id;
                    let mut hops = 0;
                    while let Some(parent) = current {
                        match parents.get(&parent) {
                            Some(grandparent) if hops <= records.len() => {
                                current = *grandparent;
                                hops += 1;
                            }
                            _ => return false,
                        }
                    }
                    true
                })
                .count();

            let forest = build_comment_tree(records.clone());
            assert_eq!(forest.total(), resolvable);
            assert_eq!(forest.total() + forest.orphans.len(), records.len());
        }
    }

    #[test]
    fn works_for_comments_with_authors() {
        let with_author = |n, parent| CommentWithAuthor {
            comment: comment(n, parent),
            author: crate::Author {
                username: Some(format!("user{n}")),
                avatar: None,
            },
        };
        let forest = build_comment_tree(vec![with_author(1, None), with_author(2, Some(1))]);

        let root = &forest.roots[0];
        assert_eq!(root.comment.author.username.as_deref(), Some("user1"));
        assert_eq!(root.replies[0].comment.comment.content, "comment 2");
        assert!(root.replies[0].replies.is_empty());
    }
}
