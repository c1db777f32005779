//! Conversion between flat path lists and the Table-2 directory tree.
//!
//! Table-2 stores a tree as a flat array where every directory owns a contiguous range of child
//! indices. [`PathTree::build`] lays a set of paths out that way, and [`resolve_paths`] walks any
//! such array back into full paths.

use std::{collections::BTreeMap, ops::Range};

use crate::path::{fold_case, normalize_path};

/// Access to the links of a flat tree node
pub trait TreeLinks {
    /// The name of this node
    fn name(&self) -> &str;

    /// The child index range, or `None` for files
    fn children(&self) -> Option<Range<u64>>;
}

/// Walk a flat tree and compute the full path of every node.
///
/// The roots are the first `root_child_count` nodes, clamped to the number of nodes. A count of 0
/// falls back to a single implicit root at index 0. Child indices outside the array are ignored.
///
/// Each node is visited at most once, so malformed trees containing cycles or shared children
/// still terminate. Nodes that are never reached keep `None`.
pub fn resolve_paths<N: TreeLinks>(nodes: &[N], root_child_count: u32) -> Vec<Option<String>> {
    let mut paths: Vec<Option<String>> = vec![None; nodes.len()];
    if nodes.is_empty() {
        return paths;
    }

    let root_count = match (root_child_count as usize).min(nodes.len()) {
        0 => 1,
        count => count,
    };

    let mut visited = vec![false; nodes.len()];
    // (node, parent) pairs, pushed in reverse so siblings are walked in table order
    let mut stack: Vec<(usize, Option<usize>)> = (0..root_count).rev().map(|i| (i, None)).collect();

    while let Some((index, parent)) = stack.pop() {
        if visited[index] {
            continue;
        }
        visited[index] = true;

        let node = &nodes[index];
        let path = match parent.and_then(|p| paths[p].as_deref()) {
            Some(parent_path) => format!("{parent_path}/{}", node.name()),
            None => node.name().to_owned(),
        };
        paths[index] = Some(path);

        if let Some(children) = node.children() {
            let end = children.end.min(nodes.len() as u64);
            let start = children.start.min(end);
            for child in (start..end).rev() {
                let child = child as usize;
                if !visited[child] {
                    stack.push((child, Some(index)));
                }
            }
        }
    }

    paths
}

/// What a [`TreeNode`] represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNodeKind {
    /// A directory owning `child_count` nodes from `child_start`
    Directory {
        /// Index of the first child
        child_start: u32,
        /// Number of children
        child_count: u32,
    },

    /// A file, with the full path it was built from
    File {
        /// The normalized path
        path: String,
    },
}

/// A node in a [`PathTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// The last path component
    pub name: String,

    /// Directory links or file path
    pub kind: TreeNodeKind,
}

impl TreeLinks for TreeNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> Option<Range<u64>> {
        match self.kind {
            TreeNodeKind::Directory {
                child_start,
                child_count,
            } => Some(child_start as u64..child_start as u64 + child_count as u64),
            TreeNodeKind::File { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct DirBuilder {
    name: String,
    dirs: BTreeMap<String, DirBuilder>,
    files: BTreeMap<String, (String, String)>,
}

impl DirBuilder {
    fn insert(&mut self, path: &str) {
        let mut parts = path.split('/').filter(|part| !part.is_empty()).peekable();
        let mut dir = self;

        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                dir.files
                    .entry(fold_case(part))
                    .or_insert_with(|| (part.to_owned(), path.to_owned()));
                return;
            }
            dir = dir.dirs.entry(fold_case(part)).or_insert_with(|| DirBuilder {
                name: part.to_owned(),
                ..Default::default()
            });
        }
    }

    /// Append the children of this directory, then the contents of each child directory.
    fn layout(self, nodes: &mut Vec<TreeNode>) -> (u32, u32) {
        let start = nodes.len();
        let count = self.dirs.len() + self.files.len();

        nodes.extend(self.dirs.values().map(|dir| TreeNode {
            name: dir.name.clone(),
            kind: TreeNodeKind::Directory {
                child_start: 0,
                child_count: 0,
            },
        }));
        nodes.extend(self.files.into_values().map(|(name, path)| TreeNode {
            name,
            kind: TreeNodeKind::File { path },
        }));

        for (i, dir) in self.dirs.into_values().enumerate() {
            let (child_start, child_count) = dir.layout(nodes);
            nodes[start + i].kind = TreeNodeKind::Directory {
                child_start,
                child_count,
            };
        }

        (start as u32, count as u32)
    }
}

/// Table-2 layout of a set of paths
///
/// Within a directory, subdirectories come before files and both are ordered by name ignoring
/// case. Paths differing only in case are stored once, keeping the first spelling seen.
///
/// ```
/// use ga2_pidx::PathTree;
///
/// let tree = PathTree::build(["a/b.txt", "a/c.txt", "d.txt"]);
/// let names: Vec<&str> = tree.nodes().iter().map(|n| n.name.as_str()).collect();
///
/// assert_eq!(names, ["a", "d.txt", "b.txt", "c.txt"]);
/// assert_eq!(tree.root_child_count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathTree {
    nodes: Vec<TreeNode>,
    root_child_count: u32,
}

impl PathTree {
    /// Lay out `paths`, skipping blank ones
    pub fn build<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = DirBuilder::default();
        for path in paths {
            let path = normalize_path(path.as_ref());
            if !path.is_empty() {
                root.insert(&path);
            }
        }

        let mut nodes = Vec::new();
        let (_, root_child_count) = root.layout(&mut nodes);
        Self {
            nodes,
            root_child_count,
        }
    }

    /// The nodes in Table-2 order
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// The number of nodes directly below the root
    pub fn root_child_count(&self) -> u32 {
        self.root_child_count
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The file paths in Table-2 order
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match &node.kind {
            TreeNodeKind::File { path } => Some(path.as_str()),
            TreeNodeKind::Directory { .. } => None,
        })
    }
}

#[cfg(test)]
mod test {
    use std::ops::Range;

    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::{resolve_paths, PathTree, TreeLinks, TreeNode, TreeNodeKind};
    use crate::path::fold_case;

    struct Raw(&'static str, Option<Range<u64>>);

    impl TreeLinks for Raw {
        fn name(&self) -> &str {
            self.0
        }

        fn children(&self) -> Option<Range<u64>> {
            self.1.clone()
        }
    }

    fn dir(name: &str, child_start: u32, child_count: u32) -> TreeNode {
        TreeNode {
            name: name.to_owned(),
            kind: TreeNodeKind::Directory {
                child_start,
                child_count,
            },
        }
    }

    fn file(name: &str, path: &str) -> TreeNode {
        TreeNode {
            name: name.to_owned(),
            kind: TreeNodeKind::File {
                path: path.to_owned(),
            },
        }
    }

    #[test]
    fn build_nested_layout() {
        let tree = PathTree::build(["a/b.txt", "a/c.txt", "d.txt"]);

        assert_eq!(
            tree.nodes(),
            &[
                dir("a", 2, 2),
                file("d.txt", "d.txt"),
                file("b.txt", "a/b.txt"),
                file("c.txt", "a/c.txt"),
            ]
        );
        assert_eq!(tree.root_child_count(), 2);
    }

    #[test]
    fn build_orders_directories_first_ignoring_case() {
        let tree = PathTree::build(["z.tbl", "B/x.scn", "a.tbl", "c/y.scn"]);
        let names: Vec<&str> = tree.nodes().iter().map(|n| n.name.as_str()).collect();

        assert_eq!(names, ["B", "c", "a.tbl", "z.tbl", "x.scn", "y.scn"]);
        assert_eq!(tree.nodes()[0], dir("B", 4, 1));
        assert_eq!(tree.nodes()[1], dir("c", 5, 1));
    }

    #[test]
    fn build_nested_directories_recurse_after_siblings() {
        let tree = PathTree::build(["a/b/c.txt", "a/d.txt", "e/f.txt"]);

        assert_eq!(
            tree.nodes(),
            &[
                dir("a", 2, 2),
                dir("e", 5, 1),
                dir("b", 4, 1),
                file("d.txt", "a/d.txt"),
                file("c.txt", "a/b/c.txt"),
                file("f.txt", "e/f.txt"),
            ]
        );
    }

    #[test]
    fn build_merges_case_variants() {
        let tree = PathTree::build(["Scn/EV01.scn", "scn/ev01.SCN", "\\scn\\ev02.scn", ""]);

        assert_eq!(
            tree.file_paths().collect::<Vec<_>>(),
            ["Scn/EV01.scn", "scn/ev02.scn"]
        );
        assert_eq!(tree.root_child_count(), 1);
    }

    #[test]
    fn build_empty() {
        let tree = PathTree::build(Vec::<String>::new());
        assert!(tree.is_empty());
        assert_eq!(tree.root_child_count(), 0);
    }

    #[test]
    fn resolve_built_tree() {
        let tree = PathTree::build(["a/b.txt", "a/c.txt", "d.txt"]);
        let paths = resolve_paths(tree.nodes(), tree.root_child_count());

        assert_eq!(
            paths,
            [
                Some("a".to_owned()),
                Some("d.txt".to_owned()),
                Some("a/b.txt".to_owned()),
                Some("a/c.txt".to_owned()),
            ]
        );
    }

    #[test]
    fn resolve_terminates_on_cycles() {
        let nodes = [
            Raw("root", Some(1..2)),
            Raw("loop", Some(0..2)),
            Raw("orphan", None),
        ];
        let paths = resolve_paths(&nodes, 1);

        assert_eq!(
            paths,
            [Some("root".to_owned()), Some("root/loop".to_owned()), None]
        );
    }

    #[test]
    fn resolve_ignores_out_of_range_children() {
        let nodes = [Raw("dir", Some(1..10)), Raw("file", None)];
        let paths = resolve_paths(&nodes, 1);

        assert_eq!(
            paths,
            [Some("dir".to_owned()), Some("dir/file".to_owned())]
        );
    }

    #[test]
    fn resolve_zero_root_count_uses_first_node() {
        let nodes = [Raw("dir", Some(1..2)), Raw("file", None), Raw("x", None)];
        let paths = resolve_paths(&nodes, 0);

        assert_eq!(
            paths,
            [Some("dir".to_owned()), Some("dir/file".to_owned()), None]
        );
    }

    #[test]
    fn resolve_clamps_root_count() {
        let nodes = [Raw("a", None), Raw("b", None)];
        let paths = resolve_paths(&nodes, 50);

        assert_eq!(paths, [Some("a".to_owned()), Some("b".to_owned())]);
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-zA-Z0-9_]{1,6}", 1..4).prop_map(|parts| parts.join("/"))
    }

    proptest! {
        #[test]
        fn built_trees_resolve_to_their_paths(paths in prop::collection::vec(path_strategy(), 0..40)) {
            let tree = PathTree::build(&paths);
            let resolved = resolve_paths(tree.nodes(), tree.root_child_count());

            let mut expected: Vec<String> = tree.file_paths().map(fold_case).collect();
            let actual: Vec<String> = tree
                .nodes()
                .iter()
                .zip(resolved)
                .filter(|(node, _)| matches!(node.kind, TreeNodeKind::File { .. }))
                .map(|(_, path)| fold_case(&path.unwrap_or_default()))
                .collect();
            prop_assert_eq!(&actual, &expected);

            let mut distinct: Vec<String> = paths.iter().map(|p| fold_case(p)).collect();
            distinct.sort();
            distinct.dedup();
            expected.sort();
            prop_assert_eq!(expected, distinct);
        }
    }
}
