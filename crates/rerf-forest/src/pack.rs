//! Flat, cache-aligned binary layout of a trained forest.
//!
//! All trees share one node array; each tree is a contiguous slice whose
//! first record is its root. Projection terms live in a separate table that
//! nodes address by `(terms_start, terms_len)`.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "RERF"
//! 4       2     version major
//! 6       2     version minor
//! 8       4     tree count
//! 12      4     feature count
//! 16      4     class count
//! 20      4     node count
//! 24      4     term count
//! 28      4     reserved (0)
//! 32      4·T   root offsets
//! ..      32·N  node records
//! ..      16·M  projection terms
//! ```
//!
//! Every integer is little-endian.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::candidate::{ProjectionTerm, SplitCandidate};
use crate::error::RerfError;
use crate::forest::Forest;
use crate::node::{FeatureIndex, Node, NodeIndex};
use crate::tree::Tree;

/// Magic bytes at the start of every packed forest.
pub const MAGIC: [u8; 4] = *b"RERF";
/// Major layout version; readers reject any other major.
pub const VERSION_MAJOR: u16 = 1;
/// Minor layout version written by this build.
pub const VERSION_MINOR: u16 = 0;
/// Header length in bytes.
pub const HEADER_LEN: usize = 32;
/// Encoded node record length in bytes.
pub const NODE_LEN: usize = 32;
/// Encoded projection term length in bytes.
pub const TERM_LEN: usize = 16;

/// Order in which each tree's nodes are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum PackOrder {
    /// Parent, left subtree, right subtree.
    #[default]
    PreOrder,
    /// Parent, then the child that saw more training samples (ties left),
    /// so the likelier path stays close in memory.
    HotChildFirst,
}

/// One 32-byte node record.
///
/// `left == 0` marks a leaf, whose class is stored in `right_or_class`.
/// Children always follow their parent, so an internal node never has
/// `left == 0`.
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedNode {
    pub(crate) left: u32,
    pub(crate) right_or_class: u32,
    pub(crate) terms_start: u32,
    pub(crate) terms_len: u32,
    pub(crate) cut_value: f64,
    pub(crate) depth: u32,
    pub(crate) n_samples: u32,
}

impl PackedNode {
    /// Whether this record is a leaf.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.left == 0
    }

    /// Leaf class, or `None` for an internal node.
    #[must_use]
    pub fn class(&self) -> Option<usize> {
        self.is_leaf().then_some(self.right_or_class as usize)
    }

    /// Flat indices of the `(left, right)` children, or `None` for a leaf.
    #[must_use]
    pub fn children(&self) -> Option<(usize, usize)> {
        (!self.is_leaf()).then_some((self.left as usize, self.right_or_class as usize))
    }

    /// Cut value; projected values below it go left.
    #[must_use]
    pub fn cut_value(&self) -> f64 {
        self.cut_value
    }

    /// Distance from the tree root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth as usize
    }

    /// Number of in-bag training observations that reached the node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples as usize
    }

    pub(crate) fn terms_range(&self) -> std::ops::Range<usize> {
        let start = self.terms_start as usize;
        start..start + self.terms_len as usize
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.left.to_le_bytes());
        out.extend_from_slice(&self.right_or_class.to_le_bytes());
        out.extend_from_slice(&self.terms_start.to_le_bytes());
        out.extend_from_slice(&self.terms_len.to_le_bytes());
        out.extend_from_slice(&self.cut_value.to_le_bytes());
        out.extend_from_slice(&self.depth.to_le_bytes());
        out.extend_from_slice(&self.n_samples.to_le_bytes());
    }

    fn read_from(reader: &mut Reader<'_>) -> Self {
        Self {
            left: reader.u32(),
            right_or_class: reader.u32(),
            terms_start: reader.u32(),
            terms_len: reader.u32(),
            cut_value: reader.f64(),
            depth: reader.u32(),
            n_samples: reader.u32(),
        }
    }
}

/// One 16-byte projection term record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedTerm {
    pub(crate) feature: u32,
    pub(crate) weight: f64,
}

impl PackedTerm {
    /// Raw feature column.
    #[must_use]
    pub fn feature(&self) -> usize {
        self.feature as usize
    }

    /// Signed weight.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.feature.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&self.weight.to_le_bytes());
    }

    fn read_from(reader: &mut Reader<'_>) -> Self {
        let feature = reader.u32();
        let _reserved = reader.u32();
        Self {
            feature,
            weight: reader.f64(),
        }
    }
}

/// A forest compiled into the flat packed layout. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedForest {
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) roots: Vec<u32>,
    pub(crate) nodes: Vec<PackedNode>,
    pub(crate) terms: Vec<PackedTerm>,
}

/// Narrow a count or index into a 32-bit layout field.
///
/// # Panics
///
/// Panics if `value` does not fit in `u32`.
fn field(value: usize, what: &str) -> u32 {
    u32::try_from(value)
        .unwrap_or_else(|_| panic!("{what} {value} exceeds the 32-bit packed layout"))
}

impl PackedForest {
    /// Compile `forest` into the packed layout.
    ///
    /// # Panics
    ///
    /// Panics if a count or index does not fit in 32 bits.
    #[must_use]
    #[instrument(skip_all, fields(n_trees = forest.n_trees(), order = ?order))]
    pub fn pack(forest: &Forest, order: PackOrder) -> Self {
        let mut packed = Self {
            n_features: forest.n_features(),
            n_classes: forest.n_classes(),
            roots: Vec::with_capacity(forest.n_trees()),
            nodes: Vec::with_capacity(forest.stats().n_nodes),
            terms: Vec::new(),
        };
        for tree in forest.trees() {
            let root = packed.nodes.len();
            packed.roots.push(field(root, "root offset"));
            packed.pack_node(tree, NodeIndex::new(0), order);
        }
        info!(
            n_nodes = packed.nodes.len(),
            n_terms = packed.terms.len(),
            "forest packed"
        );
        packed
    }

    fn pack_node(&mut self, tree: &Tree, idx: NodeIndex, order: PackOrder) -> u32 {
        let slot = self.nodes.len();
        match &tree.nodes()[idx.index()] {
            Node::Leaf {
                class,
                depth,
                n_samples,
            } => {
                self.nodes.push(PackedNode {
                    left: 0,
                    right_or_class: field(*class, "class id"),
                    terms_start: 0,
                    terms_len: 0,
                    cut_value: 0.0,
                    depth: field(*depth, "depth"),
                    n_samples: field(*n_samples, "sample count"),
                });
            }
            Node::Internal {
                projection,
                cut_value,
                left,
                right,
                depth,
                n_samples,
                ..
            } => {
                let terms_start = field(self.terms.len(), "term offset");
                self.terms
                    .extend(projection.terms().iter().map(|t| PackedTerm {
                        feature: field(t.feature.index(), "feature index"),
                        weight: t.weight,
                    }));
                // Reserve the parent slot; the children patch it below.
                self.nodes.push(PackedNode {
                    left: 0,
                    right_or_class: 0,
                    terms_start,
                    terms_len: field(projection.terms().len(), "term count"),
                    cut_value: *cut_value,
                    depth: field(*depth, "depth"),
                    n_samples: field(*n_samples, "sample count"),
                });

                let left_hot = tree.nodes()[left.index()].n_samples()
                    >= tree.nodes()[right.index()].n_samples();
                let (left_slot, right_slot) = match order {
                    PackOrder::HotChildFirst if !left_hot => {
                        let r = self.pack_node(tree, *right, order);
                        let l = self.pack_node(tree, *left, order);
                        (l, r)
                    }
                    _ => {
                        let l = self.pack_node(tree, *left, order);
                        let r = self.pack_node(tree, *right, order);
                        (l, r)
                    }
                };
                self.nodes[slot].left = left_slot;
                self.nodes[slot].right_or_class = right_slot;
            }
        }
        field(slot, "node offset")
    }

    /// Encode the forest into its byte layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = HEADER_LEN
            + 4 * self.roots.len()
            + NODE_LEN * self.nodes.len()
            + TERM_LEN * self.terms.len();
        let mut out = Vec::with_capacity(len);

        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION_MAJOR.to_le_bytes());
        out.extend_from_slice(&VERSION_MINOR.to_le_bytes());
        for count in [
            self.roots.len(),
            self.n_features,
            self.n_classes,
            self.nodes.len(),
            self.terms.len(),
        ] {
            out.extend_from_slice(&field(count, "header count").to_le_bytes());
        }
        out.extend_from_slice(&0u32.to_le_bytes());

        for root in &self.roots {
            out.extend_from_slice(&root.to_le_bytes());
        }
        for node in &self.nodes {
            node.write_to(&mut out);
        }
        for term in &self.terms {
            term.write_to(&mut out);
        }
        debug_assert_eq!(out.len(), len);
        out
    }

    /// Decode and validate a packed forest.
    ///
    /// Nothing is returned unless the whole stream checks out: every root and
    /// child index is in bounds, children come after their parent, each tree
    /// reaches every record of its own slice exactly once, every leaf
    /// class and term feature is in range, and every cut value and weight is
    /// finite.
    ///
    /// # Errors
    ///
    /// | Variant                           | When                                         |
    /// |-----------------------------------|----------------------------------------------|
    /// | [`RerfError::Truncated`]          | fewer bytes than the header declares         |
    /// | [`RerfError::BadMagic`]           | the stream does not start with `RERF`        |
    /// | [`RerfError::UnsupportedVersion`] | major version is not [`VERSION_MAJOR`]       |
    /// | [`RerfError::TrailingBytes`]      | more bytes than the header declares          |
    /// | [`RerfError::CorruptRecord`]      | a count, index, class or value is invalid    |
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RerfError> {
        if bytes.len() < HEADER_LEN {
            return Err(RerfError::Truncated {
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let mut reader = Reader::new(bytes);
        let magic = reader.array::<4>();
        if magic != MAGIC {
            return Err(RerfError::BadMagic { found: magic });
        }
        let major = reader.u16();
        let minor = reader.u16();
        if major != VERSION_MAJOR {
            return Err(RerfError::UnsupportedVersion {
                major,
                minor,
                expected_major: VERSION_MAJOR,
            });
        }
        let n_trees = reader.u32() as usize;
        let n_features = reader.u32() as usize;
        let n_classes = reader.u32() as usize;
        let n_nodes = reader.u32() as usize;
        let n_terms = reader.u32() as usize;
        let _reserved = reader.u32();

        let expected = HEADER_LEN + 4 * n_trees + NODE_LEN * n_nodes + TERM_LEN * n_terms;
        if bytes.len() < expected {
            return Err(RerfError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(RerfError::TrailingBytes {
                extra: bytes.len() - expected,
            });
        }

        let corrupt = |record: usize, reason: String| RerfError::CorruptRecord { record, reason };
        if n_trees == 0 || n_features == 0 || n_classes == 0 {
            return Err(corrupt(
                0,
                format!(
                    "header declares {n_trees} trees, {n_features} features, {n_classes} classes"
                ),
            ));
        }

        let roots: Vec<u32> = (0..n_trees).map(|_| reader.u32()).collect();
        let nodes: Vec<PackedNode> = (0..n_nodes).map(|_| PackedNode::read_from(&mut reader)).collect();
        let terms: Vec<PackedTerm> = (0..n_terms).map(|_| PackedTerm::read_from(&mut reader)).collect();

        for (tree, &root) in roots.iter().enumerate() {
            if root as usize >= n_nodes {
                return Err(corrupt(
                    tree,
                    format!("root offset {root} is outside {n_nodes} nodes"),
                ));
            }
            // Trees are contiguous slices in tree order.
            let in_order = match tree {
                0 => root == 0,
                _ => root > roots[tree - 1],
            };
            if !in_order {
                return Err(corrupt(
                    tree,
                    format!("root offset {root} breaks the contiguous tree order"),
                ));
            }
        }
        for (i, node) in nodes.iter().enumerate() {
            match node.children() {
                None => {
                    if node.right_or_class as usize >= n_classes {
                        return Err(corrupt(
                            i,
                            format!("leaf class {} is outside [0, {n_classes})", node.right_or_class),
                        ));
                    }
                }
                Some((left, right)) => {
                    if left <= i || right <= i || left >= n_nodes || right >= n_nodes {
                        return Err(corrupt(
                            i,
                            format!("children ({left}, {right}) must lie in ({i}, {n_nodes})"),
                        ));
                    }
                    let range = node.terms_range();
                    if range.is_empty() || range.end > n_terms {
                        return Err(corrupt(
                            i,
                            format!("term range {range:?} is empty or outside {n_terms} terms"),
                        ));
                    }
                    if !node.cut_value.is_finite() {
                        return Err(corrupt(i, format!("cut value {} is not finite", node.cut_value)));
                    }
                }
            }
        }
        for (tree, &root) in roots.iter().enumerate() {
            let end = roots.get(tree + 1).map_or(n_nodes, |&next| next as usize);
            check_tree_slice(&nodes, root as usize, end)
                .map_err(|(record, reason)| corrupt(record, reason))?;
        }
        for (i, term) in terms.iter().enumerate() {
            if term.feature() >= n_features || !term.weight.is_finite() {
                return Err(corrupt(
                    i,
                    format!(
                        "term feature {} weight {} invalid for {n_features} features",
                        term.feature, term.weight
                    ),
                ));
            }
        }

        debug!(n_trees, n_nodes, n_terms, "packed forest decoded");
        Ok(Self {
            n_features,
            n_classes,
            roots,
            nodes,
            terms,
        })
    }

    /// Write the packed bytes to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::WriteForest`] if the file cannot be written.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn save(&self, path: &Path) -> Result<(), RerfError> {
        std::fs::write(path, self.to_bytes()).map_err(|source| RerfError::WriteForest {
            path: path.to_path_buf(),
            source,
        })?;
        info!(n_trees = self.n_trees(), "packed forest written");
        Ok(())
    }

    /// Read and validate a packed forest from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RerfError::ReadForest`] if the file cannot be read, or any
    /// format error from [`PackedForest::from_bytes`].
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, RerfError> {
        let bytes = std::fs::read(path).map_err(|source| RerfError::ReadForest {
            path: path.to_path_buf(),
            source,
        })?;
        let packed = Self::from_bytes(&bytes)?;
        info!(n_trees = packed.n_trees(), n_nodes = packed.n_nodes(), "packed forest loaded");
        Ok(packed)
    }

    /// Rebuild growth-time trees from the packed records.
    ///
    /// Each tree comes back as a pre-order arena. Impurity decreases are not
    /// part of the layout and read as `0.0`.
    #[must_use]
    pub fn to_forest(&self) -> Forest {
        let trees = self
            .roots
            .iter()
            .map(|&root| {
                let mut arena = Vec::new();
                self.unpack_node(root as usize, &mut arena);
                Tree {
                    nodes: arena,
                    n_features: self.n_features,
                    n_classes: self.n_classes,
                }
            })
            .collect();
        Forest::from_trees(trees, self.n_features, self.n_classes)
    }

    fn unpack_node(&self, slot: usize, arena: &mut Vec<Node>) -> NodeIndex {
        let node = &self.nodes[slot];
        let idx = arena.len();
        match node.children() {
            None => arena.push(Node::Leaf {
                class: node.right_or_class as usize,
                depth: node.depth(),
                n_samples: node.n_samples(),
            }),
            Some((left_slot, right_slot)) => {
                arena.push(Node::Leaf {
                    class: 0,
                    depth: node.depth(),
                    n_samples: node.n_samples(),
                });
                let left = self.unpack_node(left_slot, arena);
                let right = self.unpack_node(right_slot, arena);
                let terms = self.terms[node.terms_range()]
                    .iter()
                    .map(|t| ProjectionTerm {
                        feature: FeatureIndex::new(t.feature()),
                        weight: t.weight,
                    })
                    .collect();
                arena[idx] = Node::Internal {
                    projection: SplitCandidate::from_terms(terms),
                    cut_value: node.cut_value,
                    left,
                    right,
                    depth: node.depth(),
                    n_samples: node.n_samples(),
                    impurity_decrease: 0.0,
                };
            }
        }
        NodeIndex::new(idx)
    }

    /// Number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.roots.len()
    }

    /// Number of features each observation must have.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Total node records across all trees.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Total projection term records.
    #[must_use]
    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// Flat offset of each tree's root, in tree order.
    #[must_use]
    pub fn root_offsets(&self) -> &[u32] {
        &self.roots
    }

    /// All node records.
    #[must_use]
    pub fn nodes(&self) -> &[PackedNode] {
        &self.nodes
    }

    /// Node count of each tree, in tree order.
    #[must_use]
    pub fn tree_sizes(&self) -> Vec<usize> {
        let mut bounds: Vec<usize> = self.roots.iter().map(|&r| r as usize).collect();
        bounds.push(self.nodes.len());
        bounds.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

/// Walk the tree rooted at `start` and require it to reach every record in
/// `start..end` exactly once, through children inside that slice.
///
/// Children are already known to follow their parent.
fn check_tree_slice(nodes: &[PackedNode], start: usize, end: usize) -> Result<(), (usize, String)> {
    let mut reached = vec![false; end - start];
    reached[0] = true;
    let mut stack = vec![start];
    while let Some(slot) = stack.pop() {
        let Some((left, right)) = nodes[slot].children() else {
            continue;
        };
        for child in [left, right] {
            if child >= end {
                return Err((slot, format!("child {child} leaves its tree slice {start}..{end}")));
            }
            if std::mem::replace(&mut reached[child - start], true) {
                return Err((slot, format!("child {child} is shared with another parent")));
            }
            stack.push(child);
        }
    }
    match reached.iter().position(|&r| !r) {
        Some(offset) => Err((start + offset, format!("record is unreachable from root {start}"))),
        None => Ok(()),
    }
}

/// Little-endian cursor over a buffer whose length was checked up front.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.array())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }

    fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.array())
    }
}
