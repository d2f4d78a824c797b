//! Particle compiler
//!
//! Flattens a content model tree into a lookup of (kind, path) pairs. A path
//! records the structural choices taken to reach an element leaf: a sequence
//! member contributes its declaration index as `position`, while choice and
//! all members share position 0 and contribute their declaration index as
//! `alternative`. Paths are compared segment by segment: at the first
//! differing segment the position decides, then the alternative. A path that
//! is a prefix of another sorts first.
//!
//! Compilation happens at most once per [`CompiledParticle`], on first use.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::documents::Element;
use crate::namespaces::SchemaIdentity;
use crate::versions::FileFormatVersion;

use super::particles::{Occurs, OccursCalculator, ParticleNode, ParticleType};
use super::registry::{ElementKind, Registry};

/// One step of a particle path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathSegment {
    /// Index among sequence members (0 for choice/all members)
    pub position: u32,
    /// Index among choice/all members (0 for sequence members)
    pub alternative: u32,
}

/// Position of an element leaf in a content model
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ParticlePath {
    segments: Vec<PathSegment>,
}

impl ParticlePath {
    /// Create a path from segments
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Get the segments
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Check if the path is empty (the content model is a single leaf)
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Index of the first segment where the two paths differ
    pub fn divergence(&self, other: &ParticlePath) -> Option<usize> {
        let shared = self
            .segments
            .iter()
            .zip(&other.segments)
            .take_while(|(a, b)| a == b)
            .count();
        if shared == self.segments.len() && shared == other.segments.len() {
            None
        } else {
            Some(shared)
        }
    }

    /// Check whether the first `len` segments are shared with `other`
    pub fn shares_prefix(&self, other: &ParticlePath, len: usize) -> bool {
        self.segments.len() >= len
            && other.segments.len() >= len
            && self.segments[..len] == other.segments[..len]
    }
}

impl Ord for ParticlePath {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.segments.iter().zip(&other.segments) {
            let ord = a
                .position
                .cmp(&b.position)
                .then(a.alternative.cmp(&b.alternative));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl PartialOrd for ParticlePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ParticlePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/")?;
        for (i, s) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            if s.alternative == 0 {
                write!(f, "{}", s.position)?;
            } else {
                write!(f, "{}|{}", s.position, s.alternative)?;
            }
        }
        Ok(())
    }
}

/// A kind reachable in a content model and its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupItem {
    /// Element kind
    pub kind: ElementKind,
    /// Path of the kind's leaf
    pub path: ParticlePath,
}

/// Whether a slot or choice group must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// May be absent
    Optional,
    /// Must be present
    Required,
    /// Must be present once anything sharing the first `n` path segments is
    Within(usize),
}

/// Cardinality data of one lookup item
#[derive(Debug, Clone)]
pub struct SlotInfo {
    /// Bounds declared on the leaf itself
    pub occurs: Occurs,
    /// Bounds multiplied along the path
    pub total: Occurs,
    /// Minimum count once the slot is required
    pub min_count: u32,
    /// Whether the slot is required
    pub presence: Presence,
    /// Repeatability of the composite owning each path segment
    pub repeatable: Vec<bool>,
    /// Enclosing choice groups as (group index, alternative)
    pub choices: Vec<(usize, u32)>,
}

/// A choice composite reachable in a content model
#[derive(Debug, Clone)]
pub struct ChoiceGroup {
    /// Path prefix leading to the choice
    pub prefix: ParticlePath,
    /// Bounds multiplied along the path, including the choice's own
    pub total: Occurs,
    /// Whether one alternative must be present
    pub presence: Presence,
    /// Kinds reachable through any alternative, in declaration order
    pub kinds: Vec<ElementKind>,
}

/// The flattened form of a content model
#[derive(Debug, Clone, Default)]
pub struct CompiledModel {
    /// (kind, path) pairs in depth-first declaration order
    pub lookup: Vec<LookupItem>,
    /// Cardinality data, parallel to `lookup`
    pub slots: Vec<SlotInfo>,
    /// Choice groups
    pub groups: Vec<ChoiceGroup>,
    index: HashMap<ElementKind, usize>,
}

impl CompiledModel {
    /// Position of a kind in the lookup
    pub fn index_of(&self, kind: &ElementKind) -> Option<usize> {
        self.index.get(kind).copied()
    }
}

/// Compiles particle trees for one target version
#[derive(Debug, Clone, Copy)]
pub struct ParticleCompiler {
    version: FileFormatVersion,
}

impl ParticleCompiler {
    /// Create a compiler for a version
    pub fn new(version: FileFormatVersion) -> Self {
        Self { version }
    }

    /// Compile a content model
    pub fn compile(&self, particle: &ParticleNode) -> CompiledModel {
        let mut walker = Walker {
            version: self.version,
            model: CompiledModel::default(),
            path: Vec::new(),
            repeatable: Vec::new(),
            choices: Vec::new(),
        };
        walker.walk(particle, OccursCalculator::new(), None, 1);
        walker.model
    }
}

struct Walker {
    version: FileFormatVersion,
    model: CompiledModel,
    path: Vec<PathSegment>,
    repeatable: Vec<bool>,
    choices: Vec<(usize, u32)>,
}

impl Walker {
    fn walk(
        &mut self,
        node: &ParticleNode,
        calc: OccursCalculator,
        anchor: Option<usize>,
        min_factor: u32,
    ) {
        match node {
            ParticleNode::Element(leaf) => {
                if !leaf.is_available(self.version) || self.model.index.contains_key(&leaf.kind) {
                    return;
                }

                let mut total = calc;
                total.multiply(leaf.occurs);

                let presence = if leaf.occurs.min == 0 {
                    Presence::Optional
                } else {
                    match anchor {
                        None => Presence::Required,
                        Some(n) => Presence::Within(n),
                    }
                };

                for (group, _) in &self.choices {
                    self.model.groups[*group].kinds.push(leaf.kind.clone());
                }

                self.model.index.insert(leaf.kind.clone(), self.model.lookup.len());
                self.model.lookup.push(LookupItem {
                    kind: leaf.kind.clone(),
                    path: ParticlePath::new(self.path.clone()),
                });
                self.model.slots.push(SlotInfo {
                    occurs: leaf.occurs,
                    total: total.occurs(),
                    min_count: min_factor.saturating_mul(leaf.occurs.min),
                    presence,
                    repeatable: self.repeatable.clone(),
                    choices: self.choices.clone(),
                });
            }
            ParticleNode::Composite(composite) => {
                let mut calc = calc;
                calc.multiply(composite.occurs);

                let depth = self.path.len();
                let (anchor, min_factor) = if composite.occurs.min == 0 {
                    (Some(depth), 1)
                } else {
                    (anchor, min_factor.saturating_mul(composite.occurs.min))
                };

                let available = composite
                    .children
                    .iter()
                    .filter(|child| match child {
                        ParticleNode::Element(leaf) => leaf.is_available(self.version),
                        ParticleNode::Composite(_) => true,
                    })
                    .count();

                let group = if composite.particle_type == ParticleType::Choice && available > 0 {
                    let presence = if composite.occurs.min == 0 {
                        Presence::Optional
                    } else {
                        match anchor {
                            None => Presence::Required,
                            Some(n) => Presence::Within(n),
                        }
                    };
                    self.model.groups.push(ChoiceGroup {
                        prefix: ParticlePath::new(self.path.clone()),
                        total: calc.occurs(),
                        presence,
                        kinds: Vec::new(),
                    });
                    Some(self.model.groups.len() - 1)
                } else {
                    None
                };

                for (i, child) in composite.children.iter().enumerate() {
                    let i = i as u32;
                    let segment = match composite.particle_type {
                        ParticleType::Sequence => PathSegment {
                            position: i,
                            alternative: 0,
                        },
                        ParticleType::Choice | ParticleType::All => PathSegment {
                            position: 0,
                            alternative: i,
                        },
                    };

                    self.path.push(segment);
                    self.repeatable.push(composite.occurs.is_repeatable());
                    if let Some(g) = group {
                        self.choices.push((g, i));
                    }

                    let (child_anchor, child_factor) = if group.is_some() && available > 1 {
                        (Some(self.path.len()), 1)
                    } else {
                        (anchor, min_factor)
                    };
                    self.walk(child, calc, child_anchor, child_factor);

                    if group.is_some() {
                        self.choices.pop();
                    }
                    self.repeatable.pop();
                    self.path.pop();
                }
            }
        }
    }
}

/// A content model with its lazily computed lookup
///
/// The lookup is computed on first access, exactly once even under concurrent
/// first access, and is immutable afterwards.
#[derive(Debug)]
pub struct CompiledParticle {
    particle: Arc<ParticleNode>,
    version: FileFormatVersion,
    compiled: OnceCell<CompiledModel>,
    #[cfg(test)]
    compilations: std::sync::atomic::AtomicUsize,
}

impl CompiledParticle {
    /// Wrap a content model for a compile version
    pub fn new(particle: Arc<ParticleNode>, version: FileFormatVersion) -> Self {
        Self {
            particle,
            version,
            compiled: OnceCell::new(),
            #[cfg(test)]
            compilations: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Get the source content model
    pub fn particle(&self) -> &ParticleNode {
        &self.particle
    }

    /// Get the compile version
    pub fn version(&self) -> FileFormatVersion {
        self.version
    }

    /// Check if the lookup has been computed
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Get the compiled model, computing it on first access
    pub fn model(&self) -> &CompiledModel {
        self.compiled.get_or_init(|| {
            #[cfg(test)]
            self.compilations
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let model = ParticleCompiler::new(self.version).compile(&self.particle);
            debug!(
                version = %self.version,
                kinds = model.lookup.len(),
                groups = model.groups.len(),
                "compiled content model"
            );
            model
        })
    }

    /// Ordered (kind, path) pairs
    pub fn lookup(&self) -> &[LookupItem] {
        &self.model().lookup
    }

    /// Find the path of a kind
    pub fn find_path(&self, kind: &ElementKind) -> Option<&ParticlePath> {
        let model = self.model();
        model.index_of(kind).map(|i| &model.lookup[i].path)
    }

    /// Check if a kind belongs to this content model
    pub fn contains(&self, kind: &ElementKind) -> bool {
        self.model().index_of(kind).is_some()
    }

    /// Compare two kinds by their position in this content model
    ///
    /// A kind absent from the lookup sorts before every present kind; two
    /// absent kinds are equal. Equal paths mean the same repeatable slot.
    pub fn compare(&self, x: &ElementKind, y: &ElementKind) -> Ordering {
        compare_paths(self.find_path(x), self.find_path(y))
    }

    /// Compare two elements by their position in this content model
    pub fn compare_elements(&self, x: &Element, y: &Element) -> Ordering {
        let x = x.kind().and_then(|k| self.find_path(k));
        let y = y.kind().and_then(|k| self.find_path(k));
        compare_paths(x, y)
    }

    /// Create an empty element of a kind belonging to this content model
    pub fn create_instance(&self, identity: &SchemaIdentity, registry: &Registry) -> Option<Element> {
        let kind = registry.kind_of(identity)?;
        if self.contains(kind) {
            registry.instantiate(kind)
        } else {
            None
        }
    }
}

fn compare_paths(x: Option<&ParticlePath>, y: Option<&ParticlePath>) -> Ordering {
    match (x, y) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kind(name: &str) -> ElementKind {
        ElementKind::new(name)
    }

    fn compiled(model: ParticleNode, version: FileFormatVersion) -> CompiledParticle {
        CompiledParticle::new(Arc::new(model), version)
    }

    fn sample() -> CompiledParticle {
        compiled(
            ParticleNode::sequence(
                1,
                1,
                vec![
                    ParticleNode::element("t:a", 1, 1),
                    ParticleNode::choice(
                        1,
                        1,
                        vec![ParticleNode::element("t:b", 1, 1), ParticleNode::element("t:c", 1, 1)],
                    ),
                ],
            ),
            FileFormatVersion::Office2007,
        )
    }

    #[test]
    fn test_sequence_then_choice_ordering() {
        let cp = sample();
        assert_eq!(cp.compare(&kind("t:a"), &kind("t:b")), Ordering::Less);
        assert_eq!(cp.compare(&kind("t:a"), &kind("t:c")), Ordering::Less);
        assert_eq!(cp.compare(&kind("t:b"), &kind("t:c")), Ordering::Less);
        assert_eq!(cp.compare(&kind("t:c"), &kind("t:b")), Ordering::Greater);
        assert_eq!(cp.compare(&kind("t:b"), &kind("t:b")), Ordering::Equal);
    }

    #[test]
    fn test_choice_alternatives_tie_on_position() {
        let cp = sample();
        let b = cp.find_path(&kind("t:b")).unwrap();
        let c = cp.find_path(&kind("t:c")).unwrap();

        assert_eq!(b.segments()[1].position, c.segments()[1].position);
        assert_eq!(b.segments()[1].alternative, 0);
        assert_eq!(c.segments()[1].alternative, 1);
        assert_eq!(b.divergence(c), Some(1));
        assert_eq!(b.to_string(), "/1/0");
        assert_eq!(c.to_string(), "/1/0|1");
    }

    #[test]
    fn test_nested_alternatives_follow_declaration_order() {
        // alternatives of different depths inside one choice
        let cp = compiled(
            ParticleNode::sequence(
                1,
                1,
                vec![ParticleNode::choice(
                    1,
                    1,
                    vec![
                        ParticleNode::sequence(
                            1,
                            1,
                            vec![ParticleNode::element("t:x", 1, 1), ParticleNode::element("t:y", 0, 1)],
                        ),
                        ParticleNode::element("t:z", 1, 1),
                    ],
                )],
            ),
            FileFormatVersion::Office2007,
        );
        let path = |name: &str| cp.find_path(&kind(name)).unwrap().to_string();
        assert_eq!(path("t:x"), "/0/0/0");
        assert_eq!(path("t:y"), "/0/0/1");
        assert_eq!(path("t:z"), "/0/0|1");

        assert_eq!(cp.compare(&kind("t:x"), &kind("t:y")), Ordering::Less);
        assert_eq!(cp.compare(&kind("t:y"), &kind("t:z")), Ordering::Less);
        assert_eq!(cp.compare(&kind("t:x"), &kind("t:z")), Ordering::Less);
        assert_eq!(cp.compare(&kind("t:z"), &kind("t:y")), Ordering::Greater);

        let mut kinds = vec![kind("t:z"), kind("t:y"), kind("t:x")];
        kinds.sort_by(|a, b| cp.compare(a, b));
        assert_eq!(kinds, vec![kind("t:x"), kind("t:y"), kind("t:z")]);
    }

    #[test]
    fn test_absent_kinds_sort_first() {
        let cp = sample();
        let absent = kind("t:zzz");
        assert_eq!(cp.compare(&absent, &kind("t:a")), Ordering::Less);
        assert_eq!(cp.compare(&kind("t:c"), &absent), Ordering::Greater);
        assert_eq!(cp.compare(&absent, &kind("t:other")), Ordering::Equal);
        assert!(cp.find_path(&absent).is_none());
    }

    #[test]
    fn test_lookup_is_declaration_order() {
        let cp = sample();
        let kinds: Vec<_> = cp.lookup().iter().map(|l| l.kind.to_string()).collect();
        assert_eq!(kinds, vec!["t:a", "t:b", "t:c"]);
    }

    #[test]
    fn test_version_gated_leaf_is_omitted() {
        let model = ParticleNode::sequence(
            1,
            1,
            vec![
                ParticleNode::element("t:a", 1, 1),
                ParticleNode::gated("t:d", 1, 1, FileFormatVersion::Office2010),
            ],
        );

        let v1 = compiled(model.clone(), FileFormatVersion::Office2007);
        assert!(v1.find_path(&kind("t:d")).is_none());
        assert_eq!(v1.lookup().len(), 1);

        let v2 = compiled(model, FileFormatVersion::Office2010);
        assert!(v2.find_path(&kind("t:d")).is_some());
        assert_eq!(v2.lookup().len(), 2);
    }

    #[test]
    fn test_duplicate_kind_keeps_first_path() {
        let cp = compiled(
            ParticleNode::sequence(
                1,
                1,
                vec![
                    ParticleNode::element("t:a", 0, 1),
                    ParticleNode::element("t:b", 1, 1),
                    ParticleNode::element("t:a", 0, 1),
                ],
            ),
            FileFormatVersion::Office2007,
        );
        assert_eq!(cp.lookup().len(), 2);
        assert_eq!(cp.find_path(&kind("t:a")).unwrap().segments()[0].position, 0);
    }

    #[test]
    fn test_slot_presence_and_totals() {
        let cp = compiled(
            ParticleNode::sequence(
                1,
                1,
                vec![
                    ParticleNode::element("t:a", 1, 1),
                    ParticleNode::sequence(0, 1, vec![ParticleNode::element("t:x", 1, 1)]),
                    ParticleNode::choice(
                        1,
                        0,
                        vec![ParticleNode::element("t:b", 1, 1), ParticleNode::element("t:c", 1, 1)],
                    ),
                ],
            ),
            FileFormatVersion::Office2007,
        );
        let model = cp.model();

        let a = &model.slots[model.index_of(&kind("t:a")).unwrap()];
        assert_eq!(a.presence, Presence::Required);
        assert_eq!(a.total, Occurs::once());

        let x = &model.slots[model.index_of(&kind("t:x")).unwrap()];
        assert_eq!(x.presence, Presence::Within(1));

        let b = &model.slots[model.index_of(&kind("t:b")).unwrap()];
        assert_eq!(b.presence, Presence::Within(2));
        assert_eq!(b.total, Occurs::one_or_more());
        assert_eq!(b.choices, vec![(0, 0)]);
        assert_eq!(b.repeatable, vec![false, true]);

        assert_eq!(model.groups.len(), 1);
        assert_eq!(model.groups[0].presence, Presence::Required);
        assert_eq!(model.groups[0].kinds, vec![kind("t:b"), kind("t:c")]);
    }

    #[test]
    fn test_all_members_tie_and_stay_required() {
        let cp = compiled(
            ParticleNode::all(
                1,
                1,
                vec![ParticleNode::element("t:a", 1, 1), ParticleNode::element("t:b", 0, 1)],
            ),
            FileFormatVersion::Office2007,
        );
        let model = cp.model();
        let a = cp.find_path(&kind("t:a")).unwrap();
        let b = cp.find_path(&kind("t:b")).unwrap();
        assert_eq!(a.segments()[0].position, b.segments()[0].position);
        assert_eq!(model.slots[0].presence, Presence::Required);
        assert_eq!(model.slots[1].presence, Presence::Optional);
        assert!(model.groups.is_empty());
    }

    #[test]
    fn test_lazy_compile_happens_once() {
        use std::sync::atomic::Ordering::SeqCst;
        use std::sync::Barrier;

        let cp = Arc::new(sample());
        assert!(!cp.is_compiled());
        assert_eq!(cp.compilations.load(SeqCst), 0);

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cp = Arc::clone(&cp);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cp.lookup().as_ptr() as usize
                })
            })
            .collect();
        let ptrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(cp.is_compiled());
        assert_eq!(cp.compilations.load(SeqCst), 1);
        assert!(ptrs.iter().all(|p| *p == ptrs[0]));

        assert_eq!(cp.lookup().as_ptr() as usize, ptrs[0]);
        assert!(cp.contains(&kind("t:c")));
        assert_eq!(cp.compilations.load(SeqCst), 1);
    }

    fn nested_model() -> CompiledParticle {
        compiled(
            ParticleNode::sequence(
                1,
                1,
                vec![
                    ParticleNode::element("t:k0", 0, 1),
                    ParticleNode::choice(
                        0,
                        0,
                        vec![
                            ParticleNode::element("t:k1", 1, 1),
                            ParticleNode::sequence(
                                1,
                                1,
                                vec![
                                    ParticleNode::element("t:k2", 1, 1),
                                    ParticleNode::element("t:k3", 0, 0),
                                ],
                            ),
                            ParticleNode::element("t:k4", 1, 1),
                        ],
                    ),
                    ParticleNode::all(
                        0,
                        1,
                        vec![ParticleNode::element("t:k5", 0, 1), ParticleNode::element("t:k6", 0, 1)],
                    ),
                    ParticleNode::element("t:k7", 0, 0),
                ],
            ),
            FileFormatVersion::Office2007,
        )
    }

    fn any_kind() -> impl Strategy<Value = ElementKind> {
        // k8 and k9 are not part of the model
        (0u8..10).prop_map(|i| ElementKind::new(format!("t:k{}", i)))
    }

    proptest! {
        #[test]
        fn prop_compare_is_total_preorder(x in any_kind(), y in any_kind(), z in any_kind()) {
            let cp = nested_model();

            prop_assert_eq!(cp.compare(&x, &x), Ordering::Equal);
            prop_assert_eq!(cp.compare(&x, &y), cp.compare(&y, &x).reverse());

            if cp.compare(&x, &y) != Ordering::Greater && cp.compare(&y, &z) != Ordering::Greater {
                prop_assert_ne!(cp.compare(&x, &z), Ordering::Greater);
            }

            match (cp.contains(&x), cp.contains(&y)) {
                (false, true) => prop_assert_eq!(cp.compare(&x, &y), Ordering::Less),
                (true, false) => prop_assert_eq!(cp.compare(&x, &y), Ordering::Greater),
                (false, false) => prop_assert_eq!(cp.compare(&x, &y), Ordering::Equal),
                (true, true) => {
                    if x != y {
                        prop_assert_ne!(cp.compare(&x, &y), Ordering::Equal);
                    }
                }
            }
        }
    }
}
