//! Annotation content and the identity-keyed annotation registry
//!
//! Annotation kinds (custom content, markers, pins) share the [`AnnotationContent`]
//! capability. The [`AnnotationRegistry`] only ever talks to that trait: it asks content
//! for its coordinate and anchor and compares snapshots structurally, but never looks at
//! which kind it holds.

use crate::{GeoCoordinate, MapViewError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug};
use std::hash::Hash;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An item with a stable identity
pub trait Identifiable {
    type Id: Eq + Hash + Clone + Debug;

    fn id(&self) -> Self::Id;
}

/// Normalized anchor point of an annotation's visual, in [0,1] x [0,1]
///
/// (0, 0) is the top-left corner of the visual, (1, 1) the bottom-right.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    pub const CENTER: Anchor = Anchor { x: 0.5, y: 0.5 };
    pub const BOTTOM_CENTER: Anchor = Anchor { x: 0.5, y: 1.0 };

    /// Create an anchor, clamping both components to [0, 1]
    pub fn new(x: f64, y: f64) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.5 } else { v.clamp(0.0, 1.0) };
        Self {
            x: clamp(x),
            y: clamp(y),
        }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::CENTER
    }
}

/// An RGBA tint carried through to the renderer untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Tint {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// How the renderer should draw an annotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnnotationForm {
    /// Caller-provided content; the renderer draws it at the anchor
    Custom,
    /// A balloon marker
    Marker { tint: Option<Tint> },
    /// A classic pin
    Pin { tint: Option<Tint> },
}

/// Capability shared by every annotation kind
pub trait AnnotationContent {
    /// Where the annotation sits on the map
    fn coordinate(&self) -> GeoCoordinate;

    /// Which point of the visual lies on the coordinate
    fn anchor(&self) -> Anchor {
        Anchor::CENTER
    }

    /// The renderable form
    fn form(&self) -> AnnotationForm;
}

/// Arbitrary content placed at a coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct MapAnnotation<C> {
    pub coordinate: GeoCoordinate,
    pub anchor: Anchor,
    pub content: C,
}

impl<C> MapAnnotation<C> {
    pub fn new(coordinate: GeoCoordinate, content: C) -> Self {
        Self {
            coordinate,
            anchor: Anchor::CENTER,
            content,
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }
}

impl<C> AnnotationContent for MapAnnotation<C> {
    fn coordinate(&self) -> GeoCoordinate {
        self.coordinate
    }

    fn anchor(&self) -> Anchor {
        self.anchor
    }

    fn form(&self) -> AnnotationForm {
        AnnotationForm::Custom
    }
}

/// A balloon marker with an optional tint
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapMarker {
    pub coordinate: GeoCoordinate,
    pub tint: Option<Tint>,
}

impl MapMarker {
    pub fn new(coordinate: GeoCoordinate) -> Self {
        Self {
            coordinate,
            tint: None,
        }
    }

    pub fn with_tint(mut self, tint: Tint) -> Self {
        self.tint = Some(tint);
        self
    }
}

impl AnnotationContent for MapMarker {
    fn coordinate(&self) -> GeoCoordinate {
        self.coordinate
    }

    fn anchor(&self) -> Anchor {
        Anchor::BOTTOM_CENTER
    }

    fn form(&self) -> AnnotationForm {
        AnnotationForm::Marker { tint: self.tint }
    }
}

/// A pin with an optional tint
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapPin {
    pub coordinate: GeoCoordinate,
    pub tint: Option<Tint>,
}

impl MapPin {
    pub fn new(coordinate: GeoCoordinate) -> Self {
        Self {
            coordinate,
            tint: None,
        }
    }

    pub fn with_tint(mut self, tint: Tint) -> Self {
        self.tint = Some(tint);
        self
    }
}

impl AnnotationContent for MapPin {
    fn coordinate(&self) -> GeoCoordinate {
        self.coordinate
    }

    fn anchor(&self) -> Anchor {
        Anchor::BOTTOM_CENTER
    }

    fn form(&self) -> AnnotationForm {
        AnnotationForm::Pin { tint: self.tint }
    }
}

/// Any annotation kind, so one content function can mix kinds
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation<C = ()> {
    Custom(MapAnnotation<C>),
    Marker(MapMarker),
    Pin(MapPin),
}

impl<C> Annotation<C> {
    /// The custom content, if this is a custom annotation
    pub fn content(&self) -> Option<&C> {
        match self {
            Annotation::Custom(annotation) => Some(&annotation.content),
            Annotation::Marker(_) | Annotation::Pin(_) => None,
        }
    }
}

impl<C> AnnotationContent for Annotation<C> {
    fn coordinate(&self) -> GeoCoordinate {
        match self {
            Annotation::Custom(a) => a.coordinate(),
            Annotation::Marker(m) => m.coordinate(),
            Annotation::Pin(p) => p.coordinate(),
        }
    }

    fn anchor(&self) -> Anchor {
        match self {
            Annotation::Custom(a) => a.anchor(),
            Annotation::Marker(m) => m.anchor(),
            Annotation::Pin(p) => p.anchor(),
        }
    }

    fn form(&self) -> AnnotationForm {
        match self {
            Annotation::Custom(a) => a.form(),
            Annotation::Marker(m) => m.form(),
            Annotation::Pin(p) => p.form(),
        }
    }
}

impl<C> From<MapAnnotation<C>> for Annotation<C> {
    fn from(annotation: MapAnnotation<C>) -> Self {
        Annotation::Custom(annotation)
    }
}

impl<C> From<MapMarker> for Annotation<C> {
    fn from(marker: MapMarker) -> Self {
        Annotation::Marker(marker)
    }
}

impl<C> From<MapPin> for Annotation<C> {
    fn from(pin: MapPin) -> Self {
        Annotation::Pin(pin)
    }
}

/// An annotation placed on the map, keyed by its item's identity
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationPlacement<K, A> {
    pub id: K,
    pub coordinate: GeoCoordinate,
    pub anchor: Anchor,
    pub content: A,
}

/// Changes between two registry snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDiff<K, A> {
    /// New identities, in source order
    pub added: Vec<AnnotationPlacement<K, A>>,
    /// Persisting identities whose coordinate or content changed, in source order
    pub updated: Vec<AnnotationPlacement<K, A>>,
    /// Identities that disappeared, in previous snapshot order
    pub removed: Vec<K>,
}

impl<K, A> Default for AnnotationDiff<K, A> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

impl<K, A> AnnotationDiff<K, A> {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Total number of changes
    #[inline]
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// Identities of `items` in order, or `DuplicateIdentity` for the first repeated one
pub(crate) fn unique_ids<T: Identifiable>(items: &[T]) -> Result<Vec<T::Id>> {
    let ids: Vec<T::Id> = items.iter().map(|item| item.id()).collect();
    let duplicate = {
        let mut seen = HashSet::with_capacity(ids.len());
        ids.iter().find(|id| !seen.insert(*id)).cloned()
    };
    match duplicate {
        Some(id) => {
            tracing::warn!("Rejected annotation items: duplicate identity {id:?}");
            Err(MapViewError::DuplicateIdentity {
                id: format!("{id:?}"),
            })
        }
        None => Ok(ids),
    }
}

type ContentFn<T, A> = Box<dyn Fn(&T) -> A>;

/// Current annotation placements derived from a sequence of identifiable items
pub struct AnnotationRegistry<T: Identifiable, A> {
    /// Pure mapping from an item to its annotation
    content: ContentFn<T, A>,
    /// Placements in source order
    placements: Vec<AnnotationPlacement<T::Id, A>>,
    /// Identity to position in `placements`
    index: HashMap<T::Id, usize>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T, A> AnnotationRegistry<T, A>
where
    T: Identifiable,
    A: AnnotationContent + Clone + PartialEq,
{
    /// Create an empty registry producing annotations with `content`
    pub fn new(content: impl Fn(&T) -> A + 'static) -> Self {
        Self {
            content: Box::new(content),
            placements: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Re-derive the placements from `items` and report what changed
    ///
    /// # Errors
    /// `DuplicateIdentity` if two items share an identity. The registry is left untouched.
    pub fn reconcile(&mut self, items: &[T]) -> Result<AnnotationDiff<T::Id, A>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("annotation::reconcile");

        let ids = unique_ids(items)?;
        let mut diff = AnnotationDiff::default();
        let mut placements = Vec::with_capacity(items.len());
        let mut index = HashMap::with_capacity(items.len());

        for (item, id) in items.iter().zip(ids) {
            let content = (self.content)(item);
            let placement = AnnotationPlacement {
                id: id.clone(),
                coordinate: content.coordinate(),
                anchor: content.anchor(),
                content,
            };

            match self.index.get(&id).map(|&i| &self.placements[i]) {
                None => diff.added.push(placement.clone()),
                Some(previous)
                    if previous.coordinate != placement.coordinate
                        || previous.content != placement.content =>
                {
                    diff.updated.push(placement.clone())
                }
                Some(_) => {}
            }

            index.insert(id, placements.len());
            placements.push(placement);
        }

        diff.removed = self
            .placements
            .iter()
            .filter(|previous| !index.contains_key(&previous.id))
            .map(|previous| previous.id.clone())
            .collect();

        if !diff.is_empty() {
            tracing::debug!(
                "Reconciled annotations: {} added, {} updated, {} removed",
                diff.added.len(),
                diff.updated.len(),
                diff.removed.len()
            );
        }

        self.placements = placements;
        self.index = index;
        Ok(diff)
    }

    /// Drop every placement, returning the removals
    pub fn clear(&mut self) -> AnnotationDiff<T::Id, A> {
        self.index.clear();
        AnnotationDiff {
            removed: self.placements.drain(..).map(|p| p.id).collect(),
            ..AnnotationDiff::default()
        }
    }
}

impl<T: Identifiable, A> AnnotationRegistry<T, A> {
    /// Current placements in source order
    #[inline]
    pub fn placements(&self) -> &[AnnotationPlacement<T::Id, A>] {
        &self.placements
    }

    /// Look up a placement by identity
    #[inline]
    pub fn get(&self, id: &T::Id) -> Option<&AnnotationPlacement<T::Id, A>> {
        self.index.get(id).map(|&i| &self.placements[i])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

impl<T: Identifiable, A: Debug> Debug for AnnotationRegistry<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationRegistry")
            .field("placements", &self.placements)
            .finish_non_exhaustive()
    }
}
