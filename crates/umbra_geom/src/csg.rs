//! Boolean composites.
//!
//! The CSG path merges the children's enter/exit lists into a single event
//! stream and emits a boundary every time the composite's inside-state
//! flips. Unions also have a cheap fast path that never builds hit lists.

use smallvec::SmallVec;
use umbra_math::{Bounds, Ray, EPSILON};

use crate::shape::{first_hit, Hit, HitInfo, Shape};

/// Bounds pre-check of a composite's fast path.
///
/// The check starts enabled. Once [`Shape::initialize`] has negotiated it,
/// it is locked and later requests to change it are refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsCheck {
    pub(crate) enabled: bool,
    pub(crate) locked: bool,
}

impl Default for BoundsCheck {
    fn default() -> Self {
        Self {
            enabled: true,
            locked: false,
        }
    }
}

impl BoundsCheck {
    /// Switch the check. Returns false if it is locked.
    pub(crate) fn set(&mut self, enabled: bool) -> bool {
        if self.locked {
            return false;
        }
        self.enabled = enabled;
        true
    }

    /// Settle the check for good.
    pub(crate) fn lock(&mut self, enabled: bool) {
        if !self.locked {
            self.enabled = enabled;
            self.locked = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Union,
    Intersection,
    Difference,
}

impl Op {
    /// Whether the composite is inside, given how many children the ray is
    /// inside of and whether it is inside the subtrahend.
    #[inline]
    fn inside(self, depth: usize, groups: usize, in_subtrahend: bool) -> bool {
        match self {
            Op::Union => depth > 0,
            Op::Intersection => depth == groups,
            Op::Difference => depth > 0 && !in_subtrahend,
        }
    }
}

/// One boundary of one child.
#[derive(Clone, Copy)]
struct Event {
    index: usize,
    group: usize,
    enter: bool,
}

/// Hit lists up to this length stay on the stack.
pub(crate) const INLINE_HITS: usize = 16;

/// Scratch hit list of a composite query.
pub(crate) type HitBuffer<'a> = SmallVec<[Hit<'a>; INLINE_HITS]>;

/// Collect the children's hits into a scratch list and merge them into
/// `hits`. `groups` is the number of children.
fn merge_children<'a>(
    op: Op,
    children: impl IntoIterator<Item = &'a Shape>,
    groups: usize,
    ray: &Ray,
    max_hits: usize,
    hits: &mut [Hit<'a>],
) -> usize {
    let mut scratch: HitBuffer<'a> = SmallVec::from_elem(Hit::default(), max_hits);
    let mut events: SmallVec<[Event; INLINE_HITS]> = SmallVec::with_capacity(max_hits);
    let mut used = 0;
    for (group, child) in children.into_iter().enumerate() {
        let mut count = child.get_hits(ray, &mut scratch[used..]);
        // A child with a NaN crossing counts as missed.
        if scratch[used..used + count].iter().any(|h| h.time.is_nan()) {
            count = 0;
        }
        if count == 0 {
            match op {
                Op::Intersection => return 0,
                Op::Difference if group == 0 => return 0,
                _ => continue,
            }
        }
        if op == Op::Difference && group == 1 {
            for hit in &mut scratch[used..used + count] {
                hit.negated = !hit.negated;
            }
        }
        events.extend((0..count).map(|i| Event {
            index: used + i,
            group,
            enter: i % 2 == 0,
        }));
        used += count;
    }

    // Ascending time, entries before exits on ties so that touching solids
    // fuse instead of leaving a gap. The index keeps the order total.
    events.sort_unstable_by(|a, b| {
        scratch[a.index]
            .time
            .total_cmp(&scratch[b.index].time)
            .then(b.enter.cmp(&a.enter))
            .then(a.index.cmp(&b.index))
    });

    let mut depth: usize = 0;
    let mut in_subtrahend = false;
    let mut inside = false;
    let mut written = 0;
    for event in &events {
        if op == Op::Difference && event.group == 1 {
            in_subtrahend = event.enter;
        } else if event.enter {
            depth += 1;
        } else {
            depth = depth.saturating_sub(1);
        }
        let now = op.inside(depth, groups, in_subtrahend);
        if now == inside {
            continue;
        }
        inside = now;
        let hit = scratch[event.index];
        // Two flips at the same time cancel out.
        if written > 0 && hits[written - 1].time == hit.time {
            written -= 1;
        } else {
            hits[written] = hit;
            written += 1;
        }
    }
    written
}

/// Fast path shared by intersections and differences: the first boundary
/// of a full hit list that lies in range.
fn first_in_range<'a>(hits: &[Hit<'a>], ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
    match first_hit(hits, max_time) {
        Some(hit) => {
            info.resolve(ray, hit);
            true
        }
        None => false,
    }
}

fn any_in_shadow_window(hits: &[Hit<'_>]) -> bool {
    hits.iter().any(|h| h.time > EPSILON && h.time < 1.0)
}

/// Everything inside any child.
#[derive(Debug, Clone)]
pub struct Union {
    children: Vec<Shape>,
    bounds: Bounds,
    max_hits: usize,
    pub(crate) check: BoundsCheck,
}

impl Union {
    pub fn new(children: Vec<Shape>) -> Self {
        let bounds = children
            .iter()
            .fold(Bounds::Void, |acc, c| acc + c.bounds());
        let max_hits = children.iter().map(Shape::max_hits).sum();
        Self {
            children,
            bounds,
            max_hits,
            check: BoundsCheck::default(),
        }
    }

    pub fn children(&self) -> &[Shape] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Shape] {
        &mut self.children
    }

    pub fn into_children(self) -> Vec<Shape> {
        self.children
    }

    /// Rebuild with every child rewritten, keeping the check settings.
    pub fn map_children(self, f: impl FnMut(Shape) -> Shape) -> Self {
        let check = self.check;
        let mut rebuilt = Self::new(self.children.into_iter().map(f).collect());
        rebuilt.check = check;
        rebuilt
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn max_hits(&self) -> usize {
        self.max_hits
    }

    pub fn shadow_test(&self, ray: &Ray) -> bool {
        if self.check.enabled && !self.bounds.intersects(ray, 1.0) {
            return false;
        }
        self.children.iter().any(|c| c.shadow_test(ray))
    }

    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        if self.check.enabled && !self.bounds.intersects(ray, max_time) {
            return false;
        }
        let mut closest = max_time;
        let mut found = false;
        for child in &self.children {
            if child.hit_test(ray, closest, info) {
                closest = info.time;
                found = true;
            }
        }
        found
    }

    pub fn get_hits<'a>(&'a self, ray: &Ray, hits: &mut [Hit<'a>]) -> usize {
        match self.children.as_slice() {
            [] => 0,
            [only] => only.get_hits(ray, hits),
            children => merge_children(
                Op::Union,
                children,
                children.len(),
                ray,
                self.max_hits,
                hits,
            ),
        }
    }
}

/// Everything inside all children.
#[derive(Debug, Clone)]
pub struct Intersection {
    children: Vec<Shape>,
    bounds: Bounds,
    max_hits: usize,
    pub(crate) check: BoundsCheck,
}

impl Intersection {
    pub fn new(children: Vec<Shape>) -> Self {
        let bounds = if children.is_empty() {
            Bounds::Void
        } else {
            children
                .iter()
                .fold(Bounds::Universe, |acc, c| acc * c.bounds())
        };
        let max_hits = children.iter().map(Shape::max_hits).sum();
        Self {
            children,
            bounds,
            max_hits,
            check: BoundsCheck::default(),
        }
    }

    pub fn children(&self) -> &[Shape] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Shape] {
        &mut self.children
    }

    pub fn into_children(self) -> Vec<Shape> {
        self.children
    }

    pub fn map_children(self, f: impl FnMut(Shape) -> Shape) -> Self {
        let check = self.check;
        let mut rebuilt = Self::new(self.children.into_iter().map(f).collect());
        rebuilt.check = check;
        rebuilt
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn max_hits(&self) -> usize {
        self.max_hits
    }

    pub fn shadow_test(&self, ray: &Ray) -> bool {
        if self.check.enabled && !self.bounds.intersects(ray, 1.0) {
            return false;
        }
        let mut hits: HitBuffer<'_> = SmallVec::from_elem(Hit::default(), self.max_hits);
        let count = self.get_hits(ray, &mut hits);
        any_in_shadow_window(&hits[..count])
    }

    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        if self.check.enabled && !self.bounds.intersects(ray, max_time) {
            return false;
        }
        let mut hits: HitBuffer<'_> = SmallVec::from_elem(Hit::default(), self.max_hits);
        let count = self.get_hits(ray, &mut hits);
        first_in_range(&hits[..count], ray, max_time, info)
    }

    pub fn get_hits<'a>(&'a self, ray: &Ray, hits: &mut [Hit<'a>]) -> usize {
        if self.children.is_empty() {
            return 0;
        }
        merge_children(
            Op::Intersection,
            &self.children,
            self.children.len(),
            ray,
            self.max_hits,
            hits,
        )
    }
}

/// Everything inside the minuend and outside the subtrahend.
#[derive(Debug, Clone)]
pub struct Difference {
    minuend: Box<Shape>,
    subtrahend: Box<Shape>,
    max_hits: usize,
    pub(crate) check: BoundsCheck,
}

impl Difference {
    pub fn new(minuend: Shape, subtrahend: Shape) -> Self {
        let max_hits = minuend.max_hits() + subtrahend.max_hits();
        Self {
            minuend: Box::new(minuend),
            subtrahend: Box::new(subtrahend),
            max_hits,
            check: BoundsCheck::default(),
        }
    }

    pub fn minuend(&self) -> &Shape {
        &self.minuend
    }

    pub fn subtrahend(&self) -> &Shape {
        &self.subtrahend
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Shape, &mut Shape) {
        (&mut self.minuend, &mut self.subtrahend)
    }

    pub fn into_parts(self) -> (Shape, Shape) {
        (*self.minuend, *self.subtrahend)
    }

    pub fn map_children(self, mut f: impl FnMut(Shape) -> Shape) -> Self {
        let check = self.check;
        let mut rebuilt = Self::new(f(*self.minuend), f(*self.subtrahend));
        rebuilt.check = check;
        rebuilt
    }

    /// Removing material never grows the solid.
    pub fn bounds(&self) -> Bounds {
        self.minuend.bounds()
    }

    pub fn max_hits(&self) -> usize {
        self.max_hits
    }

    pub fn shadow_test(&self, ray: &Ray) -> bool {
        if self.check.enabled && !self.bounds().intersects(ray, 1.0) {
            return false;
        }
        let mut hits: HitBuffer<'_> = SmallVec::from_elem(Hit::default(), self.max_hits);
        let count = self.get_hits(ray, &mut hits);
        any_in_shadow_window(&hits[..count])
    }

    pub fn hit_test<'a>(&'a self, ray: &Ray, max_time: f64, info: &mut HitInfo<'a>) -> bool {
        if self.check.enabled && !self.bounds().intersects(ray, max_time) {
            return false;
        }
        let mut hits: HitBuffer<'_> = SmallVec::from_elem(Hit::default(), self.max_hits);
        let count = self.get_hits(ray, &mut hits);
        first_in_range(&hits[..count], ray, max_time, info)
    }

    pub fn get_hits<'a>(&'a self, ray: &Ray, hits: &mut [Hit<'a>]) -> usize {
        merge_children(
            Op::Difference,
            [&*self.minuend, &*self.subtrahend],
            2,
            ray,
            self.max_hits,
            hits,
        )
    }
}
