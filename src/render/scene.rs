use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::{CirclePrimitive, Color, LinePrimitive, RectPrimitive, TextPrimitive};

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a scene group; unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl GroupId {
    fn next() -> Self {
        Self(NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Drawable payload of one scene element.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Line(LinePrimitive),
    Rect(RectPrimitive),
    Circle(CirclePrimitive),
    Text(TextPrimitive),
}

/// Hover-driven state of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Normal,
    Emphasis,
    Blur,
}

/// Named state currently applied to an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementState {
    Emphasis,
    Blur,
    Select,
}

/// One drawable inside a [`Group`].
///
/// Hover/select changes only flag the element; the applied state list is
/// recomputed by [`Element::apply_states`] on the next frame so several
/// toggles within one frame collapse into a single repaint.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    shape: Shape,
    z: f64,
    data_index: Option<usize>,
    hover: HoverState,
    selected: bool,
    current_states: SmallVec<[ElementState; 2]>,
    states_dirty: bool,
}

impl Element {
    #[must_use]
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            z: 0.0,
            data_index: None,
            hover: HoverState::Normal,
            selected: false,
            current_states: SmallVec::new(),
            states_dirty: false,
        }
    }

    #[must_use]
    pub fn with_z(mut self, z: f64) -> Self {
        self.z = z;
        self
    }

    #[must_use]
    pub fn with_data_index(mut self, data_index: usize) -> Self {
        self.data_index = Some(data_index);
        self
    }

    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[must_use]
    pub fn z(&self) -> f64 {
        self.z
    }

    #[must_use]
    pub fn data_index(&self) -> Option<usize> {
        self.data_index
    }

    #[must_use]
    pub fn hover_state(&self) -> HoverState {
        self.hover
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn set_hover_state(&mut self, hover: HoverState) {
        if self.hover != hover {
            self.hover = hover;
            self.states_dirty = true;
        }
    }

    pub fn set_selected(&mut self, selected: bool) {
        if self.selected != selected {
            self.selected = selected;
            self.states_dirty = true;
        }
    }

    #[must_use]
    pub fn needs_state_update(&self) -> bool {
        self.states_dirty
    }

    /// Recomputes the applied state list from hover/select flags.
    pub fn apply_states(&mut self) {
        self.current_states.clear();
        match self.hover {
            HoverState::Normal => {}
            HoverState::Emphasis => self.current_states.push(ElementState::Emphasis),
            HoverState::Blur => self.current_states.push(ElementState::Blur),
        }
        if self.selected {
            self.current_states.push(ElementState::Select);
        }
        self.states_dirty = false;
    }

    #[must_use]
    pub fn current_states(&self) -> &[ElementState] {
        &self.current_states
    }

    /// Shape with the applied states folded into its paint.
    #[must_use]
    pub fn styled_shape(&self) -> Shape {
        let mut shape = self.shape.clone();
        for state in &self.current_states {
            shape = match (*state, shape) {
                (ElementState::Emphasis, Shape::Circle(mut circle)) => {
                    circle.radius *= 1.2;
                    Shape::Circle(circle)
                }
                (ElementState::Emphasis, Shape::Rect(mut rect)) => {
                    rect.fill_color = lift(rect.fill_color, 0.2);
                    Shape::Rect(rect)
                }
                (ElementState::Blur, shape) => fade(shape, 0.1),
                (ElementState::Select, Shape::Circle(mut circle)) => {
                    circle.fill_color = lift(circle.fill_color, -0.2);
                    Shape::Circle(circle)
                }
                (ElementState::Select, Shape::Rect(mut rect)) => {
                    rect.fill_color = lift(rect.fill_color, -0.2);
                    Shape::Rect(rect)
                }
                (_, shape) => shape,
            };
        }
        shape
    }
}

fn lift(color: Color, amount: f64) -> Color {
    let channel = |value: f64| {
        if amount >= 0.0 {
            value + (1.0 - value) * amount
        } else {
            value * (1.0 + amount)
        }
    };
    Color::rgba(
        channel(color.red),
        channel(color.green),
        channel(color.blue),
        color.alpha,
    )
}

fn fade(shape: Shape, factor: f64) -> Shape {
    match shape {
        Shape::Line(mut line) => {
            line.color.alpha *= factor;
            Shape::Line(line)
        }
        Shape::Rect(mut rect) => {
            rect.fill_color.alpha *= factor;
            Shape::Rect(rect)
        }
        Shape::Circle(mut circle) => {
            circle.fill_color.alpha *= factor;
            Shape::Circle(circle)
        }
        Shape::Text(mut text) => {
            text.color.alpha *= factor;
            Shape::Text(text)
        }
    }
}

/// Container of elements owned by exactly one view.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    id: GroupId,
    elements: Vec<Element>,
    zlevel: i32,
    z: f64,
    silent: bool,
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Group {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: GroupId::next(),
            elements: Vec::new(),
            zlevel: 0,
            z: 0.0,
            silent: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn add(&mut self, element: Element) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<Element> {
        (index < self.elements.len()).then(|| self.elements.remove(index))
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn zlevel(&self) -> i32 {
        self.zlevel
    }

    pub fn set_zlevel(&mut self, zlevel: i32) {
        self.zlevel = zlevel;
    }

    #[must_use]
    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn set_z(&mut self, z: f64) {
        self.z = z;
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Applies pending state changes; returns how many elements changed.
    pub fn apply_changed_states(&mut self) -> usize {
        let mut changed = 0;
        for element in &mut self.elements {
            if element.needs_state_update() {
                element.apply_states();
                changed += 1;
            }
        }
        changed
    }
}

/// Set of groups currently attached to the painted scene, in attach order.
#[derive(Debug, Default)]
pub struct SceneRoot {
    attached: IndexSet<GroupId>,
}

impl SceneRoot {
    /// Attaches a group. Returns `false` when it was already attached.
    pub fn add(&mut self, group: GroupId) -> bool {
        self.attached.insert(group)
    }

    /// Detaches a group. Returns `false` when it was not attached.
    pub fn remove(&mut self, group: GroupId) -> bool {
        self.attached.shift_remove(&group)
    }

    #[must_use]
    pub fn contains(&self, group: GroupId) -> bool {
        self.attached.contains(&group)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attached.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.attached.iter().copied()
    }

    pub fn clear(&mut self) {
        self.attached.clear();
    }
}
