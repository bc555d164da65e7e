//! View layer: one stateful view per component or series model, each owning
//! the scene [`Group`] it draws into.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::api::ExtensionApi;
use crate::coord::CoordinateSystemManager;
use crate::core::{Point, Viewport};
use crate::error::{ChartError, ChartResult};
use crate::model::{
    ComponentModel, GlobalModel, ModelNode, ModelUid, Payload, RenderMethod, SeriesModel,
};
use crate::render::{Element, Group, HoverState};

/// Optional entry points a view implements besides `render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewCapabilities {
    pub update_transform: bool,
    pub update_view: bool,
    pub update_visual: bool,
    pub update_layout: bool,
    pub incremental: bool,
    pub contain_point: bool,
}

impl ViewCapabilities {
    /// Whether the render task may call the narrower `method` instead of a
    /// full `render`.
    #[must_use]
    pub fn supports_render_method(self, method: RenderMethod) -> bool {
        match method {
            RenderMethod::Render => true,
            RenderMethod::UpdateView => self.update_view,
            RenderMethod::UpdateVisual => self.update_visual,
            RenderMethod::UpdateLayout => self.update_layout,
            RenderMethod::UpdateTransform => self.update_transform,
        }
    }
}

/// Model a view is asked to draw.
#[derive(Debug, Clone, Copy)]
pub enum ViewModel<'a> {
    Component(&'a ComponentModel),
    Series(&'a SeriesModel),
}

impl<'a> ViewModel<'a> {
    #[must_use]
    pub fn uid(self) -> ModelUid {
        match self {
            Self::Component(component) => component.uid(),
            Self::Series(series) => series.uid(),
        }
    }

    #[must_use]
    pub fn node(self) -> &'a dyn ModelNode {
        match self {
            Self::Component(component) => component,
            Self::Series(series) => series,
        }
    }

    #[must_use]
    pub fn as_series(self) -> Option<&'a SeriesModel> {
        match self {
            Self::Series(series) => Some(series),
            Self::Component(_) => None,
        }
    }

    #[must_use]
    pub fn as_component(self) -> Option<&'a ComponentModel> {
        match self {
            Self::Component(component) => Some(component),
            Self::Series(_) => None,
        }
    }
}

/// Everything a view may read while drawing.
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub global: &'a GlobalModel,
    pub api: &'a ExtensionApi,
    pub coordinate_systems: &'a CoordinateSystemManager,
    pub payload: Option<&'a Payload>,
    pub viewport: Viewport,
}

/// Reply of [`View::update_transform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOutcome {
    /// The change affects layout; visuals of the series must be recomputed.
    pub update: bool,
}

/// Stateful renderer-side object bound to one model.
///
/// Only `render` is mandatory. Narrower update methods fall back to a full
/// render; views advertise which of them are real through
/// [`View::capabilities`].
pub trait View {
    fn type_name(&self) -> &str;

    fn capabilities(&self) -> ViewCapabilities {
        ViewCapabilities::default()
    }

    fn group(&self) -> &Group;

    fn group_mut(&mut self) -> &mut Group;

    fn init(&mut self, _model: ViewModel<'_>, _ctx: &ViewContext<'_>) -> ChartResult<()> {
        Ok(())
    }

    fn render(&mut self, model: ViewModel<'_>, ctx: &ViewContext<'_>) -> ChartResult<()>;

    /// `None` when the view cannot update its transform in place.
    fn update_transform(
        &mut self,
        _model: ViewModel<'_>,
        _ctx: &ViewContext<'_>,
    ) -> ChartResult<Option<TransformOutcome>> {
        Ok(None)
    }

    fn update_view(&mut self, model: ViewModel<'_>, ctx: &ViewContext<'_>) -> ChartResult<()> {
        self.render(model, ctx)
    }

    fn update_visual(&mut self, model: ViewModel<'_>, ctx: &ViewContext<'_>) -> ChartResult<()> {
        self.render(model, ctx)
    }

    fn update_layout(&mut self, model: ViewModel<'_>, ctx: &ViewContext<'_>) -> ChartResult<()> {
        self.render(model, ctx)
    }

    /// Called once before the chunks of a progressive render.
    fn incremental_prepare_render(
        &mut self,
        _series: &SeriesModel,
        _ctx: &ViewContext<'_>,
    ) -> ChartResult<()> {
        self.group_mut().clear();
        Ok(())
    }

    fn incremental_render(
        &mut self,
        _range: Range<usize>,
        _series: &SeriesModel,
        _ctx: &ViewContext<'_>,
    ) -> ChartResult<()> {
        Ok(())
    }

    fn highlight(&mut self, _model: ViewModel<'_>, payload: &Payload) {
        set_hover_state(self.group_mut(), payload, HoverState::Emphasis);
    }

    fn downplay(&mut self, _model: ViewModel<'_>, payload: &Payload) {
        set_hover_state(self.group_mut(), payload, HoverState::Normal);
    }

    /// `None` when hit testing is not supported.
    fn contain_point(&self, _point: Point, _model: ViewModel<'_>) -> Option<bool> {
        None
    }

    /// Drops rendered content; the view stays alive.
    fn remove(&mut self) {
        self.group_mut().clear();
    }

    fn dispose(&mut self) {}

    fn each_rendered(&self, visitor: &mut dyn FnMut(&Element)) {
        for element in self.group().elements() {
            visitor(element);
        }
    }
}

/// Sets the hover state of the payload's `dataIndex` elements, or of every
/// element when the payload names none.
pub fn set_hover_state(group: &mut Group, payload: &Payload, hover: HoverState) {
    let indices = payload.data_indices();
    for element in group.elements_mut() {
        let targeted = match (&indices, element.data_index()) {
            (None, _) => true,
            (Some(indices), Some(index)) => indices.contains(&index),
            (Some(_), None) => false,
        };
        if targeted {
            element.set_hover_state(hover);
        }
    }
}

/// Mirrors the series selection onto the elements of its view.
pub fn sync_selection(group: &mut Group, series: &SeriesModel) {
    for element in group.elements_mut() {
        if let Some(index) = element.data_index() {
            element.set_selected(series.is_selected(index));
        }
    }
}

pub type ViewFactory = Arc<dyn Fn() -> Box<dyn View> + Send + Sync>;

/// `(main_type, sub_type)` to view constructor.
#[derive(Clone, Default)]
pub struct ViewFactories {
    factories: HashMap<(String, String), ViewFactory>,
}

impl ViewFactories {
    pub fn register(&mut self, main_type: &str, sub_type: &str, factory: ViewFactory) {
        self.factories
            .insert((main_type.to_owned(), sub_type.to_owned()), factory);
    }

    #[must_use]
    pub fn contains(&self, main_type: &str, sub_type: &str) -> bool {
        self.lookup(main_type, sub_type).is_some()
    }

    /// Falls back to the untyped `(main_type, "")` factory.
    pub fn create(&self, main_type: &str, sub_type: &str) -> ChartResult<Box<dyn View>> {
        self.lookup(main_type, sub_type)
            .map(|factory| factory())
            .ok_or_else(|| ChartError::ViewNotRegistered {
                main_type: main_type.to_owned(),
                sub_type: sub_type.to_owned(),
            })
    }

    fn lookup(&self, main_type: &str, sub_type: &str) -> Option<&ViewFactory> {
        self.factories
            .get(&(main_type.to_owned(), sub_type.to_owned()))
            .or_else(|| self.factories.get(&(main_type.to_owned(), String::new())))
    }
}

impl fmt::Debug for ViewFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .factories
            .keys()
            .map(|(main, sub)| format!("{main}.{sub}"))
            .collect();
        keys.sort();
        f.debug_struct("ViewFactories").field("types", &keys).finish()
    }
}
