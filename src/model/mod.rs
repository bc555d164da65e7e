//! Model tree: the merged option state of one chart instance.

mod component_model;
mod global_model;
mod level_style;
pub mod option;
mod payload;
mod series_data;
mod series_model;

pub use component_model::{
    ComponentModel, ComponentQuery, ModelIdentity, ModelNode, ModelState, ModelUid,
};
pub use global_model::{GlobalModel, MergeOpts, ModelTypeTable};
pub use level_style::LevelStyleTable;
pub use payload::{Payload, RenderMethod};
pub use series_data::{DataRow, DataValues, ItemLayout, ItemVisual, SeriesData, VisualPatch};
pub use series_model::{SelectOp, SeriesModel};
