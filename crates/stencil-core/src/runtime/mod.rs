//! Render-time machinery: values, scopes, modifiers, expression
//! evaluation and op-tree interpretation.

pub mod eval;
pub mod modifiers;
pub mod render;
pub mod scope;
pub mod value;

#[cfg(test)]
mod tests;

pub use eval::EvalEnv;
pub use modifiers::ModifierRegistry;
pub use render::{
    IncludeUnit, NoSubTemplates, PluginRegistry, RenderOutput, Renderer, SubTemplates,
};
pub use scope::{LoopProps, Scopes};
