// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod api;
pub mod cache;
pub mod debounce;
pub mod forms;
pub mod ids;
pub mod model;
pub mod query;
pub mod sort;
pub mod state;
pub mod status_editor;
pub mod validation;

pub use api::*;
pub use cache::*;
pub use debounce::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use query::*;
pub use sort::*;
pub use state::*;
pub use status_editor::*;
pub use validation::*;
