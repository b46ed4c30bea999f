// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod error;
pub mod fallback;
pub mod forms;
pub mod ids;
pub mod model;
pub mod services;
pub mod state;
pub mod table;

pub use error::*;
pub use fallback::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use services::*;
pub use state::*;
pub use table::*;
