pub mod classifier;
pub mod mesh;
pub mod models;
pub mod settings;
pub mod snapshot;
pub mod transitions;
