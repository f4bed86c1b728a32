mod engine;

pub use engine::{MigrationTemplateContext, TemplateEngine, TemplateError};
