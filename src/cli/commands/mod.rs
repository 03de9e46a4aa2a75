pub mod fetch;
pub mod fields;
pub mod render;
pub mod validate;

pub use fetch::fetch_command;
pub use fields::fields_command;
pub use render::render_command;
pub use validate::validate_command;
