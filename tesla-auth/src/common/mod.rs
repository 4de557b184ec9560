mod models;

pub use models::Tokens;
