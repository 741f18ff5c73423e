pub mod contractor;
pub mod refresh_token;
pub mod task;
