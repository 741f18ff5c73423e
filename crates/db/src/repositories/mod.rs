pub mod contractor_repo;
pub mod refresh_token_repo;
pub mod task_repo;

pub use contractor_repo::ContractorRepo;
pub use refresh_token_repo::RefreshTokenRepo;
pub use task_repo::{ClaimOutcome, TaskRepo};
