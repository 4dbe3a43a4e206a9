mod job_repo;
mod user_repo;

pub use job_repo::JobRepo;
pub use user_repo::UserRepo;
