pub mod profile_repository;
pub mod thread_repository;

// Re-export all repositories for convenient access
pub use profile_repository::ProfileRepository;
pub use thread_repository::ThreadRepository;
