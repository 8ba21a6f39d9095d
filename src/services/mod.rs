pub mod fetcher;
pub mod job_queue;
pub mod notifier;
pub mod og_extractor;
pub mod preview_processor;
pub mod preview_repository;
pub mod preview_service;

#[cfg(test)]
pub mod testing;
