pub mod project_cache;
