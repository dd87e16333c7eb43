pub mod google_sheets;
pub mod in_memory_store;
