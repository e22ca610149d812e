mod cache_store;
mod errors;
mod types;

pub async fn init() -> Result<(), errors::StorageError> {
    let _ = *cache_store::GENERIC_CACHE_STORE;

    Ok(())
}

pub use cache_store::GENERIC_CACHE_STORE;
pub use errors::StorageError;
pub use types::CacheData;
