mod sled_config_store;

pub use sled_config_store::*;


use crate::StorageError;

#[doc(hidden)]
pub fn init_sled_config_db(
    sled_db_root_path: impl AsRef<std::path::Path> + std::fmt::Debug
) -> Result<sled::Db, StorageError> {
    tracing::debug!("init_sled_config_db from path: {:?}", &sled_db_root_path);

    let path = sled_db_root_path.as_ref();
    let config_db_path = path.join("config_store");

    sled::Config::default()
        .path(&config_db_path)
        .cache_capacity(10 * 1024 * 1024) //10MB
        .flush_every_ms(Some(3))
        .use_compression(true)
        .compression_factor(1)
        .open()
        .map_err(|e| {
            tracing::warn!(
                "Try to open DB at this location: {:?} and failed: {:?}",
                config_db_path,
                e
            );
            e.into()
        })
}
