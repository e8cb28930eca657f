/// Application name used for cache, data and store directories.
pub const APP_NAME: &str = "lakeflake";

/// Descriptor file name, both for the project and inside inputs.
pub const DESCRIPTOR_FILENAME: &str = "lakeflake.toml";

/// Environment variable overriding the store location.
pub const STORE_ENV: &str = "LAKEFLAKE_STORE";

/// Length of the truncated object hashes used in store paths.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;
