#[cfg(test)]
use std::fs;
#[cfg(test)]
use std::path::{Path, PathBuf};

mod env_parsing;
mod loader;
mod schema;

pub use self::env_parsing::{
    resolve_rpc_endpoints, validate_required_settings, RpcEndpoints, RpcProvider,
};
pub use self::loader::{load_from_env_or_default, load_from_path};
pub use self::schema::{
    AppConfig, DispatchConfig, IngestionConfig, MetadataConfig, PipelineConfig, SystemConfig,
    BAGS_UPDATE_AUTHORITY, WRAPPED_SOL_MINT,
};

#[cfg(test)]
mod tests;
