//! Configuration system
//!
//! TOML file sections declared once with embedded defaults (`config_struct!`)
//! and a global, reloadable instance for the binary entry point.

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{
    Config, CoordinatorConfig, RegistryConfig, SourceConfig, StatsCacheConfig, WebserverConfig,
};
pub use utils::{
    get_config_clone, load_config, load_config_from_path, read_config_file,
    reload_config_from_path, with_config, CONFIG_FILE_PATH,
};
