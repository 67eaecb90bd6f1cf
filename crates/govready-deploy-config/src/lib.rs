pub mod error;
pub mod file;
pub mod keys;
pub mod resolver;
pub mod settings;
pub mod value;

pub use error::*;
pub use file::{CONFIG_PATH_ENV, find_config_file, get_config_dir, load_config_file};
pub use resolver::{ConfigResolver, validate_host_address};
pub use settings::{BUILD_FILE_KEYS, BuildFileKey, DatabaseMode, DeploymentSettings};
pub use value::is_truthy;
