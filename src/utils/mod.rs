pub mod environment;

pub use environment::{default_data_dir, env_override, get_config_path};
