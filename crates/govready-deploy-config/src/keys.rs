//! 認識される設定キー

pub const PERSIST_STACK: &str = "PERSIST_STACK";
pub const COMPOSE_PROJECT_NAME: &str = "COMPOSE_PROJECT_NAME";
pub const GIT_URL: &str = "GIT_URL";
pub const ADMINS: &str = "ADMINS";
pub const OKTA: &str = "OKTA";
pub const OIDC: &str = "OIDC";
pub const MOUNT_FOLDER: &str = "MOUNT_FOLDER";
pub const ALLOWED_HOSTS: &str = "ALLOWED_HOSTS";
pub const DEBUG: &str = "DEBUG";
pub const APP_DOCKER_PORT: &str = "APP_DOCKER_PORT";
pub const HOST_ADDRESS: &str = "HOST_ADDRESS";
pub const HEALTH_CHECK_GOVREADY_Q: &str = "HEALTH_CHECK_GOVREADY_Q";
pub const DATABASE_CONNECTION_STRING: &str = "DATABASE_CONNECTION_STRING";
pub const DB_ENGINE: &str = "DB_ENGINE";
pub const HOST_PORT_HTTPS: &str = "HOST_PORT_HTTPS";

pub const NGINX_CERT: &str = "NGINX_CERT";
pub const NGINX_KEY: &str = "NGINX_KEY";
pub const BRANDING: &str = "BRANDING";
