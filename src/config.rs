use std::env;
use std::path::PathBuf;

const DEFAULT_JWT_SECRET: &str = "your-secret-key";
const DEFAULT_SALT: &str = "floortrack";

/// Runtime configuration, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub public_dir: PathBuf,
    pub jwt_secret: String,
    pub password_salt: String,
    pub admin_login_enabled: bool,
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("data"),
            public_dir: PathBuf::from("public"),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            password_salt: DEFAULT_SALT.to_string(),
            admin_login_enabled: true,
            max_image_bytes: 10 * 1024 * 1024,
            max_video_bytes: 100 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                log::warn!("JWT_SECRET is not set, falling back to the built-in development secret");
                defaults.jwt_secret
            }
        };

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parsed("PORT").unwrap_or(defaults.port),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            public_dir: env::var("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            jwt_secret,
            password_salt: env::var("PASSWORD_SALT").unwrap_or(defaults.password_salt),
            admin_login_enabled: parsed("ADMIN_LOGIN_ENABLED")
                .unwrap_or(defaults.admin_login_enabled),
            max_image_bytes: parsed("MAX_IMAGE_BYTES").unwrap_or(defaults.max_image_bytes),
            max_video_bytes: parsed("MAX_VIDEO_BYTES").unwrap_or(defaults.max_video_bytes),
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join("uploads")
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring unparsable value for {key}: {raw:?}");
            None
        }
    }
}
