use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub signing: SigningConfig,
    #[serde(default)]
    pub issuance: IssuanceConfig,
    #[serde(default)]
    pub redemption: RedemptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 外部认证服务签发的访问令牌的共享密钥
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    pub secret: String,
    /// 新签名使用的版本号
    #[serde(default = "default_signature_version")]
    pub version: i32,
    /// 轮换前的历史密钥，只用于校验旧签名
    #[serde(default)]
    pub legacy_keys: Vec<LegacySigningKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySigningKey {
    pub version: i32,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    /// 单次发放最多奖券数
    pub max_tokens_per_call: u32,
    /// 未指定过期时间时的默认有效天数
    pub default_ttl_days: i64,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_call: 5000,
            default_ttl_days: 30,
        }
    }
}

/// 兑换开关的默认值；运行时由 FlagSource 在每次请求时读取
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionConfig {
    pub two_phase_enabled: bool,
    pub self_deliver_enabled: bool,
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            two_phase_enabled: true,
            self_deliver_enabled: false,
        }
    }
}

fn default_signature_version() -> i32 {
    1
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                // 有配置文件：先解析再用环境变量覆盖
                toml::from_str(&config_str).map_err(|e| format!("解析配置文件失败: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 数据库 URL 与签名密钥在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml")?;
                let signing_secret = get_env("TOKEN_SIGNING_SECRET")
                    .ok_or("缺少 TOKEN_SIGNING_SECRET 环境变量，且未找到配置文件 config.toml")?;

                let issuance_defaults = IssuanceConfig::default();
                let redemption_defaults = RedemptionConfig::default();

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                    },
                    signing: SigningConfig {
                        secret: signing_secret,
                        version: get_env_parse("TOKEN_SIGNATURE_VERSION", 1i32),
                        legacy_keys: Vec::new(),
                    },
                    issuance: IssuanceConfig {
                        max_tokens_per_call: get_env_parse(
                            "ISSUANCE_MAX_TOKENS_PER_CALL",
                            issuance_defaults.max_tokens_per_call,
                        ),
                        default_ttl_days: get_env_parse(
                            "ISSUANCE_DEFAULT_TTL_DAYS",
                            issuance_defaults.default_ttl_days,
                        ),
                    },
                    redemption: RedemptionConfig {
                        two_phase_enabled: get_env_parse(
                            "TWO_PHASE_ENABLED",
                            redemption_defaults.two_phase_enabled,
                        ),
                        self_deliver_enabled: get_env_parse(
                            "SELF_DELIVER_ENABLED",
                            redemption_defaults.self_deliver_enabled,
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("TOKEN_SIGNING_SECRET") {
            config.signing.secret = v;
        }
        if let Ok(v) = env::var("TOKEN_SIGNATURE_VERSION")
            && let Ok(n) = v.parse()
        {
            config.signing.version = n;
        }
        if let Ok(v) = env::var("ISSUANCE_MAX_TOKENS_PER_CALL")
            && let Ok(n) = v.parse()
        {
            config.issuance.max_tokens_per_call = n;
        }
        if let Ok(v) = env::var("ISSUANCE_DEFAULT_TTL_DAYS")
            && let Ok(n) = v.parse()
        {
            config.issuance.default_ttl_days = n;
        }
        // TWO_PHASE_ENABLED / SELF_DELIVER_ENABLED 不在此覆盖：
        // EnvFlagSource 每次请求时读取

        if config.signing.secret.is_empty() {
            return Err("签名密钥 signing.secret 不能为空".into());
        }

        Ok(config)
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
