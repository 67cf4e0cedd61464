use std::path::PathBuf;
use std::time::Duration;

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment,
    parse_lifetime, parse_millis, parse_u16, parse_u32, parse_u64,
};
use super::secret::load_or_create_jwt_secret;
use super::types::{
    ConfigError, CorsSettings, DatabaseSettings, RateLimitSettings, RuntimeSettings,
    SecuritySettings, ServerHost, ServerPort, ServerSettings, Settings, ShutdownSettings,
    TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("HOST", "0.0.0.0");
        let port = env_or_default("PORT", "5000");

        let environment =
            parse_environment(env_optional("APP_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let jwt_secret = match env_optional("JWT_SECRET") {
            Some(value) => value,
            None if strict_config => return Err(ConfigError::MissingSecret("JWT_SECRET")),
            None => {
                let path = PathBuf::from(env_or_default("JWT_SECRET_FILE", ".jwt_secret"));
                load_or_create_jwt_secret(&path)
            }
        };
        let token_lifetime =
            parse_lifetime("JWT_EXPIRES_IN", env_or_default("JWT_EXPIRES_IN", "24h"))?;
        let algorithm = env_or_default("JWT_ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("CORS_ORIGIN"));

        let database = DatabaseSettings {
            server: env_or_default("DB_SERVER", "localhost"),
            port: parse_u16("DB_PORT", env_or_default("DB_PORT", "5432"))?,
            database: env_or_default("DB_DATABASE", "exam_portal"),
            user: env_or_default("DB_USER", "postgres"),
            password: env_or_default("DB_PASSWORD", ""),
            encrypt: env_optional("DB_ENCRYPT").map(|value| parse_bool(&value)).unwrap_or(false),
            trust_server_certificate: env_optional("DB_TRUST_SERVER_CERTIFICATE")
                .map(|value| parse_bool(&value))
                .unwrap_or(true),
            database_url: env_optional("DATABASE_URL"),
            pool_max: parse_u32("DB_POOL_MAX", env_or_default("DB_POOL_MAX", "10"))?,
            pool_min: parse_u32("DB_POOL_MIN", env_or_default("DB_POOL_MIN", "0"))?,
            idle_timeout: parse_millis(
                "DB_IDLE_TIMEOUT_MS",
                env_or_default("DB_IDLE_TIMEOUT_MS", "30000"),
            )?,
            connection_timeout: parse_millis(
                "DB_CONNECTION_TIMEOUT_MS",
                env_or_default("DB_CONNECTION_TIMEOUT_MS", "30000"),
            )?,
            request_timeout: parse_millis(
                "DB_REQUEST_TIMEOUT_MS",
                env_or_default("DB_REQUEST_TIMEOUT_MS", "30000"),
            )?,
        };

        let rate_limit = RateLimitSettings {
            enabled: env_optional("RATE_LIMIT_ENABLED")
                .map(|value| parse_bool(&value))
                .unwrap_or(true),
            window: Duration::from_secs(
                60 * parse_u64(
                    "RATE_LIMIT_WINDOW_MINUTES",
                    env_or_default("RATE_LIMIT_WINDOW_MINUTES", "15"),
                )?,
            ),
            max_requests: parse_u32("RATE_LIMIT_MAX", env_or_default("RATE_LIMIT_MAX", "100"))?,
            auth_max_requests: parse_u32(
                "AUTH_RATE_LIMIT_MAX",
                env_or_default("AUTH_RATE_LIMIT_MAX", "5"),
            )?,
        };

        let grace_period = Duration::from_secs(parse_u64(
            "SHUTDOWN_TIMEOUT_SECONDS",
            env_or_default("SHUTDOWN_TIMEOUT_SECONDS", "10"),
        )?);

        let log_level = env_or_default("LOG_LEVEL", "info");
        let json = env_optional("LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            security: SecuritySettings { jwt_secret, token_lifetime, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database,
            rate_limit,
            shutdown: ShutdownSettings { grace_period },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn rate_limit(&self) -> &RateLimitSettings {
        &self.rate_limit
    }

    pub(crate) fn shutdown(&self) -> &ShutdownSettings {
        &self.shutdown
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.pool_max == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DB_POOL_MAX",
                value: "0".to_string(),
            });
        }

        if self.database.pool_min > self.database.pool_max {
            return Err(ConfigError::InvalidValue {
                field: "DB_POOL_MIN",
                value: self.database.pool_min.to_string(),
            });
        }

        if self.database.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "DB_REQUEST_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }

        if self.rate_limit.enabled {
            if self.rate_limit.window.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "RATE_LIMIT_WINDOW_MINUTES",
                    value: "0".to_string(),
                });
            }
            if self.rate_limit.max_requests == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "RATE_LIMIT_MAX",
                    value: "0".to_string(),
                });
            }
            if self.rate_limit.auth_max_requests == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "AUTH_RATE_LIMIT_MAX",
                    value: "0".to_string(),
                });
            }
        }

        if self.security.algorithm != "HS256" {
            return Err(ConfigError::InvalidValue {
                field: "JWT_ALGORITHM",
                value: self.security.algorithm.clone(),
            });
        }

        if !self.runtime.strict_config {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.password.is_empty() {
            return Err(ConfigError::MissingSecret("DB_PASSWORD"));
        }

        Ok(())
    }
}
