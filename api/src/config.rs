use config::{Config, ConfigError, Environment};
use secrecy::SecretString;
use serde::Deserialize;

/// Service settings, read from the environment (and `.env` when present).
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: SecretString,
    pub cors_origin: String,
    /// Identity provider sign-in page; callers without a session are sent here.
    pub login_url: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "ignoring unreadable .env file");
            }
        }

        Config::builder()
            .set_default("database_url", "ideaboard.db")?
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("jwt_secret", "dev-secret-change-me")?
            .set_default("cors_origin", "http://localhost:3000")?
            .set_default("login_url", "http://localhost:3000/auth/login")?
            .add_source(Environment::default())
            .build()?
            .try_deserialize()
    }

    /// Sign-in URL that returns the caller to `return_to` afterwards.
    pub fn login_redirect(&self, return_to: Option<&str>) -> String {
        match return_to {
            Some(target) => {
                let separator = if self.login_url.contains('?') { "&" } else { "?" };
                format!(
                    "{}{separator}redirect={}",
                    self.login_url,
                    urlencoding::encode(target)
                )
            }
            None => self.login_url.clone(),
        }
    }
}

#[cfg(test)]
pub fn test_settings() -> Settings {
    Settings {
        database_url: ":memory:".into(),
        bind_addr: "127.0.0.1:0".into(),
        jwt_secret: SecretString::from("test-secret".to_string()),
        cors_origin: "http://localhost:3000".into(),
        login_url: "http://localhost:3000/auth/login".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_encodes_return_path() {
        let settings = test_settings();
        assert_eq!(
            settings.login_redirect(Some("/ideas/a b")),
            "http://localhost:3000/auth/login?redirect=%2Fideas%2Fa%20b"
        );
        assert_eq!(settings.login_redirect(None), "http://localhost:3000/auth/login");
    }
}
