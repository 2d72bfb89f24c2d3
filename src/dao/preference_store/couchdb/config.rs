use std::time::Duration;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "mvp_anthem";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the preference documents live and how to authenticate against CouchDB.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding the preference documents.
    pub database: String,
    /// Basic-auth user and password.
    pub credentials: Option<(String, String)>,
    /// Bound on every request.
    pub request_timeout: Duration,
}

impl CouchConfig {
    /// Configuration for `base_url` using the default database.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: DEFAULT_DATABASE.to_owned(),
            credentials: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Use `database` instead of the default.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Authenticate every request with basic auth.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Read `COUCH_BASE_URL` and the optional `COUCH_DB`, `COUCH_USERNAME` and `COUCH_PASSWORD`.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let base_url = lookup("COUCH_BASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL",
            })?;

        let mut config = Self::new(base_url);
        if let Some(database) = lookup("COUCH_DB").filter(|db| !db.is_empty()) {
            config = config.with_database(database);
        }
        if let (Some(username), Some(password)) = (lookup("COUCH_USERNAME"), lookup("COUCH_PASSWORD"))
        {
            config = config.with_credentials(username, password);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup<'a>(vars: &'a HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| vars.get(key).map(|value| value.to_string())
    }

    #[test]
    fn database_defaults_and_credentials_need_both_parts() {
        let vars = HashMap::from([
            ("COUCH_BASE_URL", "http://couch:5984"),
            ("COUCH_USERNAME", "admin"),
        ]);
        let config = CouchConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.database, "mvp_anthem");
        assert!(config.credentials.is_none());

        let vars = HashMap::from([
            ("COUCH_BASE_URL", "http://couch:5984"),
            ("COUCH_DB", "prefs"),
            ("COUCH_USERNAME", "admin"),
            ("COUCH_PASSWORD", "secret"),
        ]);
        let config = CouchConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.database, "prefs");
        assert_eq!(
            config.credentials,
            Some(("admin".to_owned(), "secret".to_owned()))
        );
    }

    #[test]
    fn base_url_is_required() {
        let vars = HashMap::from([("COUCH_DB", "prefs")]);
        assert!(matches!(
            CouchConfig::from_lookup(lookup(&vars)),
            Err(CouchDaoError::MissingEnvVar {
                var: "COUCH_BASE_URL"
            })
        ));
    }
}
