//! Connection-related data models.
//!
//! This module defines the immutable connection settings shared by every
//! database handle the gateway opens.

/// Default ODBC data source name.
pub const DEFAULT_DSN: &str = "FileMaker";

/// Database files known to the gateway.
pub const DEFAULT_DATABASES: &[&str] = &[
    "Appointments",
    "CLOrders",
    "Dispenses",
    "Email",
    "Lookups",
    "Open",
    "OpenAdmin",
    "OpenMngr",
    "Patients",
    "ProdPrices",
    "Timecards",
    "Transactions",
];

/// Connection settings supplied once at startup and never mutated.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// ODBC data source name, or the database directory for the SQLite driver.
    pub data_source: String,
    pub username: Option<String>,
    /// Contains sensitive data - never log
    pub password: Option<String>,
    /// Database used when a caller does not name one.
    pub default_database: Option<String>,
}

impl ConnectionConfig {
    /// Create a configuration for a data source without credentials.
    pub fn new(data_source: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            username: None,
            password: None,
            default_database: None,
        }
    }

    /// Set the login credentials. Empty values are treated as absent.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into()).filter(|s| !s.is_empty());
        self.password = Some(password.into()).filter(|s| !s.is_empty());
        self
    }

    /// Set the default database.
    pub fn with_default_database(mut self, database: impl Into<String>) -> Self {
        self.default_database = Some(database.into()).filter(|s| !s.is_empty());
        self
    }

    /// Resolve the database a connection should target.
    ///
    /// An empty name falls back to the configured default; `None` means the
    /// driver's own default applies.
    pub fn resolve_database<'a>(&'a self, database: &'a str) -> Option<&'a str> {
        if database.is_empty() {
            self.default_database.as_deref()
        } else {
            Some(database)
        }
    }

    /// Build the ODBC connection string for a database.
    ///
    /// The SequeLink driver selects the hosted file through `ServerDataSource`.
    pub fn odbc_connection_string(&self, database: &str) -> String {
        let mut parts = vec![format!("DSN={}", self.data_source)];
        if let Some(db) = self.resolve_database(database) {
            parts.push(format!("ServerDataSource={}", db));
        }
        if let Some(user) = &self.username {
            parts.push(format!("UID={}", user));
        }
        if let Some(password) = &self.password {
            parts.push(format!("PWD={}", password));
        }
        parts.join(";")
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DSN)
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("data_source", &self.data_source)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("default_database", &self.default_database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_full() {
        let config = ConnectionConfig::new("FileMaker").with_credentials("admin", "secret");
        assert_eq!(
            config.odbc_connection_string("Patients"),
            "DSN=FileMaker;ServerDataSource=Patients;UID=admin;PWD=secret"
        );
    }

    #[test]
    fn test_connection_string_omits_empty_parts() {
        let config = ConnectionConfig::new("FM").with_credentials("", "");
        assert_eq!(config.odbc_connection_string(""), "DSN=FM");
        assert!(config.username.is_none());
        assert!(config.password.is_none());
    }

    #[test]
    fn test_empty_database_uses_default() {
        let config = ConnectionConfig::new("FM").with_default_database("Open");
        assert_eq!(config.resolve_database(""), Some("Open"));
        assert_eq!(config.resolve_database("Email"), Some("Email"));
        assert_eq!(
            config.odbc_connection_string(""),
            "DSN=FM;ServerDataSource=Open"
        );
    }

    #[test]
    fn test_debug_masks_password() {
        let config = ConnectionConfig::new("FM").with_credentials("bob", "hunter2");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_default_catalog() {
        assert_eq!(DEFAULT_DATABASES.len(), 12);
        assert!(DEFAULT_DATABASES.contains(&"Patients"));
    }
}
