use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Missing required value '{0}'")]
    MissingValue(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("failed to read config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("failed to connect to {host}: {message}")]
    Connection { host: String, message: String },

    #[error("command `{command}` failed: {message}")]
    CommandExecution { command: String, message: String },

    #[error("VM {}: could not extract {}", .id, .missing.join(", "))]
    Extraction {
        id: String,
        missing: Vec<&'static str>,
    },

    #[error("VM {id} is not running")]
    NotRunning { id: String },

    #[error("unknown host or group '{0}'")]
    UnknownEntity(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl InventoryError {
    /// Errors that only cost a single VM its place in the inventory.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            InventoryError::CommandExecution { .. }
                | InventoryError::Extraction { .. }
                | InventoryError::NotRunning { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_split() {
        assert!(!InventoryError::MissingValue("hostname").is_recoverable());
        assert!(!InventoryError::InvalidValue {
            name: "command_timeout",
            reason: "must be at least 1 second".into(),
        }
        .is_recoverable());
        assert!(!InventoryError::Connection {
            host: "esx01".into(),
            message: "refused".into(),
        }
        .is_recoverable());
        assert!(InventoryError::Extraction {
            id: "12".into(),
            missing: vec!["guest_state"],
        }
        .is_recoverable());
        assert!(InventoryError::NotRunning { id: "3".into() }.is_recoverable());
    }

    #[test]
    fn test_messages() {
        let err = InventoryError::MissingValue("password");
        assert_eq!(err.to_string(), "Missing required value 'password'");

        let err = InventoryError::Extraction {
            id: "7".into(),
            missing: vec!["hostname", "ip_address"],
        };
        assert_eq!(err.to_string(), "VM 7: could not extract hostname, ip_address");
    }
}
