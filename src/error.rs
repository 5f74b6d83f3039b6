use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("destination rejected {operation} on slot {}: HTTP {status}: {message}", slot_label(.slot))]
    Api {
        operation: &'static str,
        slot: Option<u64>,
        status: u16,
        message: String,
    },

    #[error("slot mismatch: expected destination to assign #{expected}, got #{actual}")]
    SlotMismatch { expected: u64, actual: u64 },

    #[error("consistency error: destination slot #{0} is missing, refusing to create #{next}", next = .0 + 1)]
    MissingPredecessor(u64),

    #[error("invalid export: {0}")]
    InvalidExport(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("no API token given (use --token or set GITHUB_TOKEN)")]
    MissingCredential,

    #[error("locked by another process: {0}")]
    Locked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

fn slot_label(slot: &Option<u64>) -> String {
    slot.map(|s| format!("#{s}")).unwrap_or_else(|| "<new>".into())
}

impl PortError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api_error",
            Self::SlotMismatch { .. } => "slot_mismatch",
            Self::MissingPredecessor(_) => "missing_predecessor",
            Self::InvalidExport(_) => "invalid_export",
            Self::InvalidConfig(_) => "invalid_config",
            Self::MissingCredential => "missing_credential",
            Self::Locked(_) => "locked",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Yaml(_) => "yaml_error",
            Self::Http(_) => "http_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, PortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_names_operation_and_slot() {
        let err = PortError::Api {
            operation: "update",
            slot: Some(7),
            status: 422,
            message: "Validation Failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "destination rejected update on slot #7: HTTP 422: Validation Failed"
        );
        assert_eq!(err.code(), "api_error");
    }

    #[test]
    fn missing_predecessor_names_both_slots() {
        let err = PortError::MissingPredecessor(3);
        assert!(err.to_string().contains("#3 is missing"));
        assert!(err.to_string().contains("create #4"));
    }
}
