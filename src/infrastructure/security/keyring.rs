use crate::domain::error::{AppError, Result};
use keyring::Entry;

/// Read-only view of the OS keychain, scoped to one service name.
pub struct KeyringManager {
    service: String,
}

impl KeyringManager {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    pub fn get_secret(&self, key: &str) -> Result<String> {
        let entry = Entry::new(&self.service, key)
            .map_err(|e| AppError::SecurityError(format!("Failed to create entry: {}", e)))?;

        entry
            .get_password()
            .map_err(|e| AppError::SecurityError(format!("Failed to get password: {}", e)))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_secret_reads_stored_password() {
        memory_store::install();
        Entry::new("ollabot-keyring-test", "db_password")
            .unwrap()
            .set_password("hunter2")
            .unwrap();

        let manager = KeyringManager::new("ollabot-keyring-test");
        assert_eq!(manager.get_secret("db_password").unwrap(), "hunter2");
    }

    #[test]
    fn test_get_secret_missing_entry_is_security_error() {
        memory_store::install();
        let manager = KeyringManager::new("ollabot-keyring-test");
        let err = manager.get_secret("never_stored").unwrap_err();
        assert!(matches!(err, AppError::SecurityError(_)));
    }
}
