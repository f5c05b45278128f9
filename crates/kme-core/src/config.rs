//! Shared env-var accessor helpers (§6), in the teacher's `config/db.rs` style:
//! explicit typed accessors with documented defaults, `ConfigError` on bad values.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::domain::DomainError;

pub fn var(name: &str) -> Option<String> {
    env::var(name).ok()
}

pub fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

pub fn must_var(name: &str) -> Result<String, DomainError> {
    env::var(name).map_err(|_| {
        DomainError::config(format!("required environment variable '{name}' is not set"))
    })
}

/// Parses an env var with a default, failing with [`DomainError::Config`] if set
/// but unparseable, rather than silently falling back.
pub fn parsed_or<T: FromStr>(name: &str, default: T) -> Result<T, DomainError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| DomainError::config(format!("invalid value for '{name}': {e}"))),
        Err(_) => Ok(default),
    }
}

pub fn duration_secs_or(name: &str, default_secs: u64) -> Result<Duration, DomainError> {
    let secs: u64 = parsed_or(name, default_secs)?;
    Ok(Duration::from_secs(secs))
}

pub fn bool_or(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn parsed_or_falls_back_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("KME_CORE_TEST_VAL");
        let v: u32 = parsed_or("KME_CORE_TEST_VAL", 7).unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn parsed_or_rejects_garbage() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("KME_CORE_TEST_VAL", "not-a-number");
        let err = parsed_or::<u32>("KME_CORE_TEST_VAL", 7);
        assert!(err.is_err());
        env::remove_var("KME_CORE_TEST_VAL");
    }
}
