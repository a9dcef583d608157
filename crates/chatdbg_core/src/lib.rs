pub mod config;
pub mod corpus;
pub mod db;
pub mod error;
pub mod ingest;
pub mod interaction_log;
pub mod lang;

#[cfg(test)]
mod tests {
    use super::error::AppError;

    #[test]
    fn app_error_is_structured() {
        let err = AppError::new("DB_TEST", "db failed").with_retryable(false);
        assert_eq!(err.code, "DB_TEST");
        assert_eq!(err.message, "db failed");
        assert_eq!(err.retryable, false);
    }

    #[test]
    fn resource_load_wraps_inner_code() {
        let err = AppError::new("DB_OPEN_FAILED", "Corpus database not found")
            .with_details("path=/x")
            .into_resource_load("corpus");
        assert_eq!(err.code, "RESOURCE_LOAD_FAILED");
        assert!(err.details.unwrap().contains("DB_OPEN_FAILED"));
    }

    #[test]
    fn rate_limit_has_friendly_user_message() {
        let err = AppError::rate_limited("status=429");
        assert!(err.retryable);
        assert!(!err.user_message().contains("429"));
    }
}
