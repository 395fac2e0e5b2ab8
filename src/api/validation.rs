use thiserror::Error;

use super::models::{MeasurementPayload, OrderPayload, SyncParams};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("{0} is required and must be non-empty")]
    MissingField(&'static str),
}

/// Required fields are always present and non-empty; absence is a validation
/// failure, not a default.
pub fn validate_order(payload: &OrderPayload) -> Result<(), PayloadError> {
    require_non_empty("customer_code", &payload.customer_code)?;
    require_non_empty("external_order_id", &payload.external_order_id)?;
    Ok(())
}

pub fn validate_measurement(payload: &MeasurementPayload) -> Result<(), PayloadError> {
    require_non_empty("customer_code", &payload.customer_code)?;
    require_non_empty("external_measurement_id", &payload.external_measurement_id)?;
    Ok(())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncParamsError {
    #[error("page must be >= 1")]
    InvalidPage,

    #[error("page_size must be between 1 and 500")]
    InvalidPageSize,
}

pub fn validate_sync_params(params: &SyncParams) -> Result<(), SyncParamsError> {
    if params.page < 1 {
        return Err(SyncParamsError::InvalidPage);
    }
    if !(1..=500).contains(&params.page_size) {
        return Err(SyncParamsError::InvalidPageSize);
    }
    Ok(())
}

fn require_non_empty(name: &'static str, value: &str) -> Result<(), PayloadError> {
    if value.trim().is_empty() {
        return Err(PayloadError::MissingField(name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderPayload {
        OrderPayload {
            customer_code: "ACME-01".to_string(),
            external_order_id: "ORD-100".to_string(),
            title: None,
            status: None,
            ordered_at: None,
            metadata: None,
        }
    }

    #[test]
    fn test_valid_order_accepted() {
        assert!(validate_order(&order()).is_ok());
    }

    #[test]
    fn test_empty_customer_code_rejected() {
        let mut payload = order();
        payload.customer_code = "".to_string();
        assert_eq!(
            validate_order(&payload).unwrap_err(),
            PayloadError::MissingField("customer_code")
        );

        payload.customer_code = "   ".to_string();
        assert!(validate_order(&payload).is_err());
    }

    #[test]
    fn test_empty_external_id_rejected() {
        let mut payload = order();
        payload.external_order_id = "".to_string();
        assert_eq!(
            validate_order(&payload).unwrap_err(),
            PayloadError::MissingField("external_order_id")
        );
    }

    #[test]
    fn test_measurement_requires_ids() {
        let payload = MeasurementPayload {
            customer_code: "ACME-01".to_string(),
            external_measurement_id: "".to_string(),
            external_order_id: None,
            summary: None,
            measured_at: None,
            metadata: None,
        };
        assert_eq!(
            validate_measurement(&payload).unwrap_err(),
            PayloadError::MissingField("external_measurement_id")
        );
    }

    #[test]
    fn test_sync_params_bounds() {
        let mut params = SyncParams::default();
        assert!(validate_sync_params(&params).is_ok());

        params.page = 0;
        assert_eq!(
            validate_sync_params(&params).unwrap_err(),
            SyncParamsError::InvalidPage
        );

        params.page = 1;
        params.page_size = 0;
        assert_eq!(
            validate_sync_params(&params).unwrap_err(),
            SyncParamsError::InvalidPageSize
        );

        params.page_size = 501;
        assert_eq!(
            validate_sync_params(&params).unwrap_err(),
            SyncParamsError::InvalidPageSize
        );

        params.page_size = 500;
        assert!(validate_sync_params(&params).is_ok());
    }
}
