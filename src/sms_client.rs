use crate::circuit_breaker::{create_sms_circuit_breaker, SmsCircuitBreaker};
use crate::errors::AppError;
use std::sync::Arc;
use std::time::Duration;

/// Booking approval outcome carried by a notification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Approved,
    Declined,
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ApprovalStatus::Approved),
            "declined" => Ok(ApprovalStatus::Declined),
            other => Err(format!("status must be 'approved' or 'declined', got '{}'", other)),
        }
    }
}

/// Renders one of the two booking notification templates.
pub fn booking_message(
    status: ApprovalStatus,
    client_name: &str,
    employee_name: &str,
    date_time: &str,
    service_name: &str,
) -> String {
    match status {
        ApprovalStatus::Approved => format!(
            "Hi {}, your {} appointment with {} on {} has been confirmed. See you soon!",
            client_name, service_name, employee_name, date_time
        ),
        ApprovalStatus::Declined => format!(
            "Hi {}, unfortunately your {} appointment with {} on {} could not be accommodated. Please contact us to reschedule.",
            client_name, service_name, employee_name, date_time
        ),
    }
}

/// Validates a recipient phone number and normalizes it to E.164.
///
/// Numbers without a country code are assumed to be US.
pub fn normalize_recipient(raw: &str) -> Option<String> {
    let number = phonenumber::parse(Some(phonenumber::country::Id::US), raw).ok()?;
    if !phonenumber::is_valid(&number) {
        return None;
    }
    Some(number.format().mode(phonenumber::Mode::E164).to_string())
}

/// Client for the SMS gateway.
///
/// All sends run through a circuit breaker so a flapping gateway fails fast
/// instead of holding booking requests at the full request timeout.
#[derive(Clone)]
pub struct SmsClient {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    breaker: Arc<SmsCircuitBreaker>,
}

impl SmsClient {
    /// Creates a new `SmsClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the SMS gateway.
    /// * `account_sid` / `auth_token` - Account credentials.
    /// * `from_number` - The sending phone number.
    pub fn new(
        base_url: String,
        account_sid: String,
        auth_token: String,
        from_number: String,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create SMS client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            account_sid,
            auth_token,
            from_number,
            breaker: Arc::new(create_sms_circuit_breaker()),
        })
    }

    /// Sends one SMS to an E.164 recipient.
    pub async fn send_sms(&self, to: &str, body: &str) -> Result<(), AppError> {
        use failsafe::futures::CircuitBreaker as _;

        match self.breaker.call(self.perform_send(to, body)).await {
            Ok(()) => Ok(()),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(AppError::ExternalApiError(
                "SMS gateway circuit open; send rejected".to_string(),
            )),
        }
    }

    async fn perform_send(&self, to: &str, body: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        tracing::info!("Sending SMS to {}", to);

        let form = [
            ("To", to.to_string()),
            ("From", self.from_number.clone()),
            ("Body", body.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("SMS request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "SMS gateway returned {}: {}",
                status, error_text
            )));
        }

        tracing::info!("✓ SMS sent to {}", to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn approved_template_is_exact() {
        let message = booking_message(
            ApprovalStatus::Approved,
            "Dana",
            "Marco",
            "Friday 2pm",
            "color treatment",
        );
        assert_eq!(
            message,
            "Hi Dana, your color treatment appointment with Marco on Friday 2pm has been confirmed. See you soon!"
        );
    }

    #[test]
    fn declined_template_is_exact() {
        let message = booking_message(
            ApprovalStatus::Declined,
            "Dana",
            "Marco",
            "Friday 2pm",
            "color treatment",
        );
        assert_eq!(
            message,
            "Hi Dana, unfortunately your color treatment appointment with Marco on Friday 2pm could not be accommodated. Please contact us to reschedule."
        );
    }

    #[test]
    fn status_parses_exactly_two_values() {
        assert_eq!(ApprovalStatus::from_str("approved"), Ok(ApprovalStatus::Approved));
        assert_eq!(ApprovalStatus::from_str("declined"), Ok(ApprovalStatus::Declined));
        assert!(ApprovalStatus::from_str("maybe").is_err());
        assert!(ApprovalStatus::from_str("APPROVED").is_err());
    }

    #[test]
    fn normalizes_us_numbers_to_e164() {
        assert_eq!(
            normalize_recipient("(503) 555-0188").as_deref(),
            Some("+15035550188")
        );
        assert_eq!(
            normalize_recipient("+15035550188").as_deref(),
            Some("+15035550188")
        );
    }

    #[test]
    fn rejects_garbage_numbers() {
        assert!(normalize_recipient("123").is_none());
        assert!(normalize_recipient("").is_none());
        assert!(normalize_recipient("not a phone").is_none());
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = SmsClient::new(
            "https://api.example.com".to_string(),
            "AC123".to_string(),
            "token".to_string(),
            "+15005550006".to_string(),
        );
        assert!(client.is_ok());
    }
}
