use serde::{Deserialize, Serialize};

use super::withdrawals::WithdrawalRequestManager;
use crate::models::withdrawals::{AccountDetails, WithdrawalRequest};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum FormError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Account number must be 9 to 18 digits")]
    InvalidAccountNumber,
    #[error("IFSC code must look like ABCD0123456")]
    InvalidIfsc,
}

/// Input of the withdrawal form. There is no balance check: every valid
/// request goes to the admin queue.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalForm {
    pub amount: f64,
    pub account_details: AccountDetails,
}

fn is_valid_ifsc(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'0'
        && bytes[5..].iter().all(u8::is_ascii_alphanumeric)
}

impl WithdrawalForm {
    pub fn validate(&self) -> Vec<FormError> {
        let mut errors = Vec::new();
        let details = &self.account_details;

        if !self.amount.is_finite() || self.amount <= 0.0 {
            errors.push(FormError::InvalidAmount);
        }

        if details.account_holder_name.trim().is_empty() {
            errors.push(FormError::Missing("Account holder name"));
        }
        if details.bank_name.trim().is_empty() {
            errors.push(FormError::Missing("Bank name"));
        }

        let account_number = details.account_number.trim();
        if account_number.is_empty() {
            errors.push(FormError::Missing("Account number"));
        } else if !(9..=18).contains(&account_number.len())
            || !account_number.bytes().all(|b| b.is_ascii_digit())
        {
            errors.push(FormError::InvalidAccountNumber);
        }

        let ifsc = details.ifsc_code.trim();
        if ifsc.is_empty() {
            errors.push(FormError::Missing("IFSC code"));
        } else if !is_valid_ifsc(&ifsc.to_ascii_uppercase()) {
            errors.push(FormError::InvalidIfsc);
        }

        errors
    }

    /// Normalised copy: trimmed fields, upper-case IFSC.
    fn normalized_details(&self) -> AccountDetails {
        let details = &self.account_details;
        AccountDetails {
            account_number: details.account_number.trim().to_string(),
            ifsc_code: details.ifsc_code.trim().to_ascii_uppercase(),
            account_holder_name: details.account_holder_name.trim().to_string(),
            bank_name: details.bank_name.trim().to_string(),
        }
    }

    /// Validates, then hands the request to the manager. `Ok(None)` means the
    /// manager refused or the server was unreachable.
    pub async fn submit(
        &self,
        manager: &WithdrawalRequestManager,
        user_id: &str,
    ) -> Result<Option<WithdrawalRequest>, Vec<FormError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            log::debug!("Withdrawal form rejected: {:?}", errors);
            return Err(errors);
        }

        Ok(manager
            .create_withdrawal_request(user_id, self.amount, self.normalized_details())
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(amount: f64, account_number: &str, ifsc: &str) -> WithdrawalForm {
        WithdrawalForm {
            amount,
            account_details: AccountDetails {
                account_number: account_number.to_string(),
                ifsc_code: ifsc.to_string(),
                account_holder_name: "Asha Rao".to_string(),
                bank_name: "HDFC".to_string(),
            },
        }
    }

    #[test]
    fn valid_form_has_no_errors() {
        assert!(form(500.0, "123456789012", "HDFC0001234").validate().is_empty());
        assert!(form(1.0, " 123456789 ", "sbin0a1b2c3").validate().is_empty());
    }

    #[test]
    fn each_bad_field_is_reported() {
        assert_eq!(
            form(0.0, "12ab", "HDFC1001234").validate(),
            vec![
                FormError::InvalidAmount,
                FormError::InvalidAccountNumber,
                FormError::InvalidIfsc
            ]
        );

        let mut empty = form(10.0, "", "");
        empty.account_details.bank_name = " ".to_string();
        assert_eq!(
            empty.validate(),
            vec![
                FormError::Missing("Bank name"),
                FormError::Missing("Account number"),
                FormError::Missing("IFSC code")
            ]
        );
    }

    #[test]
    fn normalization_uppercases_ifsc() {
        let details = form(10.0, " 123456789 ", "hdfc0001234").normalized_details();

        assert_eq!(details.ifsc_code, "HDFC0001234");
        assert_eq!(details.account_number, "123456789");
    }
}
