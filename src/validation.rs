// Request validation. Collects every failed constraint so the client sees
// all problems at once, not just the first.

use crate::error::{AddressBookError, Result};
use crate::model::{AddressBookRequest, CustomerRequest};

/// Maximum length of an address book title.
pub const MAX_TITLE_LEN: usize = 100;

/// Maximum length of a customer name.
pub const MAX_NAME_LEN: usize = 50;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for AddressBookRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Title cannot be empty.".to_string());
        } else if self.title.chars().count() > MAX_TITLE_LEN {
            errors.push(format!(
                "Invalid title. Must have at least length of 1 to {}",
                MAX_TITLE_LEN
            ));
        }

        collect(errors)
    }
}

impl Validate for CustomerRequest {
    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name cannot be blank.".to_string());
        } else if self.name.chars().count() > MAX_NAME_LEN {
            errors.push(format!(
                "name must have length between 1 to {}",
                MAX_NAME_LEN
            ));
        }

        if self.phone_numbers.iter().any(|p| p.trim().is_empty()) {
            errors.push("phone numbers cannot be blank.".to_string());
        }

        collect(errors)
    }
}

fn collect(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AddressBookError::Validation(errors))
    }
}

// ============================================================================
// TESTS
// ============================================================================
