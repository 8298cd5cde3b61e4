//! Client-side form validation.
//!
//! These rules run before anything is sent to the backend and are
//! independent of whatever the backend enforces itself. Every validator
//! reports all failing fields at once so a form can highlight each of them.

use core::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::types::{CategoryId, Email, Price};

/// Letters, digits and underscores only.
#[allow(clippy::expect_used)] // constant pattern, exercised by the tests below
static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("username pattern compiles"));

/// Minimum full-name length on sign-up.
pub const MIN_FULL_NAME_LENGTH: usize = 2;
/// Minimum username length on sign-up.
pub const MIN_USERNAME_LENGTH: usize = 3;
/// Minimum password length on sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A single failing form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Form field name (e.g. `"username"`).
    pub field: &'static str,
    /// Message shown next to the field.
    pub message: String,
}

/// Every failing field of one form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// An empty error set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a failing field.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    /// Iterate over the failing fields in the order they were checked.
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// `Ok(value)` when nothing failed, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field failed.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

fn require(errors: &mut ValidationErrors, field: &'static str, value: &str, message: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, message);
        false
    } else {
        true
    }
}

// =============================================================================
// Sign-in / Sign-up
// =============================================================================

/// Sign-in form. The identifier is an email address or a reserved username.
#[derive(Debug, Clone, Default)]
pub struct SignInForm {
    pub identifier: String,
    pub password: String,
}

impl SignInForm {
    /// Both fields are required.
    ///
    /// # Errors
    ///
    /// Returns the failing fields.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "identifier", &self.identifier, "Email or username is required");
        require(&mut errors, "password", &self.password, "Password is required");
        errors.into_result(())
    }
}

/// Sign-up form.
#[derive(Debug, Clone, Default)]
pub struct SignUpForm {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub accept_terms: bool,
}

impl SignUpForm {
    /// Validate every field and return the parsed email on success.
    ///
    /// # Errors
    ///
    /// Returns the failing fields.
    pub fn validate(&self) -> Result<Email, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if require(&mut errors, "full_name", &self.full_name, "Full name is required")
            && self.full_name.trim().chars().count() < MIN_FULL_NAME_LENGTH
        {
            errors.add("full_name", "Full name must be at least 2 characters");
        }

        if require(&mut errors, "username", &self.username, "Username is required") {
            if self.username.chars().count() < MIN_USERNAME_LENGTH {
                errors.add("username", "Username must be at least 3 characters");
            } else if !USERNAME_PATTERN.is_match(&self.username) {
                errors.add(
                    "username",
                    "Username can only contain letters, numbers, and underscores",
                );
            }
        }

        let email = if require(&mut errors, "email", &self.email, "Email is required") {
            Email::parse(self.email.trim()).map_or_else(
                |_| {
                    errors.add("email", "Invalid email address");
                    None
                },
                Some,
            )
        } else {
            None
        };

        if let Err(message) = check_password_strength(&self.password) {
            errors.add("password", message);
        }

        if self.confirm_password.is_empty() {
            errors.add("confirm_password", "Please confirm your password");
        } else if self.confirm_password != self.password {
            errors.add("confirm_password", "Passwords do not match");
        }

        if !self.accept_terms {
            errors.add("terms", "You must accept the terms and conditions");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(email),
            _ => Err(errors),
        }
    }
}

/// Password rule: at least six characters with a lowercase letter, an
/// uppercase letter and a digit.
///
/// # Errors
///
/// Returns the message to show next to the password field.
pub fn check_password_strength(password: &str) -> Result<(), &'static str> {
    if password.is_empty() {
        return Err("Password is required");
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 6 characters");
    }
    let lower = password.chars().any(|c| c.is_ascii_lowercase());
    let upper = password.chars().any(|c| c.is_ascii_uppercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(lower && upper && digit) {
        return Err(
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        );
    }
    Ok(())
}

// =============================================================================
// Product form
// =============================================================================

/// Raw product form input as typed by a team member.
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub inventory_count: String,
    pub category_id: String,
    pub sku: String,
    pub weight: String,
    pub dimensions: String,
    /// Comma-separated tags.
    pub tags: String,
    pub is_active: bool,
}

/// A product form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub inventory_count: i32,
    pub category_id: Option<CategoryId>,
    pub sku: Option<String>,
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_active: bool,
}

impl ProductForm {
    /// Validate and convert the raw input.
    ///
    /// # Errors
    ///
    /// Returns the failing fields.
    pub fn parse(&self) -> Result<ProductDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        require(&mut errors, "name", &self.name, "Product name is required");

        let price = if require(&mut errors, "price", &self.price, "Price is required") {
            match Decimal::from_str(self.price.trim()) {
                Ok(amount) => Price::new(amount).map_or_else(
                    |_| {
                        errors.add("price", "Price must be positive");
                        None
                    },
                    Some,
                ),
                Err(_) => {
                    errors.add("price", "Price must be a number");
                    None
                }
            }
        } else {
            None
        };

        let inventory_count = if require(
            &mut errors,
            "inventory_count",
            &self.inventory_count,
            "Inventory count is required",
        ) {
            match self.inventory_count.trim().parse::<i32>() {
                Ok(n) if n >= 0 => Some(n),
                Ok(_) => {
                    errors.add("inventory_count", "Inventory count must be positive");
                    None
                }
                Err(_) => {
                    errors.add("inventory_count", "Inventory count must be a whole number");
                    None
                }
            }
        } else {
            None
        };

        let category_id = match non_empty(&self.category_id) {
            Some(raw) => CategoryId::from_str(&raw).map_or_else(
                |_| {
                    errors.add("category_id", "Unknown category");
                    None
                },
                Some,
            ),
            None => None,
        };

        let weight = match non_empty(&self.weight) {
            Some(raw) => Decimal::from_str(&raw).map_or_else(
                |_| {
                    errors.add("weight", "Weight must be a number");
                    None
                },
                Some,
            ),
            None => None,
        };

        match (price, inventory_count) {
            (Some(price), Some(inventory_count)) if errors.is_empty() => Ok(ProductDraft {
                name: self.name.trim().to_owned(),
                description: non_empty(&self.description),
                price,
                inventory_count,
                category_id,
                sku: non_empty(&self.sku),
                weight,
                dimensions: non_empty(&self.dimensions),
                tags: parse_tags(&self.tags),
                is_active: self.is_active,
            }),
            _ => Err(errors),
        }
    }
}

/// Split comma-separated tags, trimming each and dropping empties.
///
/// Returns `None` when no tag survives.
#[must_use]
pub fn parse_tags(raw: &str) -> Option<Vec<String>> {
    let tags: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect();
    if tags.is_empty() { None } else { Some(tags) }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

// =============================================================================
// Checkout form
// =============================================================================

/// Shipping and payment details entered at checkout.
#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub card_number: String,
    pub expiry_date: String,
    pub cvv: String,
    pub card_name: String,
    pub billing_same_as_shipping: bool,
}

impl CheckoutForm {
    /// Every field is required and the email must be well-formed.
    ///
    /// # Errors
    ///
    /// Returns the failing fields.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "full_name", &self.full_name, "Full name is required");
        if require(&mut errors, "email", &self.email, "Email is required")
            && Email::parse(self.email.trim()).is_err()
        {
            errors.add("email", "Invalid email address");
        }
        require(&mut errors, "phone", &self.phone, "Phone is required");
        require(&mut errors, "address", &self.address, "Address is required");
        require(&mut errors, "city", &self.city, "City is required");
        require(&mut errors, "country", &self.country, "Country is required");
        require(&mut errors, "card_number", &self.card_number, "Card number is required");
        require(&mut errors, "expiry_date", &self.expiry_date, "Expiry date is required");
        require(&mut errors, "cvv", &self.cvv, "CVV is required");
        require(&mut errors, "card_name", &self.card_name, "Cardholder name is required");
        errors.into_result(())
    }

    /// `"<address>, <city>, <country>"`.
    #[must_use]
    pub fn shipping_address(&self) -> String {
        format!(
            "{}, {}, {}",
            self.address.trim(),
            self.city.trim(),
            self.country.trim()
        )
    }

    /// Same as the shipping address when the box is ticked, otherwise none.
    #[must_use]
    pub fn billing_address(&self) -> Option<String> {
        self.billing_same_as_shipping
            .then(|| self.shipping_address())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_sign_up() -> SignUpForm {
        SignUpForm {
            full_name: "Ada Lovelace".to_owned(),
            username: "ada_l".to_owned(),
            email: "ada@example.com".to_owned(),
            password: "Engine1".to_owned(),
            confirm_password: "Engine1".to_owned(),
            accept_terms: true,
        }
    }

    #[test]
    fn test_sign_in_requires_both_fields() {
        let errors = SignInForm::default().validate().unwrap_err();
        assert!(errors.get("identifier").is_some());
        assert!(errors.get("password").is_some());
    }

    #[test]
    fn test_sign_up_valid() {
        let email = valid_sign_up().validate().unwrap();
        assert_eq!(email.as_str(), "ada@example.com");
    }

    #[test]
    fn test_sign_up_reports_every_failure() {
        let form = SignUpForm {
            full_name: "A".to_owned(),
            username: "a b".to_owned(),
            email: "nope".to_owned(),
            password: "short".to_owned(),
            confirm_password: "other".to_owned(),
            accept_terms: false,
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(
            errors.get("full_name"),
            Some("Full name must be at least 2 characters")
        );
        assert_eq!(
            errors.get("username"),
            Some("Username can only contain letters, numbers, and underscores")
        );
        assert_eq!(errors.get("email"), Some("Invalid email address"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters")
        );
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
        assert!(errors.get("terms").is_some());
    }

    #[test]
    fn test_username_too_short() {
        let form = SignUpForm {
            username: "ab".to_owned(),
            ..valid_sign_up()
        };
        assert_eq!(
            form.validate().unwrap_err().get("username"),
            Some("Username must be at least 3 characters")
        );
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("Abcde1").is_ok());
        assert!(check_password_strength("abcdef1").is_err());
        assert!(check_password_strength("ABCDEF1").is_err());
        assert!(check_password_strength("Abcdefg").is_err());
        assert_eq!(check_password_strength(""), Err("Password is required"));
    }

    #[test]
    fn test_product_form_parses() {
        let form = ProductForm {
            name: " Desk Lamp ".to_owned(),
            price: "24.50".to_owned(),
            inventory_count: "12".to_owned(),
            tags: "lighting, , desk ,".to_owned(),
            is_active: true,
            ..ProductForm::default()
        };
        let draft = form.parse().unwrap();
        assert_eq!(draft.name, "Desk Lamp");
        assert_eq!(draft.price, Price::from_cents(2450));
        assert_eq!(draft.inventory_count, 12);
        assert_eq!(
            draft.tags,
            Some(vec!["lighting".to_owned(), "desk".to_owned()])
        );
        assert_eq!(draft.description, None);
        assert_eq!(draft.weight, None);
    }

    #[test]
    fn test_product_form_rejects_negative_numbers() {
        let form = ProductForm {
            name: "Lamp".to_owned(),
            price: "-1".to_owned(),
            inventory_count: "-3".to_owned(),
            ..ProductForm::default()
        };
        let errors = form.parse().unwrap_err();
        assert_eq!(errors.get("price"), Some("Price must be positive"));
        assert_eq!(
            errors.get("inventory_count"),
            Some("Inventory count must be positive")
        );
    }

    #[test]
    fn test_product_form_required_fields() {
        let errors = ProductForm::default().parse().unwrap_err();
        assert!(errors.get("name").is_some());
        assert!(errors.get("price").is_some());
        assert!(errors.get("inventory_count").is_some());
    }

    #[test]
    fn test_parse_tags_empty() {
        assert_eq!(parse_tags(" , ,"), None);
    }

    #[test]
    fn test_checkout_form() {
        let mut form = CheckoutForm {
            full_name: "Ada".to_owned(),
            email: "ada@example.com".to_owned(),
            phone: "555".to_owned(),
            address: "1 Main St".to_owned(),
            city: "Springfield".to_owned(),
            country: "US".to_owned(),
            card_number: "4242".to_owned(),
            expiry_date: "12/30".to_owned(),
            cvv: "123".to_owned(),
            card_name: "Ada".to_owned(),
            billing_same_as_shipping: true,
        };
        assert!(form.validate().is_ok());
        assert_eq!(form.shipping_address(), "1 Main St, Springfield, US");
        assert_eq!(
            form.billing_address().as_deref(),
            Some("1 Main St, Springfield, US")
        );

        form.billing_same_as_shipping = false;
        form.cvv.clear();
        assert_eq!(form.billing_address(), None);
        assert_eq!(form.validate().unwrap_err().get("cvv"), Some("CVV is required"));
    }

    #[test]
    fn test_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.add("a", "first");
        errors.add("b", "second");
        assert_eq!(errors.to_string(), "a: first; b: second");
    }
}
