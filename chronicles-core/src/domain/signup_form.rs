//! Three-step signup form
//!
//! Step 1 collects the name and email, step 2 the password (entered twice),
//! step 3 optional profile details. Advancing is gated on the current step's
//! required fields; going back never loses input.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Interests offered on the profile step
pub const INTERESTS: &[&str] = &[
    "Discord Bot Development",
    "Web Development",
    "Game Development",
    "Hardware & Electronics",
    "AI & Machine Learning",
    "Server Management",
    "Chrome Extensions",
    "API Development",
];

pub const STEP_COUNT: u8 = 3;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"))
}

/// Why the form cannot move forward
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("unknown interest: {0}")]
    UnknownInterest(String),

    #[error("form is on step {0}, submission needs step 3")]
    Incomplete(u8),
}

/// Values handed to the session façade on submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupSubmission {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Multi-step signup form state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    step: u8,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
    pub phone: String,
    pub company: String,
    interests: Vec<String>,
}

impl SignupForm {
    pub fn new() -> Self {
        Self {
            step: 1,
            ..Default::default()
        }
    }

    /// Current step, 1-based
    pub fn step(&self) -> u8 {
        self.step.max(1)
    }

    pub fn progress_percent(&self) -> u8 {
        ((f32::from(self.step()) / f32::from(STEP_COUNT)) * 100.0).round() as u8
    }

    /// Check the current step's required fields
    pub fn validate_step(&self) -> Result<(), FormError> {
        match self.step() {
            1 => {
                if self.first_name.trim().is_empty() {
                    return Err(FormError::Missing("first name"));
                }
                if self.last_name.trim().is_empty() {
                    return Err(FormError::Missing("last name"));
                }
                if self.email.trim().is_empty() {
                    return Err(FormError::Missing("email"));
                }
                if !email_pattern().is_match(self.email.trim()) {
                    return Err(FormError::InvalidEmail);
                }
                Ok(())
            }
            2 => {
                if self.password.is_empty() {
                    return Err(FormError::Missing("password"));
                }
                if self.confirm_password.is_empty() {
                    return Err(FormError::Missing("password confirmation"));
                }
                if self.password != self.confirm_password {
                    return Err(FormError::PasswordMismatch);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Move to the next step if the current one is complete
    pub fn advance(&mut self) -> Result<u8, FormError> {
        self.validate_step()?;
        if self.step() < STEP_COUNT {
            self.step = self.step() + 1;
        }
        Ok(self.step())
    }

    pub fn back(&mut self) -> u8 {
        if self.step() > 1 {
            self.step = self.step() - 1;
        }
        self.step()
    }

    /// Add the interest if absent, remove it if present. Returns whether it is now selected.
    pub fn toggle_interest(&mut self, interest: &str) -> Result<bool, FormError> {
        let Some(known) = INTERESTS.iter().find(|i| **i == interest) else {
            return Err(FormError::UnknownInterest(interest.to_string()));
        };

        if let Some(pos) = self.interests.iter().position(|i| i == known) {
            self.interests.remove(pos);
            Ok(false)
        } else {
            self.interests.push((*known).to_string());
            Ok(true)
        }
    }

    pub fn interests(&self) -> &[String] {
        &self.interests
    }

    /// "First Last", or `None` when both names are blank
    pub fn display_name(&self) -> Option<String> {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Final values for the façade. Steps 1 and 2 are re-checked so a form
    /// edited after advancing still cannot submit bad input.
    pub fn submission(&self) -> Result<SignupSubmission, FormError> {
        if self.step() != STEP_COUNT {
            return Err(FormError::Incomplete(self.step()));
        }

        let mut check = self.clone();
        for step in 1..STEP_COUNT {
            check.step = step;
            check.validate_step()?;
        }

        Ok(SignupSubmission {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            display_name: self.display_name(),
        })
    }
}
