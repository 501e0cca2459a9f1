//! Core domain entities
//!
//! Pure data structures with validation logic - no I/O or external dependencies.

mod auth_error;
mod identity;
pub mod result;
mod session;
pub mod signup_form;

pub use auth_error::{AuthError, AuthErrorKind};
pub use identity::{Identity, ProfileUpdate};
pub use session::{AuthenticatedSession, SessionPhase, SessionState, SignupOutcome};
pub use signup_form::{FormError, SignupForm, SignupSubmission};
