//! Authorization handling.
//!
//! - [`authorization`]: bearer authorizations and their store
//! - [`scope`]: scope matching and bearer header parsing
//! - [`protocol`]: the token exchange state machine
//! - [`notifier`]: delivery of challenges and temporary tokens
//! - [`outcome`]: typed results of protocol operations
//!
//! ## Usage
//!
//! ```ignore
//! let exchange = TokenExchange::from_db(db, options, notifier, Arc::new(SystemClock))?;
//!
//! match exchange.check_bearer(header, "api:read").await? {
//!     Access::Granted(auth) => serve(auth.client_id),
//!     Access::Denied => reject(),
//! }
//! ```

pub mod authorization;
pub mod notifier;
pub mod outcome;
pub mod protocol;
pub mod scope;

pub use authorization::{Authorization, AuthorizationRequest, AuthorizationStore, TokenType};
pub use notifier::{LogNotifier, Notification, NotificationKind, Notifier, RecordingNotifier, WebhookNotifier};
pub use outcome::{Access, ConfirmOutcome, ExchangeOutcome, LoginOutcome, LogoutOutcome, StatusCode};
pub use protocol::TokenExchange;
pub use scope::{bearer_token, has_scope};
