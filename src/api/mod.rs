//! Endpoint wrappers for the dashboard and mobile features.
//!
//! Responses are returned as raw JSON. The shapes belong to the backend and
//! change more often than this crate does.

mod agent;
mod booking_preferences;
mod documents;
mod integrations;
mod manuals;
mod notifications;
mod photo_recognition;
mod subscription;

pub use agent::AgentApi;
pub use booking_preferences::BookingPreferencesApi;
pub use documents::DocumentsApi;
pub use integrations::{IntegrationsApi, OAuthProvider};
pub use manuals::{ManualQuery, ManualsApi};
pub use notifications::NotificationsApi;
pub use photo_recognition::PhotoRecognitionApi;
pub use subscription::{BillingCycle, SubscriptionApi};
