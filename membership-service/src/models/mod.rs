//! Data models for the membership platform.

pub mod affiliate;
pub mod payment;
pub mod secours;
pub mod subscription;
pub mod user;

pub use affiliate::{AffiliateSummary, LeaderboardEntry};
pub use payment::{
    new_subscription_reference, new_token_reference, Payment, PaymentAttempt, PaymentStatus,
    ReferenceKind, SUBSCRIPTION_PREFIX, TOKEN_PREFIX,
};
pub use secours::{SecoursAccount, SecoursPlan, SecoursTransaction};
pub use subscription::{MembershipTier, Subscription, SubscriptionStatus};
pub use user::{User, UserProfile};
