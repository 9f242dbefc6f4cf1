//! Session coordination: store, route rules, guard and login flows.

pub mod guard;
pub mod orchestrator;
pub mod redirect;
pub mod routes;
pub mod store;

pub use guard::{GuardDecision, NavigationGuard, NavigationRequest};
pub use orchestrator::{AuthOrchestrator, LoginError, LoginSuccess, LogoutOutcome, RegisterOutcome};
pub use routes::{RouteClass, RouteRules};
pub use store::{AuthPhase, AuthState, SessionStore};
