pub mod access;
pub mod claims;
pub mod collection;
pub mod detail;
pub mod domain;
pub mod ports;
pub mod registration;
pub mod session;

pub use access::ApiAccess;
pub use collection::{CollectionError, CollectionSnapshot, PaginatedStore, DEFAULT_PAGE_SIZE};
pub use detail::{DetailError, DetailSnapshot, TaskDetail};
pub use domain::{
    CodeDelivery, ItemsPage, PersistedTokens, Session, SessionPhase, SignUpOutcome, SignUpRequest, StudyItem,
    StudyItemStatus, TokenSet, User,
};
pub use ports::{
    AuthError, AuthResult, Clock, IdentityProvider, PortError, PortResult, StudyItemsApi, SystemClock, TokenStore,
};
pub use registration::{RegistrationError, RegistrationForm};
pub use session::{AuthDiagnostics, PersistedDiagnostics, SessionManager};
