pub use crate::authn::{Authenticator, BasicCredentials, CredentialResolver};
pub use crate::cache::{memory::MemoryCredentialCache, CachedCredential, CredentialCache};
pub use crate::errors::{AuthError, DenyReason};
pub use crate::events::{AuthDecisionEvent, QuotaEvent};
pub use crate::lifecycle::{
    NewPermission, NewUser, PermissionPatch, PermissionService, UserPatch, UserService,
};
pub use crate::model::{
    parse_ttl, AuthzRequest, Classification, Credential, CredentialKind, Grants, Permission,
    QuotaKey, QuotaOutcome, RateLimit, RequestOrigin, User,
};
pub use crate::password::{hash_password, verify_password, PasswordHashType, DEFAULT_BCRYPT_COST};
pub use crate::pdp::{Authorizer, Check, GrantEvaluator};
pub use crate::quota::{QuotaStore, RateLimitPolicy, SlidingWindowLimiter};
pub use crate::store::{CredentialStore, DocumentCredentialStore};
pub use crate::AuthFacade;
