//! Authentication state trait and macro.

use crate::session::SessionConfig;

/// Trait for state types that can validate session cookies.
pub trait HasSessionBackend {
    fn sessions(&self) -> &SessionConfig;
}

/// Macro to implement `HasSessionBackend` for state structs.
///
/// The struct must have a `sessions: Arc<SessionConfig>` field.
///
/// # Example
/// ```ignore
/// #[derive(Clone)]
/// pub struct MyState {
///     pub sessions: Arc<SessionConfig>,
/// }
///
/// impl_has_session_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_session_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasSessionBackend for $state_type {
            fn sessions(&self) -> &$crate::session::SessionConfig {
                &self.sessions
            }
        }
    };
}
