mod session;

pub use session::{CachedSession, set_session_identity};
