pub mod controller;
pub mod refresh;
pub mod state;

pub use controller::{SessionController, SessionError};
pub use refresh::{HttpRefresher, RefreshCoordinator, RefreshError, Refresher};
pub use state::{SessionHandle, SessionState};
