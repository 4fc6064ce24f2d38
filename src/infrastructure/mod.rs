pub mod cdp_portal;
pub mod drop_dir;
pub mod operator;
pub mod portal;

pub use cdp_portal::CdpPortal;
pub use drop_dir::DropDirectory;
pub use operator::{ConsoleOperator, Operator};
pub use portal::{ElementState, Locator, Portal, SessionState, StoredCookie};
