pub mod loaders;
pub mod locators;
pub mod profile;
pub mod work_item;

pub use loaders::{load_profile_from_toml, resolve_profile};
pub use locators::{LocatorTable, UiRole};
pub use profile::{ArrivalRule, PortalProfile};
pub use work_item::{PageState, WorkItem};
