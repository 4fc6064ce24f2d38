pub mod artifact_placer;
pub mod completion;
pub mod facet_enumerator;
pub mod retry;
pub mod session;
pub mod skip_writer;

pub use artifact_placer::{sanitize, ArtifactPlacer, PlacedArtifact};
pub use completion::{poll_until, Change, ContentChange, FileArrival};
pub use retry::{Invocation, RetryPolicy, UiAction};
pub use session::{Session, SessionManager, SessionOrigin};
pub use skip_writer::SkipWriter;
