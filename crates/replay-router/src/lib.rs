//! Virtual request router for replayed traces.
//!
//! Traces are loaded lazily on first request, cached per trace id and evicted
//! once the session that loaded them goes away.

pub mod archive;
pub mod dispatch;
pub mod errors;
pub mod loader;
pub mod policy;
pub mod presence;
pub mod router;

pub use archive::{ArchiveOpener, DirArchive, FsArchiveOpener, TraceArchive};
pub use dispatch::{RouteRequest, RouteResponse};
pub use errors::{RouteError, RouteResult};
pub use loader::{load_trace, resource_for_sha1};
pub use policy::RouterPolicyView;
pub use presence::{SessionLeases, SessionPresence};
pub use router::{strip_fragment, LoadedTrace, ResolvedResource, TraceRouter};
