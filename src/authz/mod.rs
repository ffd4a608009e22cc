//! Request-time authorization: permission registry, middleware pipeline and policy sync.

mod descriptor;
mod metadata;
mod registry;
mod context;
mod engine;
mod middleware;
mod sync;
mod service;

pub use descriptor::{GroupingRule, PermissionDescriptor, PolicyTuple};
pub use metadata::{service_catalog, CatalogEntry, ManifestFile, MetadataSource, OperationMeta, StaticCatalog, StaticPermission};
pub use registry::{build, global, PermissionRegistry, RegistryError, RegistrySnapshot};
pub use context::{cancel_pair, CallContext, CancelSignal, CancelTrigger};
pub use engine::{EngineError, MemoryPolicyEngine, PolicyEngine};
pub use middleware::{handler_fn, AuthorizationMiddleware, Authorized, Decision, Handler, HandlerFn};
pub use sync::{declared_tuples, sync_from_registry, SyncReport};
pub use service::PermissionManager;
