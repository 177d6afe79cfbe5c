// ── Persistent stores ──
//
// The camera registry and the home-network credential map. Shoots and
// presets keep their own documents next to the managers that own them.

mod collection;
mod credentials;
pub(crate) mod json_file;
mod registry;

pub use credentials::CredentialStore;
pub use registry::CameraRegistry;
