mod conflicts;
mod registry;

pub use conflicts::{ConflictDetector, ConflictMessage, ConflictReport, ConflictRule, ConflictTable};
pub use registry::{FieldKind, SchemaField, SchemaRegistry};
