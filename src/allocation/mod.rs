//! Addon capacity allocation and drawable numbering
//!
//! # Architecture
//!
//! ```text
//! AllocationManager
//!   ├─→ Addon 1
//!   │     ├─→ male/component/jbib   → [0, 1, 2, ... ≤128]
//!   │     └─→ male/prop/p_head      → [0, 1]
//!   └─→ Addon 2
//!         └─→ male/component/jbib   → [0, 1]
//! ```
//!
//! Each (addon, partition) pair is numbered `0..count` with no gaps and
//! holds at most 128 drawables. Numbering is independent per addon.

pub mod addon;
pub mod classify;
pub mod drawable;
pub mod manager;
pub mod numbering;
pub mod partition;

pub use addon::Addon;
pub use classify::{classify_path, Classification};
pub use drawable::{Drawable, DrawableId, Texture, MAX_TEXTURES};
pub use manager::{AllocationManager, DeleteReport, DeleteScope, ImportReport, LoadPolicy, Placement};
pub use numbering::{InvariantViolation, ViolationKind};
pub use partition::{PartitionKey, Sex};
