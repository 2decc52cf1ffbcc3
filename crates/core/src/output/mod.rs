//! Output module: where converted files go and how they get there.
//!
//! - [`DirectoryProvisioner`] expands `~` and creates the output directory.
//! - [`resolve_output_path`] names each output after its input and the
//!   conversion parameters; [`find_collisions`] spots inputs that would write
//!   the same file.
//! - [`AtomicWriter`] writes through a temporary sibling and renames it into
//!   place.

mod error;
mod provisioner;
mod resolver;
mod writer;

pub use error::{ProvisionError, ResolveError, WriteError};
pub use provisioner::DirectoryProvisioner;
pub use resolver::{find_collisions, resolve_output_path};
pub use writer::AtomicWriter;
