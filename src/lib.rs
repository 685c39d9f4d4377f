pub mod config;
pub mod control;
pub mod event;
pub mod fib;
pub mod link;
pub mod mem;
pub mod message;
pub mod name;
pub mod nfdc;
pub mod node;
pub mod prefix;
pub mod retry;
pub mod rib;
pub mod sync;
pub mod tlv;
pub mod transport;

pub use config::{ConfigError, DvConfig, LinkConfig};
pub use control::{ControlError, ForwardingControl, Retrying};
pub use link::{Link, LinkTable};
pub use message::{AdvEntry, Advertisement, PrefixOp, PrefixOpList};
pub use name::{Name, NameError};
pub use node::{DvNode, LinkStatus, NodeHandle, NodeSnapshot};
pub use rib::{INFINITY, Rib, RibEntry};
pub use transport::{FetchError, SyncGroup, SyncUpdate, Transport};
